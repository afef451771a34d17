use crate::math::surface_distance_m;

/// A WGS84 position in degrees.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GeoPoint {
    pub lon_deg: f64,
    pub lat_deg: f64,
}

impl GeoPoint {
    pub fn new(lon_deg: f64, lat_deg: f64) -> Self {
        Self { lon_deg, lat_deg }
    }

    pub fn is_finite(&self) -> bool {
        self.lon_deg.is_finite() && self.lat_deg.is_finite()
    }
}

/// Axis-aligned lon/lat bounding box in degrees.
///
/// Extents never wrap the antimeridian: `min.lon_deg <= max.lon_deg` always holds.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GeoExtent {
    pub min: GeoPoint,
    pub max: GeoPoint,
}

impl GeoExtent {
    pub fn new(min: GeoPoint, max: GeoPoint) -> Self {
        GeoExtent { min, max }
    }

    /// Degenerate extent covering a single point.
    pub fn from_point(p: GeoPoint) -> Self {
        GeoExtent { min: p, max: p }
    }

    /// Smallest extent containing every finite point, or `None` if there are none.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a GeoPoint>) -> Option<Self> {
        let mut out: Option<GeoExtent> = None;
        for p in points.into_iter().filter(|p| p.is_finite()) {
            match out.as_mut() {
                Some(extent) => extent.include(*p),
                None => out = Some(GeoExtent::from_point(*p)),
            }
        }
        out
    }

    pub fn include(&mut self, p: GeoPoint) {
        self.min.lon_deg = self.min.lon_deg.min(p.lon_deg);
        self.min.lat_deg = self.min.lat_deg.min(p.lat_deg);
        self.max.lon_deg = self.max.lon_deg.max(p.lon_deg);
        self.max.lat_deg = self.max.lat_deg.max(p.lat_deg);
    }

    pub fn union(mut self, other: GeoExtent) -> Self {
        self.include(other.min);
        self.include(other.max);
        self
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min.lon_deg + self.max.lon_deg) * 0.5,
            (self.min.lat_deg + self.max.lat_deg) * 0.5,
        )
    }

    /// Great-circle length of the SW→NE diagonal, in meters.
    pub fn diagonal_m(&self) -> f64 {
        surface_distance_m(self.min, self.max)
    }
}
