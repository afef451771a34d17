use crate::bounds::GeoPoint;

/// WGS84 semi-major axis (meters).
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening.
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// WGS84 semi-minor axis (meters).
pub const WGS84_B: f64 = WGS84_A * (1.0 - WGS84_F);
/// Mean Earth radius used for great-circle distances (meters).
pub const MEAN_EARTH_RADIUS_M: f64 = (2.0 * WGS84_A + WGS84_B) / 3.0;

/// Haversine distance between two positions on the mean sphere.
pub fn surface_distance_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat_deg.to_radians();
    let lat2 = b.lat_deg.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.lon_deg - a.lon_deg).to_radians();

    let h = (dlat * 0.5).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon * 0.5).sin().powi(2);
    2.0 * MEAN_EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

#[cfg(test)]
mod tests {
    use super::{MEAN_EARTH_RADIUS_M, surface_distance_m};
    use crate::bounds::GeoPoint;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint::new(-75.5, 24.0);
        assert_close(surface_distance_m(p, p), 0.0, 1e-9);
    }

    #[test]
    fn quarter_meridian() {
        let d = surface_distance_m(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 90.0));
        assert_close(d, MEAN_EARTH_RADIUS_M * std::f64::consts::FRAC_PI_2, 1e-3);
    }

    #[test]
    fn one_degree_of_longitude_at_equator() {
        let d = surface_distance_m(GeoPoint::new(10.0, 0.0), GeoPoint::new(11.0, 0.0));
        assert!((110_000.0..112_500.0).contains(&d), "got {d}");
    }
}
