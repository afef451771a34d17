use foundation::{GeoExtent, GeoPoint};

use crate::components::TrackStyle;
use crate::entity::EntityId;

#[derive(Debug, Clone, PartialEq)]
pub enum TrackGeometry {
    /// Individual fixes.
    Points(Vec<GeoPoint>),
    /// One or more polylines.
    Paths(Vec<Vec<GeoPoint>>),
}

impl TrackGeometry {
    pub fn extent(&self) -> Option<GeoExtent> {
        match self {
            TrackGeometry::Points(ps) => GeoExtent::from_points(ps),
            TrackGeometry::Paths(paths) => GeoExtent::from_points(paths.iter().flatten()),
        }
    }

    pub fn vertex_count(&self) -> usize {
        match self {
            TrackGeometry::Points(ps) => ps.len(),
            TrackGeometry::Paths(paths) => paths.iter().map(Vec::len).sum(),
        }
    }
}

/// One drawable storm-track record of an overlay layer.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackEntity {
    pub id: EntityId,
    pub label: Option<String>,
    pub geometry: TrackGeometry,
    /// Value the style was derived from (e.g. wind speed in knots).
    pub intensity: f64,
    pub style: TrackStyle,
}

/// Union of the extents of all entities.
pub fn entities_extent(entities: &[TrackEntity]) -> Option<GeoExtent> {
    entities
        .iter()
        .filter_map(|e| e.geometry.extent())
        .reduce(GeoExtent::union)
}
