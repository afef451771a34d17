//! Track documents to styled entities.

use formats::{TrackCollection, TrackFeature, TrackShape};
use scene::{EntityId, TrackEntity, TrackGeometry};
use serde_json::Value;

use crate::symbology::Symbology;

/// Where an overlay build gets its document from.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometrySource {
    /// The document itself.
    Inline(Value),
    /// A URL or path handed to the loader.
    Location(String),
    /// No geometry at all.
    Empty,
}

impl GeometrySource {
    /// Source for a terminal result payload. Resolution order: the payload
    /// itself when it has a `features` array, then a `mitigated_data` object,
    /// then a `geometry_url` string.
    pub fn for_result(payload: &Value) -> Self {
        if payload.get("features").is_some_and(Value::is_array) {
            return GeometrySource::Inline(payload.clone());
        }
        if let Some(doc) = payload.get("mitigated_data").filter(|v| v.is_object()) {
            return GeometrySource::Inline(doc.clone());
        }
        if let Some(url) = payload.get("geometry_url").and_then(Value::as_str) {
            return GeometrySource::Location(url.to_string());
        }
        GeometrySource::Empty
    }
}

fn geometry_of(shape: &TrackShape) -> TrackGeometry {
    match shape {
        TrackShape::Point(p) => TrackGeometry::Points(vec![*p]),
        TrackShape::MultiPoint(ps) => TrackGeometry::Points(ps.clone()),
        TrackShape::LineString(ps) => TrackGeometry::Paths(vec![ps.clone()]),
        TrackShape::MultiLineString(lines) => TrackGeometry::Paths(lines.clone()),
    }
}

fn label_of(feature: &TrackFeature) -> Option<String> {
    feature
        .text("name")
        .map(str::to_string)
        .or_else(|| feature.id.clone())
}

/// Builds one entity per feature, ids assigned in document order.
///
/// A missing or non-numeric intensity property counts as 0.
pub fn build_entities(collection: &TrackCollection, symbology: &Symbology) -> Vec<TrackEntity> {
    collection
        .features
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let intensity = f.number(&symbology.intensity_property).unwrap_or(0.0);
            TrackEntity {
                id: EntityId(i as u32),
                label: label_of(f),
                geometry: geometry_of(&f.shape),
                intensity,
                style: symbology.style_for(intensity),
            }
        })
        .collect()
}
