use foundation::GeoPoint;
use serde_json::{Map, Value};
use tracing::debug;

/// Geometry kinds a track document may carry.
///
/// Areas have no meaning for storm tracks; features using them are skipped at
/// parse time and counted in [`TrackCollection::skipped`].
#[derive(Debug, Clone, PartialEq)]
pub enum TrackShape {
    Point(GeoPoint),
    MultiPoint(Vec<GeoPoint>),
    LineString(Vec<GeoPoint>),
    MultiLineString(Vec<Vec<GeoPoint>>),
}

impl TrackShape {
    /// Every vertex, in document order.
    pub fn points(&self) -> Box<dyn Iterator<Item = &GeoPoint> + '_> {
        match self {
            TrackShape::Point(p) => Box::new(std::iter::once(p)),
            TrackShape::MultiPoint(ps) | TrackShape::LineString(ps) => Box::new(ps.iter()),
            TrackShape::MultiLineString(lines) => Box::new(lines.iter().flatten()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackFeature {
    pub id: Option<String>,
    pub properties: Map<String, Value>,
    pub shape: TrackShape,
}

impl TrackFeature {
    /// Numeric property, accepting numbers and numeric strings.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.properties.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }
}

/// A GeoJSON `FeatureCollection` of storm track features.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackCollection {
    pub features: Vec<TrackFeature>,
    /// Features dropped because their geometry is not a point or line.
    pub skipped: usize,
}

#[derive(Debug)]
pub enum TrackCollectionError {
    Json(String),
    NotAFeatureCollection,
    InvalidFeature { index: usize, reason: String },
}

impl std::fmt::Display for TrackCollectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackCollectionError::Json(msg) => write!(f, "JSON parse error: {msg}"),
            TrackCollectionError::NotAFeatureCollection => {
                write!(f, "expected GeoJSON FeatureCollection")
            }
            TrackCollectionError::InvalidFeature { index, reason } => {
                write!(f, "invalid feature at index {index}: {reason}")
            }
        }
    }
}

impl std::error::Error for TrackCollectionError {}

enum Parsed {
    Shape(TrackShape),
    Unsupported(String),
}

impl TrackCollection {
    pub fn from_geojson_str(payload: &str) -> Result<Self, TrackCollectionError> {
        let value: Value = serde_json::from_str(payload)
            .map_err(|e| TrackCollectionError::Json(e.to_string()))?;
        Self::from_geojson_value(&value)
    }

    /// Parses a collection. The `type` member may be omitted, since result
    /// payloads often carry just `{ "features": [...] }`.
    pub fn from_geojson_value(value: &Value) -> Result<Self, TrackCollectionError> {
        let obj = value
            .as_object()
            .ok_or(TrackCollectionError::NotAFeatureCollection)?;
        match obj.get("type").and_then(Value::as_str) {
            None | Some("FeatureCollection") => {}
            Some(_) => return Err(TrackCollectionError::NotAFeatureCollection),
        }
        let features_val = obj
            .get("features")
            .and_then(Value::as_array)
            .ok_or(TrackCollectionError::NotAFeatureCollection)?;

        let mut out = TrackCollection {
            features: Vec::with_capacity(features_val.len()),
            skipped: 0,
        };
        for (index, feat_val) in features_val.iter().enumerate() {
            let invalid = |reason: String| TrackCollectionError::InvalidFeature { index, reason };

            let feat_obj = feat_val
                .as_object()
                .ok_or_else(|| invalid("feature must be an object".to_string()))?;
            if let Some(ty) = feat_obj.get("type").and_then(Value::as_str) {
                if ty != "Feature" {
                    return Err(invalid(format!("unexpected feature type: {ty}")));
                }
            }

            let id = match feat_obj.get("id") {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            };
            let properties = feat_obj
                .get("properties")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            let geometry_val = feat_obj
                .get("geometry")
                .ok_or_else(|| invalid("feature missing geometry".to_string()))?;

            match parse_geometry(geometry_val).map_err(invalid)? {
                Parsed::Shape(shape) => out.features.push(TrackFeature {
                    id,
                    properties,
                    shape,
                }),
                Parsed::Unsupported(ty) => {
                    debug!(index, geometry = %ty, "skipping non-track geometry");
                    out.skipped += 1;
                }
            }
        }
        Ok(out)
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }
}

fn parse_geometry(value: &Value) -> Result<Parsed, String> {
    // Unlocated features carry a null geometry.
    if value.is_null() {
        return Ok(Parsed::Unsupported("null".to_string()));
    }
    let obj = value
        .as_object()
        .ok_or("geometry must be an object".to_string())?;
    let ty = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or("geometry missing type".to_string())?;

    let coords = || {
        obj.get("coordinates")
            .ok_or("geometry missing coordinates".to_string())
    };

    let shape = match ty {
        "Point" => TrackShape::Point(parse_point(coords()?)?),
        "MultiPoint" => TrackShape::MultiPoint(parse_points(coords()?)?),
        "LineString" => TrackShape::LineString(parse_points(coords()?)?),
        "MultiLineString" => TrackShape::MultiLineString(parse_lines(coords()?)?),
        other => return Ok(Parsed::Unsupported(other.to_string())),
    };
    Ok(Parsed::Shape(shape))
}

fn parse_point(coords: &Value) -> Result<GeoPoint, String> {
    let arr = coords
        .as_array()
        .ok_or("position must be an array".to_string())?;
    if arr.len() < 2 {
        return Err("position must have [lon, lat]".to_string());
    }
    let lon = arr[0].as_f64().ok_or("lon must be a number".to_string())?;
    let lat = arr[1].as_f64().ok_or("lat must be a number".to_string())?;
    Ok(GeoPoint::new(lon, lat))
}

fn parse_points(coords: &Value) -> Result<Vec<GeoPoint>, String> {
    let arr = coords
        .as_array()
        .ok_or("coordinates must be an array".to_string())?;
    arr.iter().map(parse_point).collect()
}

fn parse_lines(coords: &Value) -> Result<Vec<Vec<GeoPoint>>, String> {
    let arr = coords
        .as_array()
        .ok_or("MultiLineString coordinates must be an array".to_string())?;
    arr.iter().map(parse_points).collect()
}

#[cfg(test)]
mod tests {
    use super::{TrackCollection, TrackCollectionError, TrackShape};
    use foundation::GeoPoint;
    use serde_json::json;

    #[test]
    fn parses_segmented_tracks() {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "geometry": { "type": "LineString", "coordinates": [[-75.1, 24.0], [-76.0, 25.2]] },
                    "properties": { "sid": "2004247N10332", "name": "IVAN", "wind": 140, "time": "2004-09-11" }
                },
                {
                    "type": "Feature",
                    "id": 7,
                    "geometry": { "type": "Point", "coordinates": [-80.0, 26.0] },
                    "properties": { "wind": "35" }
                }
            ]
        });
        let c = TrackCollection::from_geojson_value(&doc).expect("parse");
        assert_eq!(c.len(), 2);
        assert_eq!(c.features[0].number("wind"), Some(140.0));
        assert_eq!(c.features[0].text("name"), Some("IVAN"));
        assert_eq!(c.features[1].id.as_deref(), Some("7"));
        assert_eq!(c.features[1].number("wind"), Some(35.0));
        assert_eq!(
            c.features[0].shape.points().copied().collect::<Vec<_>>(),
            vec![GeoPoint::new(-75.1, 24.0), GeoPoint::new(-76.0, 25.2)]
        );
    }

    #[test]
    fn bare_features_object_is_accepted() {
        let c = TrackCollection::from_geojson_value(&json!({ "features": [] })).expect("parse");
        assert!(c.is_empty());
    }

    #[test]
    fn polygons_are_skipped_not_fatal() {
        let doc = json!({
            "features": [
                { "type": "Feature", "geometry": { "type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]] } },
                { "type": "Feature", "geometry": { "type": "MultiLineString", "coordinates": [[[0,0],[1,1]],[[2,2],[3,3]]] } }
            ]
        });
        let c = TrackCollection::from_geojson_value(&doc).expect("parse");
        assert_eq!(c.skipped, 1);
        assert!(matches!(c.features[0].shape, TrackShape::MultiLineString(ref l) if l.len() == 2));
        assert_eq!(c.features[0].shape.points().count(), 4);
    }

    #[test]
    fn null_geometry_is_skipped() {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "geometry": { "type": "LineString", "coordinates": [[-60.0, 15.0], [-61.0, 16.0]] }, "properties": { "wind": 90 } },
                { "type": "Feature", "geometry": null, "properties": { "wind": 40 } }
            ]
        });
        let c = TrackCollection::from_geojson_value(&doc).expect("parse");
        assert_eq!(c.len(), 1);
        assert_eq!(c.skipped, 1);
        assert_eq!(c.features[0].number("wind"), Some(90.0));
    }

    #[test]
    fn rejects_non_collections_and_bad_coordinates() {
        assert!(matches!(
            TrackCollection::from_geojson_value(&json!({ "type": "Feature" })),
            Err(TrackCollectionError::NotAFeatureCollection)
        ));
        let bad = json!({ "features": [{ "geometry": { "type": "Point", "coordinates": ["x", 1] } }] });
        assert!(matches!(
            TrackCollection::from_geojson_value(&bad),
            Err(TrackCollectionError::InvalidFeature { index: 0, .. })
        ));
        assert!(matches!(
            TrackCollection::from_geojson_str("{"),
            Err(TrackCollectionError::Json(_))
        ));
    }
}
