//! GeoJSON reader for the daily advisory grid files
//!
//! Each file is a FeatureCollection of point features; feature properties hold
//! the date-suffixed forecast fields.

use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

use shared::{FieldValue, GeoRecord, GpsCoordinates};

use crate::error::{AppError, AppResult};

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Option<Geometry>,
    #[serde(default)]
    properties: Option<serde_json::Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Point { coordinates: Vec<f64> },
    #[serde(other)]
    Unsupported,
}

/// Read every grid cell of a dataset file.
///
/// A file that does not exist yields `DatasetUnavailable`; anything that
/// exists but cannot be read as point features yields `DatasetMalformed`.
pub fn read_records(path: &Path) -> AppResult<Vec<GeoRecord>> {
    let display = path.display().to_string();
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::DatasetUnavailable {
                tried: vec![display],
            })
        }
        Err(e) => {
            return Err(AppError::DatasetMalformed {
                path: display,
                reason: e.to_string(),
            })
        }
    };

    parse_records(&bytes).map_err(|reason| AppError::DatasetMalformed {
        path: display,
        reason,
    })
}

/// Parse a FeatureCollection body into records
pub fn parse_records(bytes: &[u8]) -> Result<Vec<GeoRecord>, String> {
    let collection: FeatureCollection =
        serde_json::from_slice(bytes).map_err(|e| format!("invalid GeoJSON: {}", e))?;

    collection
        .features
        .into_iter()
        .enumerate()
        .map(|(i, feature)| convert_feature(feature).map_err(|e| format!("feature {}: {}", i, e)))
        .collect()
}

fn convert_feature(feature: Feature) -> Result<GeoRecord, String> {
    let location = match feature.geometry {
        Some(Geometry::Point { coordinates }) => match coordinates.as_slice() {
            [lon, lat, ..] => GpsCoordinates::new(*lat, *lon),
            _ => return Err("point needs two coordinates".to_string()),
        },
        Some(Geometry::Unsupported) => return Err("only Point geometries are supported".to_string()),
        None => return Err("missing geometry".to_string()),
    };

    let mut record = GeoRecord::new(location);
    for (key, value) in feature.properties.unwrap_or_default() {
        match convert_value(value) {
            Some(value) => {
                record.fields.insert(key, value);
            }
            None => tracing::trace!("Ignoring non-scalar property {}", key),
        }
    }
    Ok(record)
}

fn convert_value(value: Value) -> Option<FieldValue> {
    match value {
        Value::Null => Some(FieldValue::Missing),
        Value::Number(n) => Some(n.as_f64().map_or(FieldValue::Missing, FieldValue::number)),
        Value::String(s) if s.eq_ignore_ascii_case("nan") => Some(FieldValue::Missing),
        Value::String(s) => Some(FieldValue::Text(s)),
        Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [51.0, 35.0]},
                "properties": {
                    "tmax_Time=20240101": 38.456,
                    "rh_Time=20240101": null,
                    "advice_Time=20240101": "Irrigate in the evening",
                    "wind_Time=20240101": "NaN",
                    "flags": [1, 2]
                }
            }
        ]
    }"#;

    #[test]
    fn test_parse_point_feature() {
        let records = parse_records(SAMPLE.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.location, GpsCoordinates::new(35.0, 51.0));
        assert_eq!(
            record.fields.get("tmax_Time=20240101"),
            Some(&FieldValue::Number(38.456))
        );
        assert_eq!(
            record.fields.get("rh_Time=20240101"),
            Some(&FieldValue::Missing)
        );
        assert_eq!(
            record.fields.get("wind_Time=20240101"),
            Some(&FieldValue::Missing)
        );
        assert_eq!(
            record.fields.get("advice_Time=20240101"),
            Some(&FieldValue::Text("Irrigate in the evening".into()))
        );
        assert!(record.fields.get("flags").is_none());
    }

    #[test]
    fn test_polygon_is_rejected() {
        let body = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":{"type":"Polygon","coordinates":[]},"properties":{}}
        ]}"#;
        let err = parse_records(body.as_bytes()).unwrap_err();
        assert!(err.contains("only Point geometries"));
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(parse_records(b"{not json").is_err());
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let err = read_records(Path::new("/nonexistent/advisory_20240101.geojson")).unwrap_err();
        assert!(matches!(err, AppError::DatasetUnavailable { .. }));
    }
}
