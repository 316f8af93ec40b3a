// src/fetch/normalize.rs
//! Heterogeneous backend rows and GeoJSON documents into the uniform
//! feature shape. Records without a resolvable position are dropped
//! here, never forwarded downstream with a null geometry.

use serde_json::Value;

use crate::config::BoundingBox;

use super::types::{Geometry, NormalizedFeature, RawRecord};

/// Column names probed, in order, when resolving each canonical field.
const ID_FIELDS: &[&str] = &["id", "objectid", "uid"];
const LAT_FIELDS: &[&str] = &["latitude", "lat"];
const LON_FIELDS: &[&str] = &["longitude", "lon", "lng"];
const STATUS_FIELDS: &[&str] = &["status", "state"];
const LABEL_FIELDS: &[&str] = &["name", "label", "title"];

/// First present, non-null value among `fields`, rendered as a string.
/// Missing or null resolves to `None` — never to an empty-string
/// default, so legitimate falsy values (0, false) survive intact.
fn first_string(record: &RawRecord, fields: &[&str]) -> Option<String> {
    for field in fields {
        match record.get(*field) {
            Some(Value::String(s)) => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            Some(Value::Bool(b)) => return Some(b.to_string()),
            _ => continue,
        }
    }
    None
}

/// First present, finite numeric value among `fields`. Accepts JSON
/// numbers and numeric strings (some backends type coordinate columns
/// as text). Zero is a valid coordinate, not a missing one.
fn first_f64(record: &RawRecord, fields: &[&str]) -> Option<f64> {
    for field in fields {
        let parsed = match record.get(*field) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        if let Some(v) = parsed {
            if v.is_finite() {
                return Some(v);
            }
        }
    }
    None
}

fn parse_geometry(value: &Value) -> Option<Geometry> {
    serde_json::from_value(value.clone()).ok()
}

/// Geometry resolution order: the record's own geometry object first,
/// then a point synthesized from latitude/longitude columns, else none.
fn geometry_of(record: &RawRecord) -> Option<Geometry> {
    if let Some(raw) = record.get("geometry") {
        if let Some(geometry) = parse_geometry(raw) {
            return Some(geometry);
        }
    }
    let lat = first_f64(record, LAT_FIELDS)?;
    let lon = first_f64(record, LON_FIELDS)?;
    Some(Geometry::Point([lon, lat]))
}

fn normalize_record(record: &RawRecord, index: usize) -> Option<NormalizedFeature> {
    let geometry = geometry_of(record)?;
    // Rows without an id column get a positional one; diffing treats
    // them as opaque.
    let id = first_string(record, ID_FIELDS).unwrap_or_else(|| format!("row-{index}"));
    Some(NormalizedFeature {
        id,
        geometry,
        status: first_string(record, STATUS_FIELDS),
        label: first_string(record, LABEL_FIELDS),
        extra: record.clone(),
    })
}

/// Normalize a batch of raw rows. The result never exceeds the input
/// length: unmappable rows are dropped, and every kept feature carries
/// a concrete geometry.
pub fn normalize_rows(rows: &[RawRecord]) -> Vec<NormalizedFeature> {
    rows.iter()
        .enumerate()
        .filter_map(|(i, r)| normalize_record(r, i))
        .collect()
}

/// Rows and features out of a hosted GeoJSON FeatureCollection. Each
/// feature's properties map becomes a raw record; a missing or
/// malformed `features` array is a valid empty result, not an error.
pub fn normalize_geojson(document: &Value) -> (Vec<RawRecord>, Vec<NormalizedFeature>) {
    let Some(members) = document.get("features").and_then(Value::as_array) else {
        return (Vec::new(), Vec::new());
    };

    let mut data = Vec::with_capacity(members.len());
    let mut features = Vec::with_capacity(members.len());
    for (index, member) in members.iter().enumerate() {
        let mut record: RawRecord = member
            .get("properties")
            .and_then(Value::as_object)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        // Feature-level ids are common in outage feeds; surface them as
        // a column unless the properties already carry one.
        if !record.contains_key("id") {
            if let Some(id) = member.get("id") {
                if !id.is_null() {
                    record.insert("id".to_string(), id.clone());
                }
            }
        }
        if let Some(geometry) = member.get("geometry") {
            if !geometry.is_null() {
                record.insert("geometry".to_string(), geometry.clone());
            }
        }
        if let Some(feature) = normalize_record(&record, index) {
            features.push(feature);
        }
        data.push(record);
    }
    (data, features)
}

/// Restrict features to a service-area bbox using each feature's
/// representative point (original point, or first-ring mean for
/// polygons). The count downstream is derived from this same filtered
/// list, so count and features never diverge.
pub fn filter_features_bbox(
    features: Vec<NormalizedFeature>,
    bbox: &BoundingBox,
) -> Vec<NormalizedFeature> {
    features
        .into_iter()
        .filter(|f| {
            f.geometry
                .representative_point()
                .map(|p| bbox.contains(p))
                .unwrap_or(false)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::types::record;
    use serde_json::json;

    #[test]
    fn rows_without_position_are_dropped() {
        let rows = vec![
            record(&[("id", json!("a")), ("latitude", json!(36.1)), ("longitude", json!(-115.2))]),
            record(&[("id", json!("b"))]),
            record(&[("id", json!("c")), ("latitude", json!(null)), ("longitude", json!(-115.0))]),
        ];
        let features = normalize_rows(&rows);
        assert_eq!(features.len(), 1);
        assert!(features.len() <= rows.len());
        assert_eq!(features[0].id, "a");
        assert_eq!(features[0].geometry, Geometry::Point([-115.2, 36.1]));
    }

    #[test]
    fn zero_coordinates_are_valid_data() {
        // (0, 0) is a real position; explicit null checks must not
        // treat it as missing.
        let rows = vec![record(&[
            ("id", json!("gulf")),
            ("latitude", json!(0.0)),
            ("longitude", json!(0.0)),
        ])];
        let features = normalize_rows(&rows);
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].geometry, Geometry::Point([0.0, 0.0]));
    }

    #[test]
    fn numeric_string_coordinates_parse() {
        let rows = vec![record(&[
            ("id", json!(42)),
            ("lat", json!("36.10")),
            ("lng", json!("-115.20")),
        ])];
        let features = normalize_rows(&rows);
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].id, "42");
    }

    #[test]
    fn own_geometry_wins_over_lat_lon_columns() {
        let rows = vec![record(&[
            ("id", json!("a")),
            ("geometry", json!({"type": "Point", "coordinates": [1.0, 2.0]})),
            ("latitude", json!(99.0)),
            ("longitude", json!(99.0)),
        ])];
        let features = normalize_rows(&rows);
        assert_eq!(features[0].geometry, Geometry::Point([1.0, 2.0]));
    }

    #[test]
    fn source_fields_are_preserved_in_extra() {
        let rows = vec![record(&[
            ("id", json!("a")),
            ("latitude", json!(1.0)),
            ("longitude", json!(2.0)),
            ("customers_affected", json!(0)),
        ])];
        let features = normalize_rows(&rows);
        assert_eq!(features[0].extra.get("customers_affected"), Some(&json!(0)));
    }

    #[test]
    fn geojson_document_normalizes_and_keeps_unmappable_rows_in_data() {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "id": "out-1",
                    "geometry": {"type": "Polygon", "coordinates": [[[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0]]]},
                    "properties": {"cause": "storm"}
                },
                {
                    "type": "Feature",
                    "geometry": null,
                    "properties": {"cause": "unknown"}
                }
            ]
        });
        let (data, features) = normalize_geojson(&doc);
        assert_eq!(data.len(), 2);
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].id, "out-1");
        assert_eq!(
            features[0].geometry.representative_point(),
            Some([1.0, 1.0])
        );
    }

    #[test]
    fn missing_features_array_is_a_valid_empty_result() {
        let (data, features) = normalize_geojson(&json!({"type": "FeatureCollection"}));
        assert!(data.is_empty());
        assert!(features.is_empty());
    }

    #[test]
    fn bbox_filter_uses_representative_point() {
        let bbox = BoundingBox {
            min_lon: 0.0,
            min_lat: 0.0,
            max_lon: 10.0,
            max_lat: 10.0,
        };
        let inside = NormalizedFeature {
            id: "in".into(),
            geometry: Geometry::Polygon(vec![vec![[1.0, 1.0], [3.0, 1.0], [3.0, 3.0], [1.0, 3.0]]]),
            status: None,
            label: None,
            extra: RawRecord::new(),
        };
        let outside = NormalizedFeature {
            id: "out".into(),
            geometry: Geometry::Point([50.0, 50.0]),
            status: None,
            label: None,
            extra: RawRecord::new(),
        };
        let kept = filter_features_bbox(vec![inside, outside], &bbox);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "in");
    }
}
