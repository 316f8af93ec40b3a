// src/fetch/types.rs
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One backend row, untouched: column name -> JSON value.
pub type RawRecord = BTreeMap<String, Value>;

/// Geometry carried by a normalized feature. Coordinates follow the
/// GeoJSON axis order, `[longitude, latitude]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point([f64; 2]),
    Polygon(Vec<Vec<[f64; 2]>>),
}

impl Geometry {
    /// Representative point used for geographic filtering: the point
    /// itself, or the arithmetic mean of the first ring's vertices for
    /// polygons. The mean is an approximation, not a true area
    /// centroid; good enough for bbox filtering and display anchors.
    pub fn representative_point(&self) -> Option<[f64; 2]> {
        match self {
            Geometry::Point(p) => Some(*p),
            Geometry::Polygon(rings) => {
                let ring = rings.first()?;
                if ring.is_empty() {
                    return None;
                }
                let (sx, sy) = ring
                    .iter()
                    .fold((0.0_f64, 0.0_f64), |(sx, sy), p| (sx + p[0], sy + p[1]));
                let n = ring.len() as f64;
                Some([sx / n, sy / n])
            }
        }
    }
}

/// One real-world entity in the uniform shape the map layers consume.
///
/// Canonical fields are explicit; the full source row is preserved in
/// `extra` so display code can read domain-specific columns without a
/// second round trip.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedFeature {
    pub id: String,
    pub geometry: Geometry,
    pub status: Option<String>,
    pub label: Option<String>,
    pub extra: RawRecord,
}

/// Uniform return shape of every domain fetch method.
///
/// `error: true` means "render what you have, optionally show a
/// degraded-state indicator", never a hard failure; `stale` marks the
/// payload as a previously cached value served because a refetch
/// failed.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub count: u64,
    pub data: Vec<RawRecord>,
    pub features: Vec<NormalizedFeature>,
    pub last_updated: DateTime<Utc>,
    pub error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub stale: bool,
}

impl Envelope {
    /// Fresh result. `count` is the number of mappable features; the
    /// summary and search domains override it where their counting
    /// rules differ.
    pub fn from_features(data: Vec<RawRecord>, features: Vec<NormalizedFeature>) -> Self {
        Self {
            count: features.len() as u64,
            data,
            features,
            last_updated: Utc::now(),
            error: false,
            error_message: None,
            stale: false,
        }
    }

    /// Valid empty result. Distinct from a fetch failure: an empty or
    /// missing payload array is data, not an error.
    pub fn empty() -> Self {
        Self::from_features(Vec::new(), Vec::new())
    }

    /// Empty result tagged with a fetch error; used when no cached
    /// value of any age exists to fall back on.
    pub fn empty_error(message: impl Into<String>) -> Self {
        let mut env = Self::empty();
        env.error = true;
        env.error_message = Some(message.into());
        env
    }

    /// Same payload, flagged degraded; used when a refetch failed and
    /// the last cached value is being served instead.
    pub fn into_degraded(mut self, message: impl Into<String>) -> Self {
        self.error = true;
        self.error_message = Some(message.into());
        self.stale = true;
        self
    }
}

/// Convenience for building raw records in fixtures and tests.
pub fn record(fields: &[(&str, Value)]) -> RawRecord {
    fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
