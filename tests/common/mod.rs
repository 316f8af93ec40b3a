// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use gridwatch::fetch::types::{record, RawRecord};
use gridwatch::{
    AppConfig, BoundingBox, DataBackend, FetchService, FixtureBackend, ProviderConfig, RowQuery,
    RowSet,
};

pub const OUTAGE_DOC_URL: &str = "fixture://valley-electric/outages.geojson";

/// Fixture backend wrapper that counts calls and can be switched into
/// a failing mode, for cache-hit and stale-fallback assertions.
pub struct ProbeBackend {
    inner: FixtureBackend,
    row_calls: AtomicUsize,
    doc_calls: AtomicUsize,
    failing: AtomicBool,
}

impl ProbeBackend {
    pub fn new(inner: FixtureBackend) -> Self {
        Self {
            inner,
            row_calls: AtomicUsize::new(0),
            doc_calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub fn row_calls(&self) -> usize {
        self.row_calls.load(Ordering::SeqCst)
    }

    pub fn doc_calls(&self) -> usize {
        self.doc_calls.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.row_calls() + self.doc_calls()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl DataBackend for ProbeBackend {
    async fn query_rows(&self, query: &RowQuery) -> Result<RowSet> {
        self.row_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            bail!("backend unavailable");
        }
        self.inner.query_rows(query).await
    }

    async fn fetch_geojson(&self, url: &str) -> Result<Value> {
        self.doc_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            bail!("backend unavailable");
        }
        self.inner.fetch_geojson(url).await
    }
}

/// Three mappable offline subscribers, one offline row without
/// coordinates, two online.
pub fn subscriber_rows() -> Vec<RawRecord> {
    vec![
        record(&[
            ("id", json!("sub-1")),
            ("name", json!("Elm Street Node")),
            ("address", json!("12 Elm St")),
            ("status", json!("offline")),
            ("latitude", json!(36.02)),
            ("longitude", json!(-115.12)),
        ]),
        record(&[
            ("id", json!("sub-2")),
            ("name", json!("Oak Avenue Node")),
            ("address", json!("40 Oak Ave")),
            ("status", json!("offline")),
            ("latitude", json!(36.05)),
            ("longitude", json!(-115.20)),
        ]),
        record(&[
            ("id", json!("sub-3")),
            ("name", json!("Pine Court Node")),
            ("address", json!("7 Pine Ct")),
            ("status", json!("offline")),
            ("latitude", json!(36.08)),
            ("longitude", json!(-115.07)),
        ]),
        record(&[
            ("id", json!("sub-4")),
            ("name", json!("Unprovisioned Node")),
            ("status", json!("offline")),
        ]),
        record(&[
            ("id", json!("sub-5")),
            ("name", json!("Elmwood Node")),
            ("address", json!("3 Elmwood Dr")),
            ("status", json!("online")),
            ("latitude", json!(36.11)),
            ("longitude", json!(-115.16)),
        ]),
        record(&[
            ("id", json!("sub-6")),
            ("name", json!("Birch Lane Node")),
            ("address", json!("9 Birch Ln")),
            ("status", json!("online")),
            ("latitude", json!(36.13)),
            ("longitude", json!(-115.02)),
        ]),
    ]
}

/// One outage polygon inside the valley-electric bbox, one outside.
pub fn outage_document() -> Value {
    json!({
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "id": "out-1",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [-115.3, 36.0], [-115.1, 36.0],
                        [-115.1, 36.2], [-115.3, 36.2]
                    ]]
                },
                "properties": {"cause": "storm", "customers_affected": 140}
            },
            {
                "type": "Feature",
                "id": "out-2",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [-100.0, 40.0], [-99.8, 40.0],
                        [-99.8, 40.2], [-100.0, 40.2]
                    ]]
                },
                "properties": {"cause": "equipment", "customers_affected": 12}
            }
        ]
    })
}

pub fn fixtures() -> FixtureBackend {
    FixtureBackend::new()
        .with_table("subscriber_status", subscriber_rows())
        .with_table(
            "fleet_vehicles",
            vec![record(&[
                ("id", json!("truck-7")),
                ("name", json!("Line Crew 7")),
                ("latitude", json!(36.10)),
                ("longitude", json!(-115.30)),
            ])],
        )
        .with_table(
            "node_sites",
            vec![record(&[
                ("id", json!("hut-3")),
                ("name", json!("Distribution Hut 3")),
                ("latitude", json!(36.07)),
                ("longitude", json!(-115.22)),
            ])],
        )
        .with_document(OUTAGE_DOC_URL, outage_document())
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.outage_providers = vec![ProviderConfig {
        id: "valley-electric".to_string(),
        table: None,
        document: Some(OUTAGE_DOC_URL.to_string()),
        bbox: Some(BoundingBox {
            min_lon: -116.5,
            min_lat: 35.4,
            max_lon: -114.5,
            max_lat: 37.0,
        }),
    }];
    cfg
}

/// A probe-wrapped service over the standard fixtures.
pub fn probe_service() -> (Arc<ProbeBackend>, FetchService) {
    let backend = Arc::new(ProbeBackend::new(fixtures()));
    let service = FetchService::new(backend.clone(), test_config());
    (backend, service)
}
