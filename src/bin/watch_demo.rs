//! Demo that runs the watch loops against canned fixture data and
//! prints the update events as they arrive.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gridwatch::fetch::types::record;
use gridwatch::{
    build_core_with, start_default_watches, AppConfig, BoundingBox, FixtureBackend,
    ProviderConfig, RefreshTag,
};

const OUTAGE_DOC_URL: &str = "fixture://valley-electric/outages.geojson";

fn demo_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    // Short cadence so the demo produces output quickly.
    cfg.poll.desktop_interval_secs = 2;
    cfg.poll.heartbeat_every = 3;
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

fn demo_backend() -> FixtureBackend {
    FixtureBackend::new()
        .with_table(
            "subscriber_status",
            vec![
                record(&[
                    ("id", json!("sub-100")),
                    ("name", json!("Elm Street Node")),
                    ("status", json!("offline")),
                    ("latitude", json!(36.02)),
                    ("longitude", json!(-115.12)),
                ]),
                record(&[
                    ("id", json!("sub-101")),
                    ("name", json!("Oak Avenue Node")),
                    ("status", json!("online")),
                    ("latitude", json!(36.04)),
                    ("longitude", json!(-115.18)),
                ]),
            ],
        )
        .with_table(
            "fleet_vehicles",
            vec![record(&[
                ("id", json!("truck-7")),
                ("name", json!("Line Crew 7")),
                ("latitude", json!(36.10)),
                ("longitude", json!(-115.30)),
            ])],
        )
        .with_document(
            OUTAGE_DOC_URL,
            json!({
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "id": "out-55",
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[
                            [-115.3, 36.0], [-115.1, 36.0],
                            [-115.1, 36.2], [-115.3, 36.2]
                        ]]
                    },
                    "properties": {"cause": "storm", "customers_affected": 140}
                }]
            }),
        )
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();

    let cfg = demo_config();
    let core = build_core_with(Arc::new(demo_backend()), cfg.clone());
    let mut events = core.bus.subscribe();

    start_default_watches(&core.manager, &core.bus, core.service.clone(), &cfg);

    // Off-cycle kick so the first data shows up before the first tick.
    core.manager.trigger("subscribers");

    let listener = tokio::spawn(async move {
        while let Ok(ev) = events.recv().await {
            println!(
                "[{}] {} count={} (+{} -{}){}",
                ev.task,
                ev.domain.as_str(),
                ev.count,
                ev.added,
                ev.removed,
                if ev.degraded { " DEGRADED" } else { "" }
            );
        }
    });

    tokio::time::sleep(Duration::from_secs(9)).await;

    // A user-initiated "refresh now": drop the cache, poke the task.
    core.service.refresh(RefreshTag::Offline);
    core.manager.trigger("subscribers");
    tokio::time::sleep(Duration::from_secs(1)).await;

    core.manager.stop_all();
    listener.abort();
    println!("watch-demo done");
}
