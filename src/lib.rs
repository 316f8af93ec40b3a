// src/lib.rs
// Public library surface for the dashboard shell and integration tests.

pub mod cache;
pub mod config;
pub mod events;
pub mod fetch;
pub mod poll;
pub mod watch;

// ---- Re-exports for stable public API ----
pub use crate::cache::TimedCache;
pub use crate::config::{AppConfig, BoundingBox, DeviceProfile, ProviderConfig};
pub use crate::events::{Domain, UpdateBus, UpdateEvent};
pub use crate::fetch::backend::{
    DataBackend, Filter, FixtureBackend, HttpBackend, RowQuery, RowSet,
};
pub use crate::fetch::types::{Envelope, Geometry, NormalizedFeature, RawRecord};
pub use crate::fetch::{FetchService, RefreshTag, MIN_SEARCH_LEN};
pub use crate::poll::PollingManager;
pub use crate::watch::{spawn_watch, start_default_watches, Snapshot};

use std::sync::Arc;

use anyhow::Result;

/// Everything the dashboard shell needs, wired once at startup and
/// passed by reference to whatever consumes it. No module-level
/// singletons: a fresh `Core` per test is cheap and isolated.
pub struct Core {
    pub service: Arc<FetchService>,
    pub manager: PollingManager,
    pub bus: UpdateBus,
}

/// Build the core against the live HTTP backend described by `cfg`.
pub fn build_core(cfg: AppConfig) -> Result<Core> {
    let backend = Arc::new(HttpBackend::new(&cfg.backend_url, cfg.fetch_timeout())?);
    Ok(build_core_with(backend, cfg))
}

/// Build the core against any backend; used by the demo binary and
/// tests to substitute canned data.
pub fn build_core_with(backend: Arc<dyn DataBackend>, cfg: AppConfig) -> Core {
    Core {
        service: Arc::new(FetchService::new(backend, cfg)),
        manager: PollingManager::new(),
        bus: UpdateBus::default(),
    }
}
