// src/fetch/mod.rs
pub mod backend;
pub mod normalize;
pub mod types;

mod outages;
mod search;
mod sites;
mod subscribers;
mod vehicles;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;

use crate::cache::TimedCache;
use crate::config::AppConfig;

use backend::DataBackend;
use types::Envelope;

pub use search::MIN_SEARCH_LEN;

/// One-time metrics registration (so series show up on scrape).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("fetch_cache_hits_total", "Domain fetches served from cache.");
        describe_counter!("fetch_remote_total", "Fetches that went to the backend.");
        describe_counter!("fetch_errors_total", "Remote fetch failures.");
        describe_counter!(
            "fetch_stale_fallback_total",
            "Failures answered with a stale cached value."
        );
        describe_counter!(
            "fetch_search_short_circuit_total",
            "Searches rejected locally for being under the minimum length."
        );
    });
}

/// Cache-key families a caller can force-refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTag {
    Offline,
    Online,
    Summary,
    Outages,
    Vehicles,
    Sites,
    Search,
    All,
}

/// Domain fetch methods over the timed cache.
///
/// Constructed once at the composition root and passed by reference to
/// whatever needs it (layer manager, polling callbacks, UI). Every
/// list-shaped method returns an [`Envelope`] and never errors: fetch
/// failures degrade to the last cached value or an empty result.
pub struct FetchService {
    backend: Arc<dyn DataBackend>,
    cache: TimedCache<Envelope>,
    cfg: AppConfig,
}

impl FetchService {
    pub fn new(backend: Arc<dyn DataBackend>, cfg: AppConfig) -> Self {
        ensure_metrics_described();
        Self {
            backend,
            cache: TimedCache::new(),
            cfg,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.cfg
    }

    /// Cache-through fetch shared by every domain method: a valid hit
    /// short-circuits without touching the network; a miss fetches and
    /// stores; a failed fetch falls back to stale data of any age, or
    /// to an empty degraded envelope when nothing was ever cached.
    ///
    /// Overlapping fetches for the same key are tolerated and resolve
    /// last-write-wins; both results represent equally fresh data.
    async fn cached<F>(&self, key: &str, ttl: Duration, fetch: F) -> Envelope
    where
        F: Future<Output = Result<Envelope>>,
    {
        if self.cache.is_valid(key) {
            if let Some(hit) = self.cache.get(key) {
                counter!("fetch_cache_hits_total").increment(1);
                return hit;
            }
        }

        counter!("fetch_remote_total").increment(1);
        match fetch.await {
            Ok(envelope) => {
                self.cache.set(key, envelope.clone(), ttl);
                envelope
            }
            Err(e) => {
                counter!("fetch_errors_total").increment(1);
                tracing::warn!(error = ?e, key, "fetch failed");
                match self.cache.get(key) {
                    Some(stale) => {
                        counter!("fetch_stale_fallback_total").increment(1);
                        stale.into_degraded(format!("{e:#}"))
                    }
                    None => Envelope::empty_error(format!("{e:#}")),
                }
            }
        }
    }

    /// Drops the named cache family so the next scheduled poll or
    /// user-initiated refresh forces a live fetch.
    pub fn refresh(&self, tag: RefreshTag) {
        match tag {
            RefreshTag::Offline => {
                self.cache.invalidate(subscribers::KEY_OFFLINE);
            }
            RefreshTag::Online => {
                self.cache.invalidate(subscribers::KEY_ONLINE);
            }
            RefreshTag::Summary => {
                self.cache.invalidate(subscribers::KEY_SUMMARY);
            }
            RefreshTag::Outages => {
                self.cache.invalidate_prefix(outages::KEY_PREFIX);
            }
            RefreshTag::Vehicles => {
                self.cache.invalidate(vehicles::KEY_VEHICLES);
            }
            RefreshTag::Sites => {
                self.cache.invalidate(sites::KEY_SITES);
            }
            RefreshTag::Search => {
                self.cache.invalidate_prefix(search::KEY_PREFIX);
            }
            RefreshTag::All => self.cache.clear(),
        }
        tracing::debug!(tag = ?tag, "cache refresh requested");
    }

    /// Drops every cached entry.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub(crate) fn backend(&self) -> &Arc<dyn DataBackend> {
        &self.backend
    }
}
