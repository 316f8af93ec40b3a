// src/fetch/sites.rs
use anyhow::{Context, Result};

use super::backend::RowQuery;
use super::normalize;
use super::types::Envelope;
use super::FetchService;

pub(super) const KEY_SITES: &str = "node_sites";

impl FetchService {
    /// Network node sites (cabinets, huts, substations). Slow-moving
    /// reference data, so this domain uses the long cache window.
    pub async fn node_sites(&self) -> Envelope {
        self.cached(KEY_SITES, self.cfg.ttl.reference(), self.fetch_sites())
            .await
    }

    async fn fetch_sites(&self) -> Result<Envelope> {
        let query = RowQuery::table(&self.cfg.tables.node_sites).not_null("latitude");
        let set = self
            .backend()
            .query_rows(&query)
            .await
            .context("fetching node sites")?;
        let features = normalize::normalize_rows(&set.rows);
        Ok(Envelope::from_features(set.rows, features))
    }
}
