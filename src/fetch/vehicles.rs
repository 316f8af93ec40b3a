// src/fetch/vehicles.rs
use anyhow::{Context, Result};

use super::backend::RowQuery;
use super::normalize;
use super::types::Envelope;
use super::FetchService;

pub(super) const KEY_VEHICLES: &str = "vehicles";

impl FetchService {
    /// Latest fleet vehicle positions. Telemetry moves constantly, so
    /// this domain uses the short cache window.
    pub async fn vehicles(&self) -> Envelope {
        self.cached(KEY_VEHICLES, self.cfg.ttl.fast(), self.fetch_vehicles())
            .await
    }

    async fn fetch_vehicles(&self) -> Result<Envelope> {
        // Units without a position fix report null coordinates; filter
        // them server-side rather than shipping rows normalization
        // would drop anyway.
        let query = RowQuery::table(&self.cfg.tables.vehicles).not_null("latitude");
        let set = self
            .backend()
            .query_rows(&query)
            .await
            .context("fetching vehicle telemetry")?;
        let features = normalize::normalize_rows(&set.rows);
        Ok(Envelope::from_features(set.rows, features))
    }
}
