// src/fetch/outages.rs
use anyhow::{anyhow, Context, Result};

use super::backend::RowQuery;
use super::normalize;
use super::types::Envelope;
use super::FetchService;

pub(super) const KEY_PREFIX: &str = "outages_";

impl FetchService {
    /// Outage feed for one configured provider. Providers publish
    /// either table rows or a hosted GeoJSON document; either way the
    /// result is restricted to the provider's service area when a bbox
    /// is configured, and the count is derived from the filtered
    /// feature list so the two never diverge.
    pub async fn outages_for_provider(&self, provider_id: &str) -> Envelope {
        let key = format!("{KEY_PREFIX}{provider_id}");
        self.cached(&key, self.cfg.ttl.fast(), self.fetch_outages(provider_id))
            .await
    }

    async fn fetch_outages(&self, provider_id: &str) -> Result<Envelope> {
        let provider = self
            .cfg
            .provider(provider_id)
            .ok_or_else(|| anyhow!("unknown outage provider: {provider_id}"))?;

        let (data, mut features) = if let Some(url) = &provider.document {
            let document = self
                .backend()
                .fetch_geojson(url)
                .await
                .with_context(|| format!("fetching outage document for {provider_id}"))?;
            normalize::normalize_geojson(&document)
        } else if let Some(table) = &provider.table {
            let set = self
                .backend()
                .query_rows(&RowQuery::table(table))
                .await
                .with_context(|| format!("fetching outage rows for {provider_id}"))?;
            let features = normalize::normalize_rows(&set.rows);
            (set.rows, features)
        } else {
            return Err(anyhow!(
                "outage provider {provider_id} has neither a document nor a table configured"
            ));
        };

        if let Some(bbox) = &provider.bbox {
            features = normalize::filter_features_bbox(features, bbox);
        }
        Ok(Envelope::from_features(data, features))
    }
}
