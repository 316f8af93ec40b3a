// src/fetch/subscribers.rs
use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};

use super::backend::RowQuery;
use super::normalize;
use super::types::{Envelope, RawRecord};
use super::FetchService;

pub(super) const KEY_OFFLINE: &str = "subscribers_offline";
pub(super) const KEY_ONLINE: &str = "subscribers_online";
pub(super) const KEY_SUMMARY: &str = "subscribers_summary";

impl FetchService {
    /// Subscriber connections currently reported offline.
    pub async fn offline_subscribers(&self) -> Envelope {
        self.cached(
            KEY_OFFLINE,
            self.cfg.ttl.standard(),
            self.fetch_by_status("offline"),
        )
        .await
    }

    /// Subscriber connections currently reported online.
    pub async fn online_subscribers(&self) -> Envelope {
        self.cached(
            KEY_ONLINE,
            self.cfg.ttl.standard(),
            self.fetch_by_status("online"),
        )
        .await
    }

    /// Counts per connection status. The envelope's `data` holds one
    /// summary record and `count` is the total across statuses, so the
    /// figure matches what the status lists report.
    pub async fn subscriber_summary(&self) -> Envelope {
        self.cached(KEY_SUMMARY, self.cfg.ttl.standard(), self.fetch_summary())
            .await
    }

    /// Single subscriber row by id. Unlike the list fetches there is
    /// no sensible empty substitute, so failures propagate. An empty
    /// id is rejected locally before any network I/O.
    pub async fn subscriber_by_id(&self, id: &str) -> Result<RawRecord> {
        let id = id.trim();
        if id.is_empty() {
            return Err(anyhow!("subscriber id must not be empty"));
        }
        let query = RowQuery::table(&self.cfg.tables.subscribers)
            .eq("id", Value::String(id.to_string()))
            .limit(1);
        let set = self
            .backend()
            .query_rows(&query)
            .await
            .with_context(|| format!("fetching subscriber {id}"))?;
        set.rows
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("subscriber {id} not found"))
    }

    async fn fetch_by_status(&self, status: &str) -> Result<Envelope> {
        let query = RowQuery::table(&self.cfg.tables.subscribers).eq("status", json!(status));
        let set = self
            .backend()
            .query_rows(&query)
            .await
            .with_context(|| format!("fetching {status} subscribers"))?;
        let features = normalize::normalize_rows(&set.rows);
        Ok(Envelope::from_features(set.rows, features))
    }

    async fn fetch_summary(&self) -> Result<Envelope> {
        let count_of = |status: &str| {
            RowQuery::table(&self.cfg.tables.subscribers)
                .eq("status", json!(status))
                .counted()
                .limit(1)
        };
        let offline = self
            .backend()
            .query_rows(&count_of("offline"))
            .await
            .context("counting offline subscribers")?;
        let online = self
            .backend()
            .query_rows(&count_of("online"))
            .await
            .context("counting online subscribers")?;

        let offline_n = offline.total.unwrap_or(offline.rows.len() as u64);
        let online_n = online.total.unwrap_or(online.rows.len() as u64);

        let summary: RawRecord = [
            ("offline".to_string(), json!(offline_n)),
            ("online".to_string(), json!(online_n)),
            ("total".to_string(), json!(offline_n + online_n)),
        ]
        .into_iter()
        .collect();

        let mut envelope = Envelope::from_features(vec![summary], Vec::new());
        envelope.count = offline_n + online_n;
        Ok(envelope)
    }
}
