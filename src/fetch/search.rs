// src/fetch/search.rs
use std::cmp::Ordering;

use anyhow::{Context, Result};
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::Value;

use super::backend::RowQuery;
use super::normalize;
use super::types::{Envelope, RawRecord};
use super::FetchService;

pub(super) const KEY_PREFIX: &str = "search_";

/// Terms shorter than this never reach the cache or the network.
pub const MIN_SEARCH_LEN: usize = 2;

/// Columns matched by the backend's OR-ilike predicate and scored for
/// ranking.
const SEARCH_FIELDS: &[&str] = &["name", "address", "account_number"];

/// Collapse whitespace and lowercase so equivalent queries share a
/// cache key.
fn normalize_term(term: &str) -> String {
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    re_ws
        .replace_all(term.trim(), " ")
        .to_string()
        .to_lowercase()
}

/// Best similarity between the term and any searched column.
fn match_score(record: &RawRecord, term: &str) -> f64 {
    SEARCH_FIELDS
        .iter()
        .filter_map(|f| record.get(*f).and_then(Value::as_str))
        .map(|s| strsim::jaro_winkler(&s.to_lowercase(), term))
        .fold(0.0, f64::max)
}

impl FetchService {
    /// Subscriber search across name, address and account columns,
    /// ranked by similarity to the term. Terms under the minimum
    /// length return an empty result synchronously: no cache
    /// interaction, no network call.
    pub async fn search_subscribers(&self, term: &str, limit: u32) -> Envelope {
        let term = normalize_term(term);
        if term.chars().count() < MIN_SEARCH_LEN {
            counter!("fetch_search_short_circuit_total").increment(1);
            return Envelope::empty();
        }
        let key = format!("{KEY_PREFIX}{term}_{limit}");
        self.cached(
            &key,
            self.cfg.ttl.standard(),
            self.fetch_search(&term, limit),
        )
        .await
    }

    async fn fetch_search(&self, term: &str, limit: u32) -> Result<Envelope> {
        let query = RowQuery::table(&self.cfg.tables.subscribers)
            .ilike_any(SEARCH_FIELDS, term)
            .limit(limit);
        let set = self
            .backend()
            .query_rows(&query)
            .await
            .context("searching subscribers")?;

        let mut scored: Vec<(f64, RawRecord)> = set
            .rows
            .into_iter()
            .map(|r| (match_score(&r, term), r))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        let rows: Vec<RawRecord> = scored.into_iter().map(|(_, r)| r).collect();

        let features = normalize::normalize_rows(&rows);
        // A match without a mappable location is still a result; count
        // follows the result list here, not the feature list.
        let mut envelope = Envelope::from_features(rows, features);
        envelope.count = envelope.data.len() as u64;
        Ok(envelope)
    }
}
