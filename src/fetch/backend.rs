// src/fetch/backend.rs
use std::collections::HashMap;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use super::types::RawRecord;

/// Filter predicates the row API supports.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `column = value`
    Eq(String, Value),
    /// `column is not null`
    NotNull(String),
    /// Case-insensitive `%pattern%` match against any of the columns.
    IlikeAny(Vec<String>, String),
}

/// A filtered read against one logical table.
#[derive(Debug, Clone, Default)]
pub struct RowQuery {
    pub table: String,
    pub filters: Vec<Filter>,
    pub limit: Option<u32>,
    pub with_count: bool,
}

impl RowQuery {
    pub fn table(name: &str) -> Self {
        Self {
            table: name.to_string(),
            ..Self::default()
        }
    }

    pub fn eq(mut self, column: &str, value: Value) -> Self {
        self.filters.push(Filter::Eq(column.to_string(), value));
        self
    }

    pub fn not_null(mut self, column: &str) -> Self {
        self.filters.push(Filter::NotNull(column.to_string()));
        self
    }

    pub fn ilike_any(mut self, columns: &[&str], pattern: &str) -> Self {
        self.filters.push(Filter::IlikeAny(
            columns.iter().map(|c| c.to_string()).collect(),
            pattern.to_string(),
        ));
        self
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }

    /// Ask the backend for the total row count alongside the rows.
    pub fn counted(mut self) -> Self {
        self.with_count = true;
        self
    }
}

/// Result of a row query: the rows, plus the backend's total count
/// when one was requested (the total ignores `limit`).
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    pub rows: Vec<RawRecord>,
    pub total: Option<u64>,
}

/// Read-only transport to the remote data source.
///
/// The core depends on this filtered-query contract only, never on a
/// particular backend technology: a row-oriented table API plus hosted
/// GeoJSON documents fetched by URL.
#[async_trait]
pub trait DataBackend: Send + Sync {
    async fn query_rows(&self, query: &RowQuery) -> Result<RowSet>;

    /// Fetch a hosted GeoJSON document by URL.
    async fn fetch_geojson(&self, url: &str) -> Result<Value>;
}

/// HTTP implementation speaking a PostgREST-style row dialect:
/// `?status=eq.offline&latitude=not.is.null&or=(name.ilike.*t*,...)`.
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    /// `timeout` bounds every request; a timeout is reported as an
    /// ordinary fetch failure and follows the stale-fallback path.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building http client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn query_params(query: &RowQuery) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(query.filters.len() + 1);
        for filter in &query.filters {
            match filter {
                Filter::Eq(col, value) => {
                    params.push((col.clone(), format!("eq.{}", value_literal(value))));
                }
                Filter::NotNull(col) => {
                    params.push((col.clone(), "not.is.null".to_string()));
                }
                Filter::IlikeAny(cols, pattern) => {
                    let clauses: Vec<String> = cols
                        .iter()
                        .map(|c| format!("{c}.ilike.*{pattern}*"))
                        .collect();
                    params.push(("or".to_string(), format!("({})", clauses.join(","))));
                }
            }
        }
        if let Some(n) = query.limit {
            params.push(("limit".to_string(), n.to_string()));
        }
        params
    }
}

/// Render a JSON value as the row API's literal form (no quotes around
/// strings, `null` for null).
fn value_literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Total row count out of a `Content-Range: 0-24/3573` header.
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

#[async_trait]
impl DataBackend for HttpBackend {
    async fn query_rows(&self, query: &RowQuery) -> Result<RowSet> {
        let url = format!("{}/{}", self.base_url, query.table);
        let mut request = self.client.get(&url).query(&Self::query_params(query));
        if query.with_count {
            request = request.header("Prefer", "count=exact");
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("querying table {}", query.table))?
            .error_for_status()
            .with_context(|| format!("table {} returned an error status", query.table))?;

        let total = if query.with_count {
            response
                .headers()
                .get("content-range")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_content_range_total)
        } else {
            None
        };

        let rows: Vec<RawRecord> = response
            .json()
            .await
            .with_context(|| format!("decoding rows from table {}", query.table))?;
        Ok(RowSet { rows, total })
    }

    async fn fetch_geojson(&self, url: &str) -> Result<Value> {
        self.client
            .get(url)
            .send()
            .await
            .with_context(|| format!("fetching document {url}"))?
            .error_for_status()
            .with_context(|| format!("document {url} returned an error status"))?
            .json()
            .await
            .with_context(|| format!("decoding document {url}"))
    }
}

/// Canned backend serving in-memory tables and documents; stands in
/// for a live deployment in the demo binary and in tests.
#[derive(Debug, Default)]
pub struct FixtureBackend {
    tables: HashMap<String, Vec<RawRecord>>,
    documents: HashMap<String, Value>,
}

impl FixtureBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: &str, rows: Vec<RawRecord>) -> Self {
        self.tables.insert(name.to_string(), rows);
        self
    }

    pub fn with_document(mut self, url: &str, document: Value) -> Self {
        self.documents.insert(url.to_string(), document);
        self
    }
}

fn matches_filter(row: &RawRecord, filter: &Filter) -> bool {
    match filter {
        Filter::Eq(col, value) => row.get(col) == Some(value),
        Filter::NotNull(col) => matches!(row.get(col), Some(v) if !v.is_null()),
        Filter::IlikeAny(cols, pattern) => {
            let needle = pattern.to_ascii_lowercase();
            cols.iter().any(|c| {
                row.get(c)
                    .and_then(Value::as_str)
                    .map(|s| s.to_ascii_lowercase().contains(&needle))
                    .unwrap_or(false)
            })
        }
    }
}

#[async_trait]
impl DataBackend for FixtureBackend {
    async fn query_rows(&self, query: &RowQuery) -> Result<RowSet> {
        let Some(rows) = self.tables.get(&query.table) else {
            bail!("no fixture table named {}", query.table);
        };
        let mut matched: Vec<RawRecord> = rows
            .iter()
            .filter(|r| query.filters.iter().all(|f| matches_filter(r, f)))
            .cloned()
            .collect();
        let total = query.with_count.then_some(matched.len() as u64);
        if let Some(n) = query.limit {
            matched.truncate(n as usize);
        }
        Ok(RowSet {
            rows: matched,
            total,
        })
    }

    async fn fetch_geojson(&self, url: &str) -> Result<Value> {
        self.documents
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no fixture document at {url}"))
    }
}
