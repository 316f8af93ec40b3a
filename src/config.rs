// src/config.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

const ENV_PATH: &str = "GRIDWATCH_CONFIG_PATH";

/// Axis-aligned service-area bounds, GeoJSON axis order.
///
/// Kept in configuration rather than in fetch logic so region-specific
/// literals never end up hard-coded next to the query code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn contains(&self, point: [f64; 2]) -> bool {
        point[0] >= self.min_lon
            && point[0] <= self.max_lon
            && point[1] >= self.min_lat
            && point[1] <= self.max_lat
    }
}

/// Polling cadence by device class. Coarse-pointer/small-viewport
/// clients poll slowly to conserve battery and data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceProfile {
    #[default]
    Desktop,
    Compact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub profile: DeviceProfile,
    pub desktop_interval_secs: u64,
    pub compact_interval_secs: u64,
    /// Publish an update event every N unchanged ticks so "last
    /// updated" indicators stay honest. 0 disables the heartbeat.
    pub heartbeat_every: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            profile: DeviceProfile::Desktop,
            desktop_interval_secs: 45,
            compact_interval_secs: 300,
            heartbeat_every: 10,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        let secs = match self.profile {
            DeviceProfile::Desktop => self.desktop_interval_secs,
            DeviceProfile::Compact => self.compact_interval_secs,
        };
        Duration::from_secs(secs)
    }
}

/// Cache durations per data class: frequently changing feeds (outage
/// and vehicle positions) use the short window, slow reference data
/// the long one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheTtlConfig {
    pub fast_secs: u64,
    pub default_secs: u64,
    pub reference_secs: u64,
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            fast_secs: 120,
            default_secs: 300,
            reference_secs: 1800,
        }
    }
}

impl CacheTtlConfig {
    pub fn fast(&self) -> Duration {
        Duration::from_secs(self.fast_secs)
    }

    pub fn standard(&self) -> Duration {
        Duration::from_secs(self.default_secs)
    }

    pub fn reference(&self) -> Duration {
        Duration::from_secs(self.reference_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub subscribers: String,
    pub vehicles: String,
    pub node_sites: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            subscribers: "subscriber_status".to_string(),
            vehicles: "fleet_vehicles".to_string(),
            node_sites: "node_sites".to_string(),
        }
    }
}

/// One outage feed. `document` (a hosted GeoJSON URL) wins over
/// `table` when both are set; `bbox` restricts the feed to the
/// provider's service area.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub document: Option<String>,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend_url: String,
    pub fetch_timeout_secs: u64,
    pub search_limit: u32,
    pub ttl: CacheTtlConfig,
    pub poll: PollConfig,
    pub tables: TableConfig,
    pub outage_providers: Vec<ProviderConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:3000".to_string(),
            fetch_timeout_secs: 10,
            search_limit: 20,
            ttl: CacheTtlConfig::default(),
            poll: PollConfig::default(),
            tables: TableConfig::default(),
            outage_providers: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn provider(&self, id: &str) -> Option<&ProviderConfig> {
        self.outage_providers.iter().find(|p| p.id == id)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Load configuration from an explicit path. Supports TOML or JSON.
pub fn load_from(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
}

/// Load configuration using env var + fallbacks:
/// 1) $GRIDWATCH_CONFIG_PATH
/// 2) config/gridwatch.toml
/// 3) config/gridwatch.json
/// 4) built-in defaults
pub fn load_default() -> Result<AppConfig> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        } else {
            return Err(anyhow!("GRIDWATCH_CONFIG_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/gridwatch.toml");
    if toml_p.exists() {
        return load_from(&toml_p);
    }
    let json_p = PathBuf::from("config/gridwatch.json");
    if json_p.exists() {
        return load_from(&json_p);
    }
    Ok(AppConfig::default())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AppConfig> {
    if hint_ext == "json" {
        return serde_json::from_str(s).context("parsing json config");
    }
    if let Ok(cfg) = toml::from_str(s) {
        return Ok(cfg);
    }
    serde_json::from_str(s).context("unsupported config format")
}
