//! Typed update channel between the watch loops and their consumers.
//! Map layers and UI code subscribe here instead of hanging off any
//! particular UI framework's event system.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// One category of tracked entity, with its own fetch method, cache
/// namespace and refresh cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Subscribers,
    Outages,
    Vehicles,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Subscribers => "subscribers",
            Domain::Outages => "outages",
            Domain::Vehicles => "vehicles",
        }
    }
}

/// Published after a watch cycle that changed data, came back
/// degraded, or hit the heartbeat cadence.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateEvent {
    pub domain: Domain,
    /// Polling task that produced the event; disambiguates multiple
    /// feeds within one domain (e.g. per-provider outage tasks).
    pub task: String,
    pub count: u64,
    pub added: usize,
    pub removed: usize,
    pub changed: bool,
    /// True when the underlying fetch fell back to stale data or an
    /// empty degraded result.
    pub degraded: bool,
    pub at: DateTime<Utc>,
}

/// Broadcast fan-out of update events. Slow subscribers lose the
/// oldest events rather than blocking the publisher.
#[derive(Debug, Clone)]
pub struct UpdateBus {
    tx: broadcast::Sender<UpdateEvent>,
}

impl UpdateBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UpdateEvent> {
        self.tx.subscribe()
    }

    /// Returns how many live subscribers the event reached. Publishing
    /// with no subscribers is fine; the event is simply dropped.
    pub fn publish(&self, event: UpdateEvent) -> usize {
        match self.tx.send(event) {
            Ok(n) => n,
            Err(_) => {
                tracing::trace!("update event published with no subscribers");
                0
            }
        }
    }
}

impl Default for UpdateBus {
    fn default() -> Self {
        Self::new(64)
    }
}
