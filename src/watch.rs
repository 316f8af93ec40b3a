//! Per-domain watch callbacks: fetch, diff against the previous
//! snapshot, publish only when something is worth saying.
//!
//! The polling manager supplies the schedule; this module supplies the
//! change detection each callback owns.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;

use crate::config::AppConfig;
use crate::events::{Domain, UpdateBus, UpdateEvent};
use crate::fetch::types::Envelope;
use crate::fetch::FetchService;
use crate::poll::PollingManager;

/// Comparable summary of one cycle's result; what the diff remembers
/// between ticks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub count: u64,
    pub ids: BTreeSet<String>,
}

impl Snapshot {
    pub fn of(envelope: &Envelope) -> Self {
        Self {
            count: envelope.count,
            ids: envelope.features.iter().map(|f| f.id.clone()).collect(),
        }
    }

    /// `(added, removed)` relative to `prev`.
    pub fn diff(&self, prev: &Self) -> (usize, usize) {
        let added = self.ids.difference(&prev.ids).count();
        let removed = prev.ids.difference(&self.ids).count();
        (added, removed)
    }
}

struct WatchState {
    prev: Option<Snapshot>,
    ticks_since_publish: u32,
}

/// Wire a fetch into the polling manager under `name`: each tick
/// fetches an envelope, diffs it against the remembered snapshot and
/// publishes an [`UpdateEvent`] only on change, degradation, or every
/// `heartbeat_every` quiet ticks (0 disables the heartbeat). The very
/// first cycle always publishes.
pub fn spawn_watch<F, Fut>(
    manager: &PollingManager,
    bus: UpdateBus,
    domain: Domain,
    name: &str,
    interval: Duration,
    heartbeat_every: u32,
    fetch: F,
) where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Envelope> + Send + 'static,
{
    let state = Arc::new(Mutex::new(WatchState {
        prev: None,
        ticks_since_publish: 0,
    }));
    let fetch = Arc::new(fetch);
    let task_name = name.to_string();

    manager.start(name, interval, move || {
        let state = state.clone();
        let bus = bus.clone();
        let fetch = fetch.clone();
        let task_name = task_name.clone();
        async move {
            let envelope = fetch().await;
            let snapshot = Snapshot::of(&envelope);

            let event = {
                let mut st = state.lock().expect("watch state poisoned");
                let (added, removed, changed) = match &st.prev {
                    Some(prev) => {
                        let (a, r) = snapshot.diff(prev);
                        (a, r, snapshot != *prev)
                    }
                    None => (snapshot.ids.len(), 0, true),
                };
                st.ticks_since_publish += 1;
                let heartbeat =
                    heartbeat_every > 0 && st.ticks_since_publish >= heartbeat_every;
                let publish = changed || envelope.error || heartbeat;
                if publish {
                    st.ticks_since_publish = 0;
                }

                let event = publish.then(|| UpdateEvent {
                    domain,
                    task: task_name.clone(),
                    count: snapshot.count,
                    added,
                    removed,
                    changed,
                    degraded: envelope.error,
                    at: Utc::now(),
                });
                st.prev = Some(snapshot);
                event
            };

            if let Some(ev) = event {
                tracing::debug!(
                    task = %ev.task,
                    count = ev.count,
                    added = ev.added,
                    removed = ev.removed,
                    degraded = ev.degraded,
                    "watch update"
                );
                bus.publish(ev);
            }
            Ok(())
        }
    });
}

/// Start the standard watch set at the configured profile's cadence:
/// offline subscribers, one task per outage provider, and vehicle
/// telemetry. Stop individual tasks (or everything) via the manager.
pub fn start_default_watches(
    manager: &PollingManager,
    bus: &UpdateBus,
    service: Arc<FetchService>,
    cfg: &AppConfig,
) {
    let interval = cfg.poll.interval();
    let heartbeat = cfg.poll.heartbeat_every;

    {
        let svc = service.clone();
        spawn_watch(
            manager,
            bus.clone(),
            Domain::Subscribers,
            "subscribers",
            interval,
            heartbeat,
            move || {
                let svc = svc.clone();
                async move { svc.offline_subscribers().await }
            },
        );
    }

    for provider in &cfg.outage_providers {
        let svc = service.clone();
        let provider_id = provider.id.clone();
        spawn_watch(
            manager,
            bus.clone(),
            Domain::Outages,
            &format!("outages:{}", provider.id),
            interval,
            heartbeat,
            move || {
                let svc = svc.clone();
                let provider_id = provider_id.clone();
                async move { svc.outages_for_provider(&provider_id).await }
            },
        );
    }

    {
        let svc = service;
        spawn_watch(
            manager,
            bus.clone(),
            Domain::Vehicles,
            "vehicles",
            interval,
            heartbeat,
            move || {
                let svc = svc.clone();
                async move { svc.vehicles().await }
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::types::{record, Geometry, NormalizedFeature};
    use serde_json::json;

    fn envelope_with_ids(ids: &[&str]) -> Envelope {
        let features = ids
            .iter()
            .map(|id| NormalizedFeature {
                id: id.to_string(),
                geometry: Geometry::Point([0.0, 0.0]),
                status: None,
                label: None,
                extra: record(&[("id", json!(id))]),
            })
            .collect::<Vec<_>>();
        Envelope::from_features(Vec::new(), features)
    }

    #[test]
    fn snapshot_diff_counts_added_and_removed() {
        let a = Snapshot::of(&envelope_with_ids(&["x", "y"]));
        let b = Snapshot::of(&envelope_with_ids(&["y", "z", "w"]));
        assert_eq!(b.diff(&a), (2, 1));
        assert_ne!(a, b);
    }

    #[test]
    fn identical_snapshots_compare_equal() {
        let a = Snapshot::of(&envelope_with_ids(&["x", "y"]));
        let b = Snapshot::of(&envelope_with_ids(&["y", "x"]));
        assert_eq!(a, b);
        assert_eq!(b.diff(&a), (0, 0));
    }
}
