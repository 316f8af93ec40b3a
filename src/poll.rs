//! # Polling Manager
//! Named background refresh loops over tokio interval timers.
//!
//! Scheduling substrate only: the callback owns its own diffing and
//! notification policy, which keeps the manager reusable across the
//! subscriber, outage and vehicle domains. Interval selection is the
//! caller's policy (device profile); the manager executes whatever
//! value it is given.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use metrics::counter;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

type TaskFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;
type TaskFn = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

struct PollTask {
    run: TaskFn,
    ticker: JoinHandle<()>,
    interval: Duration,
}

/// At most one active timer per task name. Registering a name again
/// replaces the previous timer before the new one is created, so
/// duplicate concurrent tickers cannot exist.
#[derive(Default)]
pub struct PollingManager {
    tasks: Mutex<HashMap<String, PollTask>>,
}

impl PollingManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the named task. The first invocation
    /// fires one full interval after registration, never immediately;
    /// callers that want an immediate first load should `trigger` once
    /// after registering.
    pub fn start<F, Fut>(&self, name: &str, interval: Duration, callback: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let run: TaskFn = Arc::new(move || -> TaskFuture { Box::pin(callback()) });

        let mut tasks = self.tasks.lock().expect("polling task map poisoned");
        if let Some(prev) = tasks.remove(name) {
            // Clear the old timer before creating the new one; a
            // leaked duplicate ticker is a correctness bug, not just
            // untidiness.
            prev.ticker.abort();
            tracing::debug!(task = name, "replacing existing polling task");
        }
        let ticker = Self::spawn_ticker(name.to_string(), interval, run.clone());
        tasks.insert(
            name.to_string(),
            PollTask {
                run,
                ticker,
                interval,
            },
        );
        tracing::info!(task = name, interval_secs = interval.as_secs(), "polling started");
    }

    fn spawn_ticker(name: String, period: Duration, run: TaskFn) -> JoinHandle<()> {
        tokio::spawn(async move {
            // interval() would tick immediately; the first fire belongs
            // one full period out.
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                counter!("poll_ticks_total").increment(1);
                Self::dispatch(&name, &run);
            }
        })
    }

    /// Run one invocation on its own task so a slow callback never
    /// blocks the ticker, and stopping a task never aborts a fetch
    /// already in flight. A callback error is logged and swallowed;
    /// one domain's persistent failure must not disable polling for
    /// the others.
    fn dispatch(name: &str, run: &TaskFn) {
        let fut = run();
        let task = name.to_string();
        tokio::spawn(async move {
            if let Err(e) = fut.await {
                counter!("poll_tick_errors_total").increment(1);
                tracing::warn!(error = ?e, task = %task, "poll tick failed");
            }
        });
    }

    /// One off-cycle invocation right now, leaving the scheduled timer
    /// untouched. Backs user-facing "refresh now" affordances. Returns
    /// false for an unknown task name.
    pub fn trigger(&self, name: &str) -> bool {
        let tasks = self.tasks.lock().expect("polling task map poisoned");
        match tasks.get(name) {
            Some(task) => {
                Self::dispatch(name, &task.run);
                true
            }
            None => {
                tracing::debug!(task = name, "trigger for unknown polling task");
                false
            }
        }
    }

    /// Clears the named timer. An in-flight invocation dispatched
    /// before the stop is allowed to complete; its result is simply
    /// never rescheduled.
    pub fn stop(&self, name: &str) -> bool {
        let mut tasks = self.tasks.lock().expect("polling task map poisoned");
        match tasks.remove(name) {
            Some(task) => {
                task.ticker.abort();
                tracing::info!(task = name, "polling stopped");
                true
            }
            None => false,
        }
    }

    /// Clears every timer; no further callbacks fire until `start` is
    /// called again.
    pub fn stop_all(&self) {
        let mut tasks = self.tasks.lock().expect("polling task map poisoned");
        let stopped = tasks.len();
        for (_, task) in tasks.drain() {
            task.ticker.abort();
        }
        if stopped > 0 {
            tracing::info!(stopped, "all polling stopped");
        }
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.tasks
            .lock()
            .expect("polling task map poisoned")
            .contains_key(name)
    }

    pub fn interval_of(&self, name: &str) -> Option<Duration> {
        self.tasks
            .lock()
            .expect("polling task map poisoned")
            .get(name)
            .map(|t| t.interval)
    }

    pub fn task_names(&self) -> Vec<String> {
        self.tasks
            .lock()
            .expect("polling task map poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

impl Drop for PollingManager {
    fn drop(&mut self) {
        self.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bookkeeping_tracks_registration() {
        let manager = PollingManager::new();
        assert!(!manager.is_running("subscribers"));

        manager.start("subscribers", Duration::from_secs(60), || async { Ok(()) });
        assert!(manager.is_running("subscribers"));
        assert_eq!(
            manager.interval_of("subscribers"),
            Some(Duration::from_secs(60))
        );

        // Re-registering replaces, not duplicates.
        manager.start("subscribers", Duration::from_secs(30), || async { Ok(()) });
        assert_eq!(manager.task_names().len(), 1);
        assert_eq!(
            manager.interval_of("subscribers"),
            Some(Duration::from_secs(30))
        );

        assert!(manager.stop("subscribers"));
        assert!(!manager.stop("subscribers"));
        assert!(!manager.is_running("subscribers"));
    }

    #[tokio::test]
    async fn trigger_unknown_task_is_a_noop() {
        let manager = PollingManager::new();
        assert!(!manager.trigger("nope"));
    }
}
