//! Recurring auto-sync timer.
//!
//! The timer holds only a weak reference to the orchestrator, so dropping
//! the orchestrator ends the loop at the next tick.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info};

use crate::orchestrator::SyncOrchestrator;

/// Timer state owned by the orchestrator.
#[derive(Debug)]
pub(crate) struct AutoSync {
    interval: Duration,
    handle: Option<JoinHandle<()>>,
}

impl AutoSync {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            handle: None,
        }
    }

    pub(crate) fn interval(&self) -> Duration {
        self.interval
    }

    pub(crate) fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Starts the timer unless it is already running.
    pub(crate) fn start(&mut self, orchestrator: &Arc<SyncOrchestrator>) {
        if self.is_running() {
            return;
        }
        info!(interval_secs = self.interval.as_secs(), "auto-sync enabled");
        self.handle = Some(spawn_timer(Arc::downgrade(orchestrator), self.interval));
    }

    /// Stops the timer. Aborting drops a cycle running on the timer task;
    /// its drop guard resets the syncing flag.
    pub(crate) fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!("auto-sync disabled");
        }
    }

    /// Changes the period. Zero is ignored. A running timer restarts with
    /// the new period.
    pub(crate) fn set_interval(&mut self, interval: Duration, orchestrator: &Arc<SyncOrchestrator>) {
        if interval.is_zero() {
            debug!("ignoring zero auto-sync interval");
            return;
        }
        self.interval = interval;
        if self.is_running() {
            self.stop();
            self.start(orchestrator);
        }
    }
}

impl Drop for AutoSync {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

fn spawn_timer(orchestrator: Weak<SyncOrchestrator>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let Some(orchestrator) = orchestrator.upgrade() else {
                debug!("orchestrator dropped, auto-sync stopping");
                break;
            };
            debug!("auto-sync tick");
            orchestrator.sync_all().await;
        }
    })
}
