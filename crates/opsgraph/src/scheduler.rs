//! Periodic sweep scheduling.
//!
//! [`SweepScheduler`] drives the early warning engine on a fixed interval
//! until told to shut down. Overlap is resolved by skipping, never
//! queuing: a tick that finds the control busy (or the engine mid-sweep)
//! does nothing, and the next tick catches up naturally.

use crate::app::OpsControl;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Periodic driver for [`OpsControl::run_sweep`].
pub struct SweepScheduler {
    control: Arc<Mutex<OpsControl>>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl SweepScheduler {
    /// Create a scheduler and the sender used to stop it.
    ///
    /// Send `true` on the returned channel (or drop it) to stop the loop
    /// after the current tick.
    pub fn new(
        control: Arc<Mutex<OpsControl>>,
        interval: Duration,
    ) -> (Self, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                control,
                interval,
                shutdown: rx,
            },
            tx,
        )
    }

    /// Run until shutdown. Consumes the scheduler; spawn it as a task or
    /// await it directly.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        // A stalled sweep must not cause a burst of catch-up ticks
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(interval_secs = self.interval.as_secs(), "sweep scheduler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        info!("sweep scheduler stopping");
                        break;
                    }
                }
            }
        }
    }

    async fn tick(&self) {
        // A tick that cannot take the lock is skipped, not queued; the
        // engine's running flag covers sweeps triggered elsewhere.
        let Ok(mut control) = self.control.try_lock() else {
            debug!("control busy, skipping scheduled sweep");
            return;
        };

        match control.run_sweep().await {
            Ok(outcome) if outcome.skipped => {
                debug!("sweep already in flight, scheduled trigger skipped");
            }
            Ok(outcome) => {
                debug!(
                    created = outcome.created,
                    updated = outcome.updated,
                    resolved = outcome.resolved,
                    "scheduled sweep complete"
                );
                if let Err(e) = control.save().await {
                    warn!(error = %e, "snapshot save after sweep failed");
                }
            }
            Err(e) => {
                warn!(error = %e, "scheduled sweep failed");
            }
        }
    }
}
