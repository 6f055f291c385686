//! Background Expiry Sweeper
//!
//! This module implements the background task that removes expired keys.
//! Reads never check expiry, so this task is the only thing that makes
//! keys disappear as time passes.
//!
//! ## Design
//!
//! The sweeper runs as a Tokio task and:
//! 1. Sleeps for the configured interval (default: 60s)
//! 2. Wakes up and works out the cutoff: the last fully elapsed second
//! 3. Drains every TTL bucket in `(last_cleared, cutoff]`, oldest first
//! 4. Sets `last_cleared = cutoff`
//!
//! `last_cleared` belongs to the task. It is handed in on start and handed
//! back through the join handle on stop, so a restarted sweeper picks up
//! exactly where the previous one left off.

use crate::error::{Result, StorageError};
use crate::storage::engine::Shared;
use crate::storage::ttl::current_second;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// A handle to the running expiry sweeper.
///
/// Dropping the handle signals the task to stop without waiting for it.
#[derive(Debug)]
pub struct ExpirySweeper {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,

    /// Resolves to the task's final `last_cleared`
    handle: Option<JoinHandle<i64>>,

    /// The `last_cleared` the task was started with
    started_from: i64,
}

impl ExpirySweeper {
    /// Spawns the sweeper loop on `runtime`.
    pub(crate) fn start(
        runtime: &Handle,
        shared: Arc<Shared>,
        interval: Duration,
        last_cleared: i64,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = runtime.spawn(sweeper_loop(shared, interval, last_cleared, shutdown_rx));

        Self {
            shutdown_tx,
            handle: Some(handle),
            started_from: last_cleared,
        }
    }

    pub(crate) fn started_from(&self) -> i64 {
        self.started_from
    }

    /// Signals the task to stop and waits until it has exited.
    ///
    /// Returns the last second the task cleared.
    pub async fn stop(mut self) -> Result<i64> {
        let _ = self.shutdown_tx.send(true);

        match self.handle.take() {
            Some(handle) => handle
                .await
                .map_err(|e| StorageError::SweeperTaskFailed(e.to_string())),
            None => Ok(self.started_from),
        }
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// The main sweeper loop.
async fn sweeper_loop(
    shared: Arc<Shared>,
    interval: Duration,
    mut last_cleared: i64,
    mut shutdown_rx: watch::Receiver<bool>,
) -> i64 {
    loop {
        // Wait for the interval or shutdown signal
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!(last_cleared, "Expiry sweeper received shutdown signal");
                    return last_cleared;
                }
                continue;
            }
        }

        // The current second is still running; only earlier ones are due.
        let cutoff = current_second() - 1;
        let report = shared.sweep(last_cleared, cutoff);
        last_cleared = report.last_cleared;

        if report.removed > 0 {
            debug!(
                removed = report.removed,
                buckets = report.buckets,
                cutoff,
                "Expired keys cleaned up"
            );
        }
    }
}
