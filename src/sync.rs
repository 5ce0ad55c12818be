//! Polling refresh loop for the queue view.
//!
//! Several workstations mutate the same day's queue through the shared
//! store; nobody holds a lock. Each client re-fetches on a fixed interval,
//! merges server truth with its own unconfirmed edits, and publishes the
//! result over a watch channel for the view to render. A tick that fails
//! is logged and skipped — the last good snapshot stays up. Stopping the
//! handle (or dropping it) cancels the timer; anything still in flight
//! completes against a loop that is no longer listening.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::queue::{QueueService, QueueSnapshot};
use crate::store::QueueStore;

/// Controls one running sync loop.
pub struct SyncHandle {
    shutdown: watch::Sender<bool>,
    snapshots: watch::Receiver<QueueSnapshot>,
    task: Option<JoinHandle<()>>,
}

impl SyncHandle {
    /// Subscribe to published snapshots. The first value is an empty
    /// placeholder until the initial fetch completes.
    pub fn snapshots(&self) -> watch::Receiver<QueueSnapshot> {
        self.snapshots.clone()
    }

    /// Most recently published snapshot.
    pub fn latest(&self) -> QueueSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the loop and wait for it to wind down.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

/// Start polling the store through `service` every `poll_interval`.
/// The first refresh runs immediately.
pub fn spawn<S>(service: Arc<QueueService<S>>, poll_interval: Duration) -> SyncHandle
where
    S: QueueStore + 'static,
{
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let (snapshot_tx, snapshot_rx) = watch::channel(QueueSnapshot::default());

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match service.refresh().await {
                        Ok(snapshot) => {
                            let _ = snapshot_tx.send(snapshot);
                        }
                        // Keep the last good snapshot; the next tick retries.
                        Err(e) => warn!("queue refresh failed: {e}"),
                    }
                }
                _ = shutdown_rx.changed() => {
                    debug!("sync loop stopped");
                    break;
                }
            }
        }
    });

    SyncHandle {
        shutdown: shutdown_tx,
        snapshots: snapshot_rx,
        task: Some(task),
    }
}
