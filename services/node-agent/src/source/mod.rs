//! Pod configuration sources.
//!
//! A source runs as its own task, polls its origin on a fixed cadence and
//! pushes [`PodUpdate`](podcfg_api::PodUpdate)s into a queue owned by the
//! merge pipeline. Sources share no state with each other.
//!
//! Stopping is cooperative: every source owns a `watch` stop channel that is
//! separate from its data queue and is checked between ticks.

mod file;

pub use file::{ExtractError, FileSource, MIN_INTERVAL};

use podcfg_api::SourceKey;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Handle to a running source task.
///
/// Dropping the handle also stops the task, since the stop channel closes.
pub struct SourceHandle {
    source: SourceKey,

    /// Stop signal sender.
    shutdown_tx: watch::Sender<bool>,

    /// Task handle.
    task: JoinHandle<()>,
}

impl SourceHandle {
    pub(crate) fn new(
        source: SourceKey,
        shutdown_tx: watch::Sender<bool>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            source,
            shutdown_tx,
            task,
        }
    }

    pub fn source(&self) -> &SourceKey {
        &self.source
    }

    /// Check if the source task is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Signal the source to stop and wait for its task to exit.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            warn!(source = %self.source, error = %e, "Source task did not exit cleanly");
        } else {
            info!(source = %self.source, "Source stopped");
        }
    }
}

/// Resolves once a stop has been requested or the stop sender is gone.
pub(crate) async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
