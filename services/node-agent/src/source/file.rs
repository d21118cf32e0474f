//! File source: pods read from a manifest file or a directory of manifests.
//!
//! Every tick re-reads the whole path and publishes a SET update. Nothing is
//! kept open between ticks. When a tick fails the source publishes an empty
//! SET, so consumers stop running pods whose manifests became unreadable
//! rather than keep acting on a stale snapshot.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use podcfg_api::{Pod, PodUpdate, SourceKey};
use podcfg_manifest::{DecodeError, Decoder};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use super::{stop_requested, SourceHandle};

/// Shortest poll interval; a zero interval is raised to this.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Errors from a single extraction pass.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The configured path does not exist.
    #[error("path does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A single-file source held a manifest that could not be decoded.
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    #[error("not a regular file or directory: {}", .0.display())]
    UnsupportedFileType(PathBuf),

    /// The blocking extraction task panicked or was cancelled.
    #[error("extraction task failed: {0}")]
    Task(String),
}

impl ExtractError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ExtractError::NotFound(_))
    }

    fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            ExtractError::NotFound(path.to_path_buf())
        } else {
            ExtractError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// Source reading pods from the local filesystem.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    decoder: Arc<Decoder>,
    source: SourceKey,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, decoder: Arc<Decoder>) -> Self {
        Self {
            path: path.into(),
            decoder,
            source: SourceKey::file(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> &SourceKey {
        &self.source
    }

    /// Reads the path once and builds a SET update of every pod found.
    ///
    /// A directory that contains no manifests yields an empty SET. Manifests
    /// in a directory that fail to read or decode are logged and skipped.
    pub fn extract_once(&self) -> Result<PodUpdate, ExtractError> {
        let meta = fs::metadata(&self.path).map_err(|e| ExtractError::io(&self.path, e))?;

        let pods = if meta.is_dir() {
            self.extract_dir()?
        } else if meta.is_file() {
            vec![self.extract_file()?]
        } else {
            return Err(ExtractError::UnsupportedFileType(self.path.clone()));
        };

        Ok(PodUpdate::set(self.source.clone(), pods))
    }

    fn extract_file(&self) -> Result<Pod, ExtractError> {
        let data = fs::read(&self.path).map_err(|e| ExtractError::io(&self.path, e))?;
        self.decoder
            .decode_from(&data, &self.path.to_string_lossy())
            .map_err(|source| ExtractError::Decode {
                path: self.path.clone(),
                source,
            })
    }

    fn extract_dir(&self) -> Result<Vec<Pod>, ExtractError> {
        let mut files = Vec::new();
        let entries = fs::read_dir(&self.path).map_err(|e| ExtractError::io(&self.path, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| ExtractError::io(&self.path, e))?;
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let path = entry.path();
            // Follows symlinks, so a link to a manifest counts as a file.
            match fs::metadata(&path) {
                Ok(meta) if meta.is_file() => files.push(path),
                Ok(_) => trace!(path = %path.display(), "Skipping non-regular file"),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to stat manifest, skipping"),
            }
        }
        // Stable order keeps batch-generated names stable across ticks.
        files.sort();

        let mut batch = self.decoder.batch();
        let mut uids = HashSet::with_capacity(files.len());
        let mut pods = Vec::with_capacity(files.len());

        for path in files {
            let data = match fs::read(&path) {
                Ok(data) => data,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to read manifest, skipping");
                    continue;
                }
            };
            let pod = match batch.decode(&data, &path.to_string_lossy()) {
                Ok(pod) => pod,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to decode manifest, skipping");
                    continue;
                }
            };
            if !uids.insert(pod.uid().to_string()) {
                warn!(
                    path = %path.display(),
                    uid = %pod.uid(),
                    "Manifest reuses a pod uid from another file, skipping"
                );
                continue;
            }
            pods.push(pod);
        }

        Ok(pods)
    }

    /// Starts polling in a background task.
    ///
    /// The first poll happens immediately, then once per `interval`. A zero
    /// interval is raised to [`MIN_INTERVAL`].
    pub fn start(self, interval: Duration, updates: mpsc::Sender<PodUpdate>) -> SourceHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let source = self.source.clone();
        let task = tokio::spawn(self.run(interval, updates, shutdown_rx));
        SourceHandle::new(source, shutdown_tx, task)
    }

    /// Runs the polling loop until a stop is requested or the update
    /// receiver is dropped.
    ///
    /// A full queue blocks the loop, which delays the next tick; a stop
    /// request still interrupts the wait.
    pub async fn run(
        self,
        interval: Duration,
        updates: mpsc::Sender<PodUpdate>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let interval = if interval.is_zero() {
            warn!(
                path = %self.path.display(),
                min_interval_ms = MIN_INTERVAL.as_millis() as u64,
                "Zero poll interval, using minimum"
            );
            MIN_INTERVAL
        } else {
            interval
        };

        info!(
            path = %self.path.display(),
            interval_ms = interval.as_millis() as u64,
            "Starting file source"
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Stop is polled first everywhere so nothing is sent once it is
        // requested.
        loop {
            tokio::select! {
                biased;
                _ = stop_requested(&mut shutdown) => break,
                _ = ticker.tick() => {}
            }

            let update = tokio::select! {
                biased;
                _ = stop_requested(&mut shutdown) => break,
                update = self.poll() => update,
            };

            tokio::select! {
                biased;
                _ = stop_requested(&mut shutdown) => break,
                sent = updates.send(update) => {
                    if sent.is_err() {
                        info!(path = %self.path.display(), "Update receiver dropped");
                        break;
                    }
                }
            }
        }

        info!(path = %self.path.display(), "File source shutting down");
    }

    /// One tick: extract on the blocking pool and turn failures into an
    /// empty SET.
    async fn poll(&self) -> PodUpdate {
        let source = self.clone();
        let result = tokio::task::spawn_blocking(move || source.extract_once())
            .await
            .unwrap_or_else(|e| Err(ExtractError::Task(e.to_string())));

        match result {
            Ok(update) => {
                debug!(
                    path = %self.path.display(),
                    pod_count = update.pods.len(),
                    "Read pods from file source"
                );
                update
            }
            Err(e) if e.is_not_found() => {
                debug!(path = %self.path.display(), "Manifest path does not exist, publishing empty set");
                PodUpdate::empty_set(self.source.clone())
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to read pod manifests, publishing empty set"
                );
                PodUpdate::empty_set(self.source.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(path: impl Into<PathBuf>) -> FileSource {
        FileSource::new(path, Arc::new(Decoder::default()))
    }

    #[test]
    fn test_not_found() {
        let err = source("/some/fake/file").extract_once().unwrap_err();
        assert!(err.is_not_found(), "got {err:?}");
    }

    #[test]
    fn test_hidden_and_nested_entries_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = r#"{"version": "v1beta1", "id": "web", "containers": [{"image": "nginx"}]}"#;
        fs::write(dir.path().join(".hidden"), manifest).unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("pod.json"), manifest).unwrap();

        let update = source(dir.path()).extract_once().unwrap();
        assert!(update.pods.is_empty());
    }

    #[test]
    fn test_duplicate_uid_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = r#"{"version": "v1beta1", "uuid": "same", "containers": [{"image": "nginx"}]}"#;
        fs::write(dir.path().join("a.json"), manifest).unwrap();
        fs::write(dir.path().join("b.json"), manifest).unwrap();

        let update = source(dir.path()).extract_once().unwrap();
        assert_eq!(update.pods.len(), 1);
        assert_eq!(update.pods[0].uid(), "same");
    }

    #[tokio::test]
    async fn test_no_update_after_stop_while_blocked_on_full_queue() {
        let dir = tempfile::tempdir().unwrap();

        for _ in 0..32 {
            let (tx, mut rx) = mpsc::channel(1);
            tx.try_send(PodUpdate::empty_set(SourceKey::file())).unwrap();
            let (stop_tx, stop_rx) = watch::channel(false);
            let task = tokio::spawn(source(dir.path()).run(Duration::from_millis(1), tx, stop_rx));

            // Let the task poll and park on the full queue.
            tokio::time::sleep(Duration::from_millis(20)).await;

            // Free a slot and stop in the same step.
            rx.try_recv().unwrap();
            stop_tx.send(true).unwrap();
            task.await.unwrap();

            assert!(rx.try_recv().is_err(), "update sent after stop");
        }
    }

    #[tokio::test]
    async fn test_zero_interval_is_raised_to_minimum() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::channel(1);
        let handle = source(dir.path()).start(Duration::ZERO, tx);

        let update = tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("no update with zero interval")
            .expect("update channel closed");
        assert!(update.pods.is_empty());
        assert!(handle.is_running());

        // A second tick proves the loop survived.
        tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("no second update with zero interval")
            .expect("update channel closed");

        handle.stop().await;
    }

    #[test]
    fn test_error_display_names_path() {
        let err = ExtractError::NotFound(PathBuf::from("/etc/pods"));
        assert_eq!(err.to_string(), "path does not exist: /etc/pods");
    }
}
