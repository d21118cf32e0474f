//! Merge multiplexer: fans in updates from every source.
//!
//! The multiplexer keeps the last known pod set of each source and publishes
//! every applied update downstream, so the reconciliation loop can consume
//! either the stream of changes or a full snapshot via
//! [`PodConfigMux::current_view`].
//!
//! ## Invariants
//!
//! - Pods are keyed by `(source, namespace/name)`; identities from different
//!   sources are never merged
//! - A SET replaces the source's snapshot wholesale
//! - An update is applied entirely or not at all, under one write lock
//! - An update naming the same pod twice is rejected
//! - Updates from one source are applied and published in arrival order

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use podcfg_api::{Operation, Pod, PodIdentity, PodUpdate, SourceKey};
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Errors from applying an update.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// A REMOVE referenced a pod the source never published.
    #[error("pod {identity} not found in source {source_key}")]
    NotFound {
        source_key: SourceKey,
        identity: PodIdentity,
    },

    /// An update listed the same pod more than once.
    #[error("pod {identity} appears more than once in update from source {source_key}")]
    DuplicatePod {
        source_key: SourceKey,
        identity: PodIdentity,
    },
}

/// An applied update together with the pods it retired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merged {
    /// The update exactly as it was applied.
    pub update: PodUpdate,

    /// Pods the source knew before this update and no longer has.
    pub retired: Vec<Pod>,
}

/// Snapshot of every pod known per source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodView {
    sources: BTreeMap<SourceKey, BTreeMap<PodIdentity, Pod>>,
}

impl PodView {
    /// Pods currently known for `source`.
    pub fn pods<'a>(&'a self, source: &SourceKey) -> impl Iterator<Item = &'a Pod> + 'a {
        self.sources.get(source).into_iter().flat_map(|pods| pods.values())
    }

    pub fn get(&self, source: &SourceKey, identity: &PodIdentity) -> Option<&Pod> {
        self.sources.get(source)?.get(identity)
    }

    /// Every pod with the source it came from.
    pub fn iter(&self) -> impl Iterator<Item = (&SourceKey, &Pod)> {
        self.sources
            .iter()
            .flat_map(|(source, pods)| pods.values().map(move |pod| (source, pod)))
    }

    /// Sources that have delivered at least one update.
    pub fn sources(&self) -> impl Iterator<Item = &SourceKey> {
        self.sources.keys()
    }

    /// Total number of pods across all sources.
    pub fn len(&self) -> usize {
        self.sources.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-source snapshots and the rules for applying updates to them.
#[derive(Debug, Default)]
pub struct MergeState {
    view: PodView,
}

impl MergeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> &PodView {
        &self.view
    }

    /// Applies one update to the snapshot of its source.
    ///
    /// An update that names one identity twice is rejected as a whole.
    pub fn apply(&mut self, update: PodUpdate) -> Result<Merged, MergeError> {
        let mut seen = BTreeSet::new();
        if let Some(pod) = update.pods.iter().find(|pod| !seen.insert(pod.identity())) {
            return Err(MergeError::DuplicatePod {
                source_key: update.source.clone(),
                identity: pod.identity(),
            });
        }

        let retired = match update.op {
            Operation::Set => {
                let next: BTreeMap<_, _> = update
                    .pods
                    .iter()
                    .map(|pod| (pod.identity(), pod.clone()))
                    .collect();
                let previous = self
                    .view
                    .sources
                    .insert(update.source.clone(), next)
                    .unwrap_or_default();
                let current = &self.view.sources[&update.source];
                previous
                    .into_iter()
                    .filter(|(identity, _)| !current.contains_key(identity))
                    .map(|(_, pod)| pod)
                    .collect()
            }
            Operation::Add | Operation::Update => {
                let snapshot = self.view.sources.entry(update.source.clone()).or_default();
                for pod in &update.pods {
                    snapshot.insert(pod.identity(), pod.clone());
                }
                Vec::new()
            }
            Operation::Remove => {
                let snapshot = self.view.sources.get_mut(&update.source);
                let identities: Vec<_> = update.pods.iter().map(Pod::identity).collect();

                // Check everything first so a failed REMOVE changes nothing.
                let missing = identities.iter().find(|identity| {
                    !snapshot
                        .as_ref()
                        .is_some_and(|pods| pods.contains_key(*identity))
                });
                if let Some(identity) = missing {
                    return Err(MergeError::NotFound {
                        source_key: update.source.clone(),
                        identity: identity.clone(),
                    });
                }

                match snapshot {
                    Some(pods) => identities
                        .iter()
                        .filter_map(|identity| pods.remove(identity))
                        .collect(),
                    None => Vec::new(),
                }
            }
        };

        Ok(Merged { update, retired })
    }
}

/// Async front end of [`MergeState`].
///
/// Each attached source gets its own forwarding task. All of them apply
/// updates through one shared lock and publish to one downstream queue.
/// There is no ordering between updates of different sources.
#[derive(Clone)]
pub struct PodConfigMux {
    state: Arc<RwLock<MergeState>>,
    merged_tx: mpsc::Sender<Merged>,
    capacity: usize,
}

impl PodConfigMux {
    /// Creates a multiplexer and the receiver of merged updates.
    ///
    /// `capacity` bounds the downstream queue and every queue created by
    /// [`PodConfigMux::channel`].
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Merged>) {
        let (merged_tx, merged_rx) = mpsc::channel(capacity);
        let mux = Self {
            state: Arc::new(RwLock::new(MergeState::new())),
            merged_tx,
            capacity,
        };
        (mux, merged_rx)
    }

    /// Creates a queue for `source` and attaches its receiving end.
    pub fn channel(&self, source: SourceKey) -> mpsc::Sender<PodUpdate> {
        let (tx, rx) = mpsc::channel(self.capacity);
        // The forwarding task ends on its own once every sender is dropped.
        drop(self.attach(source, rx));
        tx
    }

    /// Consumes `updates` on behalf of `source` until the stream closes.
    ///
    /// Updates are attributed to `source` whatever their own `source` field
    /// says. Each key should be attached once.
    pub fn attach(
        &self,
        source: SourceKey,
        mut updates: mpsc::Receiver<PodUpdate>,
    ) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let merged_tx = self.merged_tx.clone();

        tokio::spawn(async move {
            info!(source = %source, "Attached pod source");

            while let Some(mut update) = updates.recv().await {
                if update.source != source {
                    warn!(
                        source = %source,
                        claimed = %update.source,
                        "Update claims a different source, attributing to attached source"
                    );
                    update.source = source.clone();
                }

                let op = update.op;
                let pod_count = update.pods.len();
                let result = state.write().await.apply(update);

                match result {
                    Ok(merged) => {
                        debug!(
                            source = %source,
                            op = %op,
                            pod_count,
                            retired = merged.retired.len(),
                            "Merged update"
                        );
                        if merged_tx.send(merged).await.is_err() {
                            info!(source = %source, "Merged update receiver dropped");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(source = %source, op = %op, error = %e, "Failed to merge update");
                    }
                }
            }

            info!(source = %source, "Pod source detached");
        })
    }

    /// Full snapshot of every source. Never reflects a partially applied
    /// update.
    pub async fn current_view(&self) -> PodView {
        self.state.read().await.view().clone()
    }
}
