//! Update envelope emitted by configuration sources.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pod::Pod;

/// Operation carried by a [`PodUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    /// The complete current pod set of the source.
    Set,
    /// Pods newly added by the source.
    Add,
    /// Pods whose spec changed.
    Update,
    /// Pods the source no longer wants.
    Remove,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Set => "SET",
            Operation::Add => "ADD",
            Operation::Update => "UPDATE",
            Operation::Remove => "REMOVE",
        };
        f.write_str(s)
    }
}

/// Stable name of the origin of an update.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceKey(String);

impl SourceKey {
    /// Pods read from a local file or directory.
    pub const FILE: &'static str = "file";
    /// Pods fetched from an HTTP endpoint.
    pub const HTTP: &'static str = "http";
    /// Pods bound to this node by the cluster API.
    pub const API: &'static str = "api";

    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn file() -> Self {
        Self::new(Self::FILE)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A change to the pods known for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodUpdate {
    pub op: Operation,
    pub source: SourceKey,
    pub pods: Vec<Pod>,
}

impl PodUpdate {
    pub fn new(op: Operation, source: SourceKey, pods: Vec<Pod>) -> Self {
        Self { op, source, pods }
    }

    /// Full replacement of the pods known for `source`.
    pub fn set(source: SourceKey, pods: Vec<Pod>) -> Self {
        Self::new(Operation::Set, source, pods)
    }

    /// A SET with no pods: the source currently knows of nothing.
    pub fn empty_set(source: SourceKey) -> Self {
        Self::set(source, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }
}
