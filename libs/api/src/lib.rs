//! # podcfg-api
//!
//! Canonical pod types shared by every configuration source and the merge
//! pipeline of the node agent.
//!
//! ## Design Principles
//!
//! - A [`Pod`] is immutable once constructed by a decoder
//! - `name` and `uid` are never empty on a constructed pod
//! - The self-link is derived from `(namespace, name)` and nothing else
//! - Every [`PodUpdate`] is attributed to exactly one [`SourceKey`]
//!
//! ## Update Envelope
//!
//! Sources communicate with the merge pipeline through [`PodUpdate`]:
//! - `SET` carries the complete current pod set of a source
//! - `ADD`, `UPDATE` and `REMOVE` carry incremental deltas

mod pod;
mod update;
mod validation;

pub use pod::*;
pub use update::*;
pub use validation::{validate_pod, ValidationError};
