//! podcfg Node Agent Library
//!
//! Turns pod manifests from independent configuration sources into one
//! attributed stream of desired-state updates for the agent's
//! reconciliation loop.
//!
//! ## Architecture
//!
//! ```text
//! FileSource ──┐
//! (other)    ──┼──> PodConfigMux ──> Merged updates ──> reconciliation loop
//! (other)    ──┘         │
//!                        └── current_view() (per-source snapshots)
//! ```
//!
//! ## Modules
//!
//! - `config`: Environment-based configuration
//! - `source`: Configuration sources and their task handles
//! - `mux`: Fan-in of source updates into per-source snapshots

pub mod config;
pub mod mux;
pub mod source;

// Re-export commonly used types
pub use config::Config;
pub use mux::{MergeError, MergeState, Merged, PodConfigMux, PodView};
pub use source::{ExtractError, FileSource, SourceHandle};
