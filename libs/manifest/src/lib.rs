//! # podcfg-manifest
//!
//! Decodes user-authored pod manifests into the canonical [`Pod`].
//!
//! ## Pipeline
//!
//! 1. Parse the raw bytes (YAML, which also accepts JSON)
//! 2. Read the `version` token and dispatch to its registered converter
//! 3. Convert the versioned wire shape into a [`PodSpec`]
//! 4. Apply defaults: namespace, uid, name, self-link (in that order)
//!
//! ## Supported Versions
//!
//! - `v1beta1`: a volume without a source is an `emptyDir`
//! - `v1beta2`: every volume must name its source
//!
//! Unknown versions fail with [`DecodeError::UnknownVersion`]; there is no
//! fallback converter.
//!
//! [`Pod`]: podcfg_api::Pod
//! [`PodSpec`]: podcfg_api::PodSpec

mod convert;
mod decoder;
mod error;
mod naming;

pub use decoder::{DecodeBatch, Decoder, DecoderConfig};
pub use error::DecodeError;
pub use naming::{generate_name, ContentDigest};
