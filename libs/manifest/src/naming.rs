//! Content hashing and pod name generation.
//!
//! Generated names are a pure function of `(id, content, discriminator)`:
//!
//! - `<id>-<8 hex>` when the manifest supplies an id
//! - `pod-<16 hex>` otherwise
//!
//! The hex suffix is taken from SHA-256 over the canonical JSON form of the
//! manifest followed by the discriminator, so re-decoding an unchanged
//! manifest from the same origin yields the same name. Two origins (e.g. two
//! files) holding identical manifests get different names. Callers that need
//! hard uniqueness within a batch retry with a different discriminator, see
//! [`DecodeBatch`](crate::DecodeBatch).

use sha2::{Digest, Sha256};

use crate::error::DecodeError;

const DNS_LABEL_MAX_LEN: usize = 63;
const ID_SUFFIX_BYTES: usize = 4;
const ANONYMOUS_SUFFIX_BYTES: usize = 8;
const ANONYMOUS_PREFIX: &str = "pod";

/// SHA-256 of a manifest's canonical JSON form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Digest of an already parsed JSON document.
    ///
    /// Hashes the compact serialization. Object keys come out sorted since
    /// `serde_json::Map` is a `BTreeMap` without the `preserve_order` feature.
    pub fn from_json(value: &serde_json::Value) -> Self {
        Self(Sha256::digest(value.to_string().as_bytes()).into())
    }

    /// Digest of a parsed YAML document.
    ///
    /// Fails if the document cannot be represented as JSON (non-string keys).
    pub fn from_yaml(value: &serde_yaml::Value) -> Result<Self, DecodeError> {
        let json = serde_json::to_value(value)?;
        Ok(Self::from_json(&json))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Generates a pod name. Always non-empty and a valid DNS label.
pub fn generate_name(id: Option<&str>, content: &ContentDigest, discriminator: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher.update([0u8]);
    hasher.update(discriminator.as_bytes());
    let digest = hasher.finalize();

    match id.map(sanitize_label).filter(|base| !base.is_empty()) {
        Some(base) => format!("{base}-{}", hex::encode(&digest[..ID_SUFFIX_BYTES])),
        None => format!(
            "{ANONYMOUS_PREFIX}-{}",
            hex::encode(&digest[..ANONYMOUS_SUFFIX_BYTES])
        ),
    }
}

/// Lowercases `id` and replaces anything outside `[a-z0-9-]` with `-`,
/// leaving room for the `-<suffix>`.
fn sanitize_label(id: &str) -> String {
    let max = DNS_LABEL_MAX_LEN - 1 - ID_SUFFIX_BYTES * 2;
    let mapped: String = id
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = mapped.trim_matches('-');
    let truncated = &trimmed[..trimmed.len().min(max)];
    truncated.trim_end_matches('-').to_string()
}
