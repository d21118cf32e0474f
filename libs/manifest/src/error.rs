//! Error types for manifest decoding.

use thiserror::Error;

/// Errors that can occur when decoding a manifest.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The bytes are not a structured document of the expected shape.
    #[error("unknown manifest format: {0}")]
    UnknownFormat(String),

    /// The version token is not registered.
    #[error("unknown manifest version: {0:?}")]
    UnknownVersion(String),

    /// A field required by this manifest version is absent.
    #[error("missing required field: {0}")]
    MissingField(String),
}

impl DecodeError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        DecodeError::UnknownFormat(msg.into())
    }

    pub(crate) fn missing(field: impl Into<String>) -> Self {
        DecodeError::MissingField(field.into())
    }
}

impl From<serde_yaml::Error> for DecodeError {
    fn from(err: serde_yaml::Error) -> Self {
        DecodeError::UnknownFormat(err.to_string())
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::UnknownFormat(err.to_string())
    }
}
