//! Version-specific manifest converters.
//!
//! Each supported schema version registers exactly one converter. The set
//! is closed: adding a version means adding a module here and an entry in
//! [`registry`].

use std::collections::BTreeMap;

use podcfg_api::PodSpec;

use crate::error::DecodeError;

mod v1beta1;
mod v1beta2;

/// Output of a converter, before defaulting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Converted {
    pub id: Option<String>,
    pub uid: Option<String>,
    pub spec: PodSpec,
}

/// Maps a parsed manifest of one version into [`Converted`].
pub(crate) type ConvertFn = fn(serde_yaml::Value) -> Result<Converted, DecodeError>;

/// All registered converters keyed by version token.
pub(crate) fn registry() -> BTreeMap<&'static str, ConvertFn> {
    let mut converters: BTreeMap<&'static str, ConvertFn> = BTreeMap::new();
    converters.insert(v1beta1::VERSION, v1beta1::convert);
    converters.insert(v1beta2::VERSION, v1beta2::convert);
    converters
}
