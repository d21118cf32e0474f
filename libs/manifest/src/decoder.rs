//! Manifest decoder and defaulter.

use std::collections::{BTreeMap, HashSet};

use podcfg_api::{self_link, ObjectMeta, Pod, NAMESPACE_DEFAULT};
use tracing::debug;
use uuid::Uuid;

use crate::convert::{self, ConvertFn, Converted};
use crate::error::DecodeError;
use crate::naming::{generate_name, ContentDigest};

/// Decoder configuration.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Namespace given to every decoded pod; manifests cannot carry one.
    pub default_namespace: String,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            default_namespace: NAMESPACE_DEFAULT.to_string(),
        }
    }
}

/// Decodes raw manifests into canonical pods.
///
/// Decoding is pure apart from uid generation for manifests that carry none.
#[derive(Debug, Clone)]
pub struct Decoder {
    config: DecoderConfig,
    converters: BTreeMap<&'static str, ConvertFn>,
}

/// A manifest that converted cleanly and is waiting for defaults.
struct Parsed {
    converted: Converted,
    digest: ContentDigest,
}

impl Decoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            config,
            converters: convert::registry(),
        }
    }

    pub fn default_namespace(&self) -> &str {
        &self.config.default_namespace
    }

    /// Version tokens this decoder understands.
    pub fn supported_versions(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.converters.keys().copied()
    }

    /// Decodes a single manifest with no origin.
    pub fn decode(&self, raw: &[u8]) -> Result<Pod, DecodeError> {
        self.decode_from(raw, "")
    }

    /// Decodes a single manifest, using `origin` (typically a file path) to
    /// discriminate its generated name from identical manifests elsewhere.
    pub fn decode_from(&self, raw: &[u8], origin: &str) -> Result<Pod, DecodeError> {
        let parsed = self.parse(raw)?;
        let digest = parsed.digest;
        Ok(self.apply_defaults(parsed.converted, |id| generate_name(id, &digest, origin)))
    }

    /// Starts a batch whose generated names are pairwise distinct.
    pub fn batch(&self) -> DecodeBatch<'_> {
        DecodeBatch {
            decoder: self,
            names: HashSet::new(),
        }
    }

    fn parse(&self, raw: &[u8]) -> Result<Parsed, DecodeError> {
        let text = std::str::from_utf8(raw)
            .map_err(|e| DecodeError::format(format!("manifest is not UTF-8: {e}")))?;
        let value: serde_yaml::Value = serde_yaml::from_str(text)?;
        if !value.is_mapping() {
            return Err(DecodeError::format("manifest must be a mapping"));
        }

        let version = match value.get("version") {
            None | Some(serde_yaml::Value::Null) => return Err(DecodeError::missing("version")),
            Some(serde_yaml::Value::String(v)) => v.clone(),
            Some(_) => return Err(DecodeError::format("version must be a string")),
        };
        let converter = self
            .converters
            .get(version.as_str())
            .ok_or_else(|| DecodeError::UnknownVersion(version.clone()))?;

        let digest = ContentDigest::from_yaml(&value)?;
        let converted = converter(value)?;
        debug!(
            version = %version,
            containers = converted.spec.containers.len(),
            volumes = converted.spec.volumes.len(),
            "Converted manifest"
        );

        Ok(Parsed { converted, digest })
    }

    /// Fills in identity fields. The order matters: the self-link is built
    /// from the final namespace and name.
    fn apply_defaults(
        &self,
        manifest: Converted,
        name_for: impl FnOnce(Option<&str>) -> String,
    ) -> Pod {
        let namespace = self.config.default_namespace.clone();

        let uid = manifest
            .uid
            .filter(|uid| !uid.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let name = name_for(manifest.id.as_deref().filter(|id| !id.is_empty()));

        let self_link = self_link(&namespace, &name);

        Pod {
            metadata: ObjectMeta {
                name,
                namespace,
                uid,
                self_link,
            },
            spec: manifest.spec,
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(DecoderConfig::default())
    }
}

/// Decodes a set of manifests that will be published together.
///
/// If a generated name is already taken within the batch, the discriminator
/// is extended with an attempt counter (`origin#1`, `origin#2`, ...) until the
/// name is free. Names stay stable across batches as long as the inputs and
/// their decode order do not change.
pub struct DecodeBatch<'a> {
    decoder: &'a Decoder,
    names: HashSet<String>,
}

impl DecodeBatch<'_> {
    pub fn decode(&mut self, raw: &[u8], origin: &str) -> Result<Pod, DecodeError> {
        let parsed = self.decoder.parse(raw)?;
        let digest = parsed.digest;
        let names = &self.names;

        let pod = self.decoder.apply_defaults(parsed.converted, |id| {
            let mut attempt = 0u32;
            loop {
                let name = if attempt == 0 {
                    generate_name(id, &digest, origin)
                } else {
                    generate_name(id, &digest, &format!("{origin}#{attempt}"))
                };
                if !names.contains(&name) {
                    return name;
                }
                attempt += 1;
            }
        });

        self.names.insert(pod.metadata.name.clone());
        Ok(pod)
    }

    /// Number of pods decoded so far.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
