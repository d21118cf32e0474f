//! `v1beta2` container manifests.
//!
//! Same container shape as `v1beta1`, but a volume must declare its source.

use podcfg_api::{PodSpec, Volume as PodVolume};
use serde::Deserialize;

use super::v1beta1::{convert_containers, convert_volume_source, volume_name, Container, VolumeSource};
use super::Converted;
use crate::error::DecodeError;

pub(super) const VERSION: &str = "v1beta2";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainerManifest {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, alias = "uid")]
    uuid: Option<String>,
    #[serde(default)]
    containers: Vec<Container>,
    #[serde(default)]
    volumes: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
struct Volume {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    source: Option<VolumeSource>,
}

pub(super) fn convert(value: serde_yaml::Value) -> Result<Converted, DecodeError> {
    let manifest: ContainerManifest = serde_yaml::from_value(value)?;

    let containers = convert_containers(manifest.containers)?;
    let volumes = manifest
        .volumes
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            let name = volume_name(i, v.name)?;
            let source = match v.source {
                Some(source) => convert_volume_source(i, source)?,
                None => None,
            }
            .ok_or_else(|| DecodeError::missing(format!("volumes[{i}].source")))?;
            Ok(PodVolume { name, source })
        })
        .collect::<Result<_, DecodeError>>()?;

    Ok(Converted {
        id: manifest.id,
        uid: manifest.uuid,
        spec: PodSpec {
            containers,
            volumes,
        },
    })
}
