//! `v1beta1` container manifests.
//!
//! The container wire shape defined here is shared with `v1beta2`; the two
//! versions differ in how volumes are declared.

use podcfg_api::{
    Container as PodContainer, ContainerPort, EnvVar as PodEnvVar, PodSpec, Protocol, PullPolicy,
    Volume as PodVolume, VolumeSource as PodVolumeSource, DEFAULT_TERMINATION_MESSAGE_PATH,
};
use serde::Deserialize;

use super::Converted;
use crate::error::DecodeError;

pub(super) const VERSION: &str = "v1beta1";

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
#[serde(rename_all = "camelCase")]
pub(super) struct Container {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    image_pull_policy: Option<String>,
    #[serde(default)]
    termination_message_path: Option<String>,
    #[serde(default)]
    command: Vec<String>,
    #[serde(default)]
    working_dir: Option<String>,
    #[serde(default)]
    ports: Vec<Port>,
    #[serde(default)]
    env: Vec<EnvVar>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Port {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    container_port: Option<u16>,
    #[serde(default)]
    host_port: Option<u16>,
    #[serde(default)]
    protocol: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct EnvVar {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Volume {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    source: Option<VolumeSource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct VolumeSource {
    #[serde(default)]
    host_dir: Option<HostDir>,
    #[serde(default)]
    empty_dir: Option<EmptyDir>,
    #[serde(default)]
    git_repo: Option<GitRepo>,
}

#[derive(Debug, Deserialize)]
struct HostDir {
    #[serde(default)]
    path: String,
}

#[derive(Debug, Deserialize)]
struct EmptyDir {}

#[derive(Debug, Deserialize)]
struct GitRepo {
    #[serde(default)]
    repository: String,
    #[serde(default)]
    revision: Option<String>,
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
            // A volume without a source predates explicit emptyDir.
            let source = match v.source {
                Some(source) => convert_volume_source(i, source)?,
                None => None,
            }
            .unwrap_or(PodVolumeSource::EmptyDir);
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

pub(super) fn convert_containers(
    containers: Vec<Container>,
) -> Result<Vec<PodContainer>, DecodeError> {
    containers
        .into_iter()
        .enumerate()
        .map(|(i, c)| convert_container(i, c))
        .collect()
}

fn convert_container(i: usize, c: Container) -> Result<PodContainer, DecodeError> {
    let image = c
        .image
        .filter(|image| !image.is_empty())
        .ok_or_else(|| DecodeError::missing(format!("containers[{i}].image")))?;

    let image_pull_policy = match c.image_pull_policy.as_deref() {
        None | Some("") => PullPolicy::default(),
        Some(policy) => policy
            .parse()
            .map_err(|e| DecodeError::format(format!("containers[{i}].imagePullPolicy: {e}")))?,
    };

    let ports = c
        .ports
        .into_iter()
        .enumerate()
        .map(|(j, p)| {
            let container_port = p.container_port.ok_or_else(|| {
                DecodeError::missing(format!("containers[{i}].ports[{j}].containerPort"))
            })?;
            let protocol = match p.protocol.as_deref() {
                None | Some("") => Protocol::default(),
                Some(s) if s.eq_ignore_ascii_case("tcp") => Protocol::Tcp,
                Some(s) if s.eq_ignore_ascii_case("udp") => Protocol::Udp,
                Some(s) => {
                    return Err(DecodeError::format(format!(
                        "containers[{i}].ports[{j}].protocol: unsupported protocol {s:?}"
                    )))
                }
            };
            Ok(ContainerPort {
                name: p.name.filter(|n| !n.is_empty()),
                container_port,
                host_port: p.host_port,
                protocol,
            })
        })
        .collect::<Result<_, DecodeError>>()?;

    let env = c
        .env
        .into_iter()
        .enumerate()
        .map(|(j, e)| {
            let name = e
                .name
                .filter(|n| !n.is_empty())
                .ok_or_else(|| DecodeError::missing(format!("containers[{i}].env[{j}].name")))?;
            Ok(PodEnvVar {
                name,
                value: e.value.unwrap_or_default(),
            })
        })
        .collect::<Result<_, DecodeError>>()?;

    Ok(PodContainer {
        name: c.name.unwrap_or_default(),
        image,
        image_pull_policy,
        termination_message_path: c
            .termination_message_path
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_TERMINATION_MESSAGE_PATH.to_string()),
        command: c.command,
        working_dir: c.working_dir.filter(|d| !d.is_empty()),
        ports,
        env,
    })
}

pub(super) fn volume_name(i: usize, name: Option<String>) -> Result<String, DecodeError> {
    name.filter(|n| !n.is_empty())
        .ok_or_else(|| DecodeError::missing(format!("volumes[{i}].name")))
}

/// At most one source variant may be set. Returns `None` for an empty source
/// object so each version can decide what absence means.
pub(super) fn convert_volume_source(
    i: usize,
    source: VolumeSource,
) -> Result<Option<PodVolumeSource>, DecodeError> {
    let mut variants = Vec::with_capacity(1);
    if let Some(host_dir) = source.host_dir {
        variants.push(PodVolumeSource::HostPath {
            path: host_dir.path,
        });
    }
    if source.empty_dir.is_some() {
        variants.push(PodVolumeSource::EmptyDir);
    }
    if let Some(git) = source.git_repo {
        variants.push(PodVolumeSource::GitRepo {
            repository: git.repository,
            revision: git.revision.filter(|r| !r.is_empty()),
        });
    }

    match variants.len() {
        0 => Ok(None),
        1 => Ok(variants.pop()),
        _ => Err(DecodeError::format(format!(
            "volumes[{i}].source: exactly one volume source may be set"
        ))),
    }
}
