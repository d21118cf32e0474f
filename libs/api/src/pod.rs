//! Canonical pod representation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API version used when building self-links.
pub const API_VERSION: &str = "v1beta1";

/// Namespace assigned when nothing else is configured.
pub const NAMESPACE_DEFAULT: &str = "default";

/// Path a container writes its termination message to unless told otherwise.
pub const DEFAULT_TERMINATION_MESSAGE_PATH: &str = "/dev/termination-log";

/// Builds the canonical locator of a pod resource.
///
/// This is a pure function of its inputs: the same `(namespace, name)` pair
/// always produces the same link.
pub fn self_link(namespace: &str, name: &str) -> String {
    format!("/api/{API_VERSION}/namespaces/{namespace}/pods/{name}")
}

/// Identity of a pod within one source: `namespace/name`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PodIdentity {
    pub namespace: String,
    pub name: String,
}

impl PodIdentity {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PodIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Metadata every pod carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Unique name within the namespace.
    pub name: String,

    /// Owning namespace.
    pub namespace: String,

    /// Unique identifier of this pod instance.
    pub uid: String,

    /// Canonical locator, see [`self_link`].
    pub self_link: String,
}

/// A named, namespaced group of containers and volumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pod {
    pub metadata: ObjectMeta,
    pub spec: PodSpec,
}

impl Pod {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    pub fn uid(&self) -> &str {
        &self.metadata.uid
    }

    /// Identity used by the merge pipeline.
    pub fn identity(&self) -> PodIdentity {
        PodIdentity::new(&self.metadata.namespace, &self.metadata.name)
    }
}

/// Desired containers and volumes of a pod.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSpec {
    pub containers: Vec<Container>,
    pub volumes: Vec<Volume>,
}

/// A single container in a pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    /// Container name, may be empty when the manifest did not supply one.
    pub name: String,

    /// Image reference.
    pub image: String,

    pub image_pull_policy: PullPolicy,

    pub termination_message_path: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ContainerPort>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
}

impl Container {
    /// A container running `image` with every other field defaulted.
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            image: image.into(),
            image_pull_policy: PullPolicy::default(),
            termination_message_path: DEFAULT_TERMINATION_MESSAGE_PATH.to_string(),
            command: Vec::new(),
            working_dir: None,
            ports: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// An exposed container port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerPort {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub container_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_port: Option<u16>,
    pub protocol: Protocol,
}

/// Transport protocol of a port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

/// Environment variable passed to a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

/// When to pull a container image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PullPolicy {
    /// Always pull before starting.
    #[serde(rename = "PullAlways")]
    Always,
    /// Never pull, use the local image only.
    #[serde(rename = "PullNever")]
    Never,
    /// Pull only when the image is absent.
    #[default]
    #[serde(rename = "PullIfNotPresent")]
    IfNotPresent,
}

impl PullPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Always => "PullAlways",
            Self::Never => "PullNever",
            Self::IfNotPresent => "PullIfNotPresent",
        }
    }
}

impl fmt::Display for PullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a pull policy string is not recognised.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown image pull policy: {0}")]
pub struct ParsePullPolicyError(pub String);

impl FromStr for PullPolicy {
    type Err = ParsePullPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PullAlways" => Ok(Self::Always),
            "PullNever" => Ok(Self::Never),
            "PullIfNotPresent" => Ok(Self::IfNotPresent),
            other => Err(ParsePullPolicyError(other.to_string())),
        }
    }
}

/// A named volume available to the containers of a pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub name: String,
    pub source: VolumeSource,
}

/// Where a volume's contents come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeSource {
    /// A directory on the host.
    HostPath { path: String },
    /// Scratch space that lives as long as the pod.
    EmptyDir,
    /// A git repository checked out at pod start.
    GitRepo {
        repository: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        revision: Option<String>,
    },
}
