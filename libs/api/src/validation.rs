//! Semantic validation of decoded pods.

use std::collections::HashSet;

use thiserror::Error;

use crate::pod::{Pod, VolumeSource};

const DNS_LABEL_MAX_LEN: usize = 63;
const DNS_SUBDOMAIN_MAX_LEN: usize = 253;

/// A single validation failure. `field` is a dotted path into the pod.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field}: required value")]
    Required { field: String },

    #[error("{field}: invalid value {value:?}: {reason}")]
    Invalid {
        field: String,
        value: String,
        reason: &'static str,
    },

    #[error("{field}: duplicate value {value:?}")]
    Duplicate { field: String, value: String },
}

/// Validates a pod, returning every problem found.
pub fn validate_pod(pod: &Pod) -> Result<(), Vec<ValidationError>> {
    let mut errs = Vec::new();
    let meta = &pod.metadata;

    check_subdomain(&mut errs, "metadata.name", &meta.name);
    check_subdomain(&mut errs, "metadata.namespace", &meta.namespace);
    if meta.uid.is_empty() {
        errs.push(required("metadata.uid"));
    }

    let mut container_names = HashSet::new();
    for (i, c) in pod.spec.containers.iter().enumerate() {
        if c.image.is_empty() {
            errs.push(required(format!("spec.containers[{i}].image")));
        }
        // Names are optional for file manifests but must be unique when present.
        if !c.name.is_empty() {
            let field = format!("spec.containers[{i}].name");
            check_label(&mut errs, &field, &c.name);
            if !container_names.insert(c.name.as_str()) {
                errs.push(ValidationError::Duplicate {
                    field,
                    value: c.name.clone(),
                });
            }
        }
        for (j, port) in c.ports.iter().enumerate() {
            if port.container_port == 0 {
                errs.push(ValidationError::Invalid {
                    field: format!("spec.containers[{i}].ports[{j}].containerPort"),
                    value: "0".to_string(),
                    reason: "must be between 1 and 65535",
                });
            }
        }
    }

    let mut volume_names = HashSet::new();
    for (i, v) in pod.spec.volumes.iter().enumerate() {
        let field = format!("spec.volumes[{i}].name");
        check_label(&mut errs, &field, &v.name);
        if !v.name.is_empty() && !volume_names.insert(v.name.as_str()) {
            errs.push(ValidationError::Duplicate {
                field,
                value: v.name.clone(),
            });
        }
        match &v.source {
            VolumeSource::HostPath { path } if path.is_empty() => {
                errs.push(required(format!("spec.volumes[{i}].source.hostPath.path")));
            }
            VolumeSource::GitRepo { repository, .. } if repository.is_empty() => {
                errs.push(required(format!(
                    "spec.volumes[{i}].source.gitRepo.repository"
                )));
            }
            _ => {}
        }
    }

    if errs.is_empty() {
        Ok(())
    } else {
        Err(errs)
    }
}

fn required(field: impl Into<String>) -> ValidationError {
    ValidationError::Required {
        field: field.into(),
    }
}

fn check_label(errs: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.is_empty() {
        errs.push(required(field));
    } else if !is_dns_label(value) {
        errs.push(ValidationError::Invalid {
            field: field.to_string(),
            value: value.to_string(),
            reason: "must be a DNS label",
        });
    }
}

fn check_subdomain(errs: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.is_empty() {
        errs.push(required(field));
    } else if !is_dns_subdomain(value) {
        errs.push(ValidationError::Invalid {
            field: field.to_string(),
            value: value.to_string(),
            reason: "must be a DNS subdomain",
        });
    }
}

/// Lowercase alphanumerics and '-', starting and ending alphanumeric.
pub(crate) fn is_dns_label(s: &str) -> bool {
    let bytes = s.as_bytes();
    !bytes.is_empty()
        && bytes.len() <= DNS_LABEL_MAX_LEN
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        && bytes[0].is_ascii_alphanumeric()
        && bytes[bytes.len() - 1].is_ascii_alphanumeric()
}

pub(crate) fn is_dns_subdomain(s: &str) -> bool {
    s.len() <= DNS_SUBDOMAIN_MAX_LEN && s.split('.').all(is_dns_label)
}
