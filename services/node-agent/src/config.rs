//! Configuration for the node agent.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use podcfg_api::NAMESPACE_DEFAULT;
use podcfg_manifest::DecoderConfig;

/// Node agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// File or directory holding pod manifests. The file source is disabled
    /// when unset.
    pub manifest_path: Option<PathBuf>,

    /// How often the manifest path is re-read.
    pub file_check_interval: Duration,

    /// Namespace assigned to pods decoded from manifests.
    pub default_namespace: String,

    /// Capacity of each source queue and of the merged update queue.
    pub update_queue_capacity: usize,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let manifest_path = lookup("PODCFG_MANIFEST_PATH")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let file_check_interval_secs: u64 = match lookup("PODCFG_FILE_CHECK_INTERVAL") {
            Some(s) => s
                .parse()
                .with_context(|| format!("invalid PODCFG_FILE_CHECK_INTERVAL: {s:?}"))?,
            None => 20,
        };
        if file_check_interval_secs == 0 {
            bail!("PODCFG_FILE_CHECK_INTERVAL must be at least 1 second");
        }

        let default_namespace = lookup("PODCFG_DEFAULT_NAMESPACE")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| NAMESPACE_DEFAULT.to_string());

        let update_queue_capacity: usize = match lookup("PODCFG_UPDATE_QUEUE_CAPACITY") {
            Some(s) => s
                .parse()
                .with_context(|| format!("invalid PODCFG_UPDATE_QUEUE_CAPACITY: {s:?}"))?,
            None => 50,
        };
        if update_queue_capacity == 0 {
            bail!("PODCFG_UPDATE_QUEUE_CAPACITY must be greater than zero");
        }

        let log_level = lookup("PODCFG_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            manifest_path,
            file_check_interval: Duration::from_secs(file_check_interval_secs),
            default_namespace,
            update_queue_capacity,
            log_level,
        })
    }

    pub fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig {
            default_namespace: self.default_namespace.clone(),
        }
    }
}
