//! podcfg Node Agent
//!
//! Reads pod manifests from the configured path and feeds them through the
//! merge pipeline. The reconciliation loop that acts on the merged updates
//! lives elsewhere; this binary logs what it would receive.

use std::sync::Arc;

use anyhow::Result;
use podcfg_api::SourceKey;
use podcfg_manifest::Decoder;
use podcfg_node_agent::{Config, FileSource, Merged, PodConfigMux};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.as_str().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting podcfg node agent");
    info!(
        manifest_path = ?config.manifest_path,
        file_check_interval_secs = config.file_check_interval.as_secs(),
        default_namespace = %config.default_namespace,
        "Configuration loaded"
    );

    let decoder = Arc::new(Decoder::new(config.decoder_config()));
    let (mux, mut merged_rx) = PodConfigMux::new(config.update_queue_capacity);

    let mut sources = Vec::new();
    match &config.manifest_path {
        Some(path) => {
            let updates = mux.channel(SourceKey::file());
            let source = FileSource::new(path, Arc::clone(&decoder));
            sources.push(source.start(config.file_check_interval, updates));
        }
        None => warn!("No manifest path configured, file source disabled"),
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
            merged = merged_rx.recv() => match merged {
                Some(merged) => {
                    log_merged(&merged);
                    debug!(known_pods = mux.current_view().await.len(), "Pod view updated");
                }
                None => {
                    info!("Merged update stream closed");
                    break;
                }
            }
        }
    }

    // Stop every source
    for source in sources {
        source.stop().await;
    }

    info!("Node agent shutdown complete");
    Ok(())
}

fn log_merged(merged: &Merged) {
    let update = &merged.update;
    info!(
        source = %update.source,
        op = %update.op,
        pod_count = update.pods.len(),
        retired = merged.retired.len(),
        "Desired pods changed"
    );
    for pod in &update.pods {
        debug!(source = %update.source, pod = %pod.identity(), uid = %pod.uid(), "Desired pod");
    }
    for pod in &merged.retired {
        debug!(source = %update.source, pod = %pod.identity(), "Retired pod");
    }
}
