use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::consumer::{Cleaner, CleanerStats};
use super::pipeline::{channel, Producer};
use crate::config::CleanerConfig;
use crate::conntrack::{DeletionExecutor, TableSampler};
use crate::error::{CleanerError, Result};
use crate::telemetry::{Metrics, Readiness};

/// Run the sampler and the cleaner until `shutdown` flips to `true`.
///
/// The sampler runs on its own task and the cleaner on the caller's. Returns
/// once the sampler has stopped and the cleaner has drained the pipeline.
pub async fn run<S, E>(
    config: &CleanerConfig,
    sampler: S,
    executor: E,
    metrics: Option<Arc<Metrics>>,
    readiness: Readiness,
    shutdown: watch::Receiver<bool>,
) -> CleanerStats
where
    S: TableSampler + 'static,
    E: DeletionExecutor,
{
    info!(
        sampling_interval_ms = config.sampling_interval_ms,
        purge_threshold_ms = config.purge_threshold_ms,
        renewal_threshold = config.renewal_threshold,
        udp = config.udp_enabled,
        tcp = config.tcp_enabled,
        "starting conntrack cleaner"
    );

    let (tx, rx) = channel();

    let mut producer = Producer::new(sampler, config.clone());
    let mut cleaner = Cleaner::new(config, executor).with_readiness(readiness);
    if let Some(m) = metrics {
        producer = producer.with_metrics(m.clone());
        cleaner = cleaner.with_metrics(m);
    }

    let producer = tokio::spawn(producer.run(tx, shutdown));
    let stats = cleaner.run(rx).await;

    if let Err(e) = producer.await {
        error!(error = %e, "conntrack sampler task failed");
    }

    stats
}

/// Flip `shutdown` to `true` on the first SIGTERM or SIGINT.
pub fn spawn_signal_listener(shutdown: watch::Sender<bool>) -> Result<JoinHandle<()>> {
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate()).map_err(|e| {
        CleanerError::Io(std::io::Error::other(format!("Failed to setup SIGTERM handler: {e}")))
    })?;
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt()).map_err(|e| {
        CleanerError::Io(std::io::Error::other(format!("Failed to setup SIGINT handler: {e}")))
    })?;

    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
            _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
        }
        let _ = shutdown.send(true);
    }))
}
