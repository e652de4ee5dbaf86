//! Producer half of the cleaner: samples the table, decodes it and hands the
//! records to the consumer one at a time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use crate::config::CleanerConfig;
use crate::conntrack::{parse_table, ConnRecord, TableSampler};
use crate::telemetry::metrics::values;
use crate::telemetry::Metrics;

/// A single in-flight message: the producer waits for the consumer to pick
/// up each record before decoding the next one.
pub const PIPELINE_CAPACITY: usize = 1;

/// Message carried from the producer to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpEvent {
    Record(ConnRecord),
    /// Every record of the current table dump has been sent
    EndOfDump,
}

pub fn channel() -> (mpsc::Sender<DumpEvent>, mpsc::Receiver<DumpEvent>) {
    mpsc::channel(PIPELINE_CAPACITY)
}

#[derive(Debug, Error)]
#[error("pipeline consumer has gone away")]
pub struct PipelineClosed;

/// Counters for one sampling round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundStats {
    /// Round skipped: query failed or returned nothing
    pub skipped: bool,
    pub sent: usize,
    pub filtered: usize,
    pub decode_failures: usize,
}

pub struct Producer<S> {
    sampler: S,
    config: CleanerConfig,
    metrics: Option<Arc<Metrics>>,
}

impl<S: TableSampler> Producer<S> {
    pub fn new(sampler: S, config: CleanerConfig) -> Self {
        Self { sampler, config, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Sample, decode and forward until `shutdown` flips to `true`.
    ///
    /// Shutdown is only honoured between rounds, so the consumer always sees a
    /// complete dump followed by its `EndOfDump`. Dropping `tx` on return lets
    /// the consumer drain the channel and stop.
    pub async fn run(self, tx: mpsc::Sender<DumpEvent>, mut shutdown: watch::Receiver<bool>) {
        let interval = self.config.sampling_interval();
        info!(?interval, "conntrack sampler started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.sample_round(&tx).await {
                warn!(error = %e, "stopping sampler");
                break;
            }

            if pause(interval, &mut shutdown).await {
                break;
            }
        }

        info!("conntrack sampler stopped");
    }

    /// Run one sampling round and push its records into the pipeline.
    pub async fn sample_round(
        &self,
        tx: &mpsc::Sender<DumpEvent>,
    ) -> Result<RoundStats, PipelineClosed> {
        let mut stats = RoundStats::default();

        let started = Instant::now();
        let sampled = self.sampler.sample().await;
        let elapsed = started.elapsed().as_secs_f64();

        let table = match sampled {
            Ok(table) if table.trim().is_empty() => {
                debug!("no unanswered conntrack entries, skipping round");
                self.record_sample(values::SAMPLE_EMPTY, elapsed);
                stats.skipped = true;
                return Ok(stats);
            }
            Ok(table) => table,
            Err(e) => {
                warn!(error = %e, "conntrack table query failed, skipping round");
                self.record_sample(values::SAMPLE_FAILED, elapsed);
                stats.skipped = true;
                return Ok(stats);
            }
        };
        self.record_sample(values::SAMPLE_OK, elapsed);

        for (line, result) in parse_table(&table) {
            match result {
                Ok(record) if self.config.tracks(record.protocol) => {
                    tx.send(DumpEvent::Record(record))
                        .await
                        .map_err(|_| PipelineClosed)?;
                    stats.sent = stats.sent.saturating_add(1);
                }
                Ok(record) => {
                    trace!(%record, "tracking disabled for protocol, dropping record");
                    if let Some(m) = &self.metrics {
                        m.record_filtered(record.protocol);
                    }
                    stats.filtered = stats.filtered.saturating_add(1);
                }
                Err(e) => {
                    warn!(line, error = %e, "failed to decode conntrack entry");
                    if let Some(m) = &self.metrics {
                        m.record_decode_failure(e.reason());
                    }
                    stats.decode_failures = stats.decode_failures.saturating_add(1);
                }
            }
        }

        tx.send(DumpEvent::EndOfDump)
            .await
            .map_err(|_| PipelineClosed)?;

        debug!(
            sent = stats.sent,
            filtered = stats.filtered,
            decode_failures = stats.decode_failures,
            "table dump forwarded"
        );
        Ok(stats)
    }

    fn record_sample(&self, result: &'static str, elapsed: f64) {
        if let Some(m) = &self.metrics {
            m.record_sample(result, elapsed);
        }
    }
}

/// Sleep for `interval`; returns `true` if shutdown was requested meanwhile.
async fn pause(interval: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    let sleep = tokio::time::sleep(interval);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            res = shutdown.changed() => match res {
                Ok(()) if *shutdown.borrow() => {
                    info!("shutdown signal received, stopping sampler");
                    return true;
                }
                Ok(()) => continue,
                // sender dropped; treat as no shutdown signal
                Err(_) => {
                    (&mut sleep).await;
                    return false;
                }
            },
        }
    }
}
