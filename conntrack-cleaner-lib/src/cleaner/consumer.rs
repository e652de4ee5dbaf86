use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::gate::evaluate;
use super::generation::{GenerationComparator, RotationSummary};
use super::pipeline::DumpEvent;
use super::tracker::{Observation, StalenessTracker};
use crate::config::CleanerConfig;
use crate::conntrack::{ConnKey, ConnRecord, DeletionExecutor};
use crate::telemetry::metrics::values;
use crate::telemetry::{Metrics, Readiness};

/// Running totals kept by the consumer, reported on shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanerStats {
    pub observed: u64,
    pub stale: u64,
    pub deleted: u64,
    pub deletion_failures: u64,
    pub suppressed: u64,
    pub rotations: u64,
    pub purged: u64,
    pub disappeared: u64,
}

/// Consumer half of the cleaner.
///
/// Owns the tracker and the generation snapshots; nothing else mutates them.
pub struct Cleaner<E> {
    tracker: StalenessTracker,
    generations: GenerationComparator,
    executor: E,
    metrics: Option<Arc<Metrics>>,
    readiness: Option<Readiness>,
    stats: CleanerStats,
}

impl<E: DeletionExecutor> Cleaner<E> {
    pub fn new(config: &CleanerConfig, executor: E) -> Self {
        Self {
            tracker: StalenessTracker::new(config.renewal_threshold),
            generations: GenerationComparator::new(config.purge_threshold()),
            executor,
            metrics: None,
            readiness: None,
            stats: CleanerStats::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_readiness(mut self, readiness: Readiness) -> Self {
        self.readiness = Some(readiness);
        self
    }

    /// Consume the pipeline until the producer goes away.
    pub async fn run(mut self, mut rx: mpsc::Receiver<DumpEvent>) -> CleanerStats {
        while let Some(event) = rx.recv().await {
            self.handle(event).await;
        }
        info!(tracked = self.tracker.len(), "pipeline closed, cleaner stopped");
        self.stats
    }

    pub async fn handle(&mut self, event: DumpEvent) {
        match event {
            DumpEvent::Record(record) => {
                self.observe(record).await;
            }
            DumpEvent::EndOfDump => {
                self.rotate();
            }
        }
    }

    pub async fn observe(&mut self, record: ConnRecord) -> Observation {
        self.observe_at(record, Instant::now()).await
    }

    /// Track one record and delete its kernel entry if it just became stale.
    pub async fn observe_at(&mut self, record: ConnRecord, now: Instant) -> Observation {
        if let Some(m) = &self.metrics {
            m.record_observed(record.protocol);
        }
        self.stats.observed = self.stats.observed.saturating_add(1);

        let observation = self.tracker.observe_at(record, now);
        if let Observation::Stale(record) = &observation {
            self.remove_stale(record).await;
        }
        observation
    }

    pub fn rotate(&mut self) -> RotationSummary {
        self.rotate_at(Instant::now())
    }

    pub fn rotate_at(&mut self, now: Instant) -> RotationSummary {
        let summary = self.generations.rotate_at(&mut self.tracker, now);

        debug!(
            first = summary.first,
            disappeared = summary.disappeared,
            purged = summary.purged,
            tracked = summary.tracked,
            "generation rotated"
        );
        if summary.purged > 0 {
            info!(purged = summary.purged, "forgot flows older than the purge threshold");
        }

        self.stats.rotations = self.stats.rotations.saturating_add(1);
        self.stats.purged = self.stats.purged.saturating_add(summary.purged as u64);
        self.stats.disappeared = self
            .stats
            .disappeared
            .saturating_add(summary.disappeared as u64);

        if let Some(m) = &self.metrics {
            m.record_rotation(&summary);
        }
        if let Some(r) = &self.readiness {
            r.mark_ready();
        }

        summary
    }

    async fn remove_stale(&mut self, record: &ConnRecord) {
        self.stats.stale = self.stats.stale.saturating_add(1);
        if let Some(m) = &self.metrics {
            m.record_stale(record.protocol);
        }

        let verdict = evaluate(record);
        if !verdict.allows_delete() {
            debug!(%record, reason = verdict.reason(), "stale flow exempt from deletion");
            self.stats.suppressed = self.stats.suppressed.saturating_add(1);
            if let Some(m) = &self.metrics {
                m.record_suppressed(verdict.reason());
            }
            return;
        }

        let key = ConnKey::from(record);
        match self.executor.delete(&key).await {
            Ok(()) => {
                info!(
                    protocol = %key.protocol,
                    src = %key.src,
                    sport = key.sport,
                    dst = %key.dst,
                    dport = key.dport,
                    "stale conntrack entry deleted"
                );
                self.stats.deleted = self.stats.deleted.saturating_add(1);
                if let Some(m) = &self.metrics {
                    m.record_deletion(key.protocol, values::DELETE_OK);
                }
            }
            Err(e) => {
                warn!(%key, error = %e, "failed to delete stale conntrack entry");
                self.stats.deletion_failures = self.stats.deletion_failures.saturating_add(1);
                if let Some(m) = &self.metrics {
                    m.record_deletion(key.protocol, values::DELETE_FAILED);
                }
            }
        }
    }

    pub fn tracker(&self) -> &StalenessTracker {
        &self.tracker
    }

    pub fn generations(&self) -> &GenerationComparator {
        &self.generations
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn stats(&self) -> CleanerStats {
        self.stats
    }
}
