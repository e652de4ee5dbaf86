use opentelemetry::global;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;
use std::sync::Arc;

use crate::cleaner::RotationSummary;
use crate::conntrack::Protocol;

pub mod labels {
    pub const PROTOCOL: &str = "protocol";
    pub const RESULT: &str = "result";
    pub const REASON: &str = "reason";
    pub const VERSION: &str = "version";
    pub const RUST_VERSION: &str = "rust_version";
}

pub mod values {
    pub const SAMPLE_OK: &str = "ok";
    pub const SAMPLE_EMPTY: &str = "empty";
    pub const SAMPLE_FAILED: &str = "failed";
    pub const DELETE_OK: &str = "deleted";
    pub const DELETE_FAILED: &str = "failed";
}

#[derive(Clone)]
pub struct Metrics {
    // Sampling
    pub samples_total: Counter<u64>,
    pub sample_duration_seconds: Histogram<f64>,
    pub decode_failures_total: Counter<u64>,
    pub records_filtered_total: Counter<u64>,

    // Tracking
    pub records_observed_total: Counter<u64>,
    pub stale_entries_total: Counter<u64>,
    pub tracked_entries: Gauge<u64>,

    // Deletion
    pub deletions_total: Counter<u64>,
    pub deletions_suppressed_total: Counter<u64>,

    // Generations
    pub rotations_total: Counter<u64>,
    pub entries_purged_total: Counter<u64>,
    pub entries_disappeared_total: Counter<u64>,

    pub build_info: Gauge<u64>,
}

impl Metrics {
    fn new(meter: Meter) -> Self {
        Self {
            samples_total: meter
                .u64_counter("conntrack_cleaner_samples_total")
                .with_description("Total number of conntrack table samples, by result")
                .build(),
            sample_duration_seconds: meter
                .f64_histogram("conntrack_cleaner_sample_duration_seconds")
                .with_description("Time spent running the conntrack table query")
                .build(),
            decode_failures_total: meter
                .u64_counter("conntrack_cleaner_decode_failures_total")
                .with_description("Total number of conntrack lines that could not be decoded")
                .build(),
            records_filtered_total: meter
                .u64_counter("conntrack_cleaner_records_filtered_total")
                .with_description("Records dropped because tracking is disabled for their protocol")
                .build(),

            records_observed_total: meter
                .u64_counter("conntrack_cleaner_records_observed_total")
                .with_description("Records fed into the staleness tracker")
                .build(),
            stale_entries_total: meter
                .u64_counter("conntrack_cleaner_stale_entries_total")
                .with_description("Flows that exceeded the renewal threshold")
                .build(),
            tracked_entries: meter
                .u64_gauge("conntrack_cleaner_tracked_entries")
                .with_description("Flows currently tracked")
                .build(),

            deletions_total: meter
                .u64_counter("conntrack_cleaner_deletions_total")
                .with_description("Conntrack deletions attempted, by result")
                .build(),
            deletions_suppressed_total: meter
                .u64_counter("conntrack_cleaner_deletions_suppressed_total")
                .with_description("Stale flows not deleted because of an exemption")
                .build(),

            rotations_total: meter
                .u64_counter("conntrack_cleaner_rotations_total")
                .with_description("Completed generation rotations")
                .build(),
            entries_purged_total: meter
                .u64_counter("conntrack_cleaner_entries_purged_total")
                .with_description("Flows forgotten for exceeding the purge threshold")
                .build(),
            entries_disappeared_total: meter
                .u64_counter("conntrack_cleaner_entries_disappeared_total")
                .with_description("Flows that left the tracker between two generations")
                .build(),

            build_info: meter
                .u64_gauge("conntrack_cleaner_build_info")
                .with_description("Build information (version, rust version)")
                .build(),
        }
    }

    /// Set build info metric with version labels
    pub fn set_build_info(&self) {
        let version = env!("CARGO_PKG_VERSION");
        let rust_version = env!("CARGO_PKG_RUST_VERSION");

        self.build_info.record(
            1,
            &[
                KeyValue::new(labels::VERSION, version),
                KeyValue::new(labels::RUST_VERSION, rust_version),
            ],
        );
    }

    /// `result` is one of [`values::SAMPLE_OK`], [`values::SAMPLE_EMPTY`], [`values::SAMPLE_FAILED`].
    pub fn record_sample(&self, result: &'static str, duration_secs: f64) {
        self.samples_total
            .add(1, &[KeyValue::new(labels::RESULT, result)]);
        self.sample_duration_seconds.record(duration_secs, &[]);
    }

    pub fn record_decode_failure(&self, reason: &'static str) {
        self.decode_failures_total
            .add(1, &[KeyValue::new(labels::REASON, reason)]);
    }

    pub fn record_filtered(&self, protocol: Protocol) {
        self.records_filtered_total
            .add(1, &[KeyValue::new(labels::PROTOCOL, protocol.as_str())]);
    }

    pub fn record_observed(&self, protocol: Protocol) {
        self.records_observed_total
            .add(1, &[KeyValue::new(labels::PROTOCOL, protocol.as_str())]);
    }

    pub fn record_stale(&self, protocol: Protocol) {
        self.stale_entries_total
            .add(1, &[KeyValue::new(labels::PROTOCOL, protocol.as_str())]);
    }

    pub fn record_deletion(&self, protocol: Protocol, result: &'static str) {
        self.deletions_total.add(
            1,
            &[
                KeyValue::new(labels::PROTOCOL, protocol.as_str()),
                KeyValue::new(labels::RESULT, result),
            ],
        );
    }

    pub fn record_suppressed(&self, reason: &'static str) {
        self.deletions_suppressed_total
            .add(1, &[KeyValue::new(labels::REASON, reason)]);
    }

    pub fn record_rotation(&self, summary: &RotationSummary) {
        self.rotations_total.add(1, &[]);
        self.entries_purged_total.add(summary.purged as u64, &[]);
        self.entries_disappeared_total
            .add(summary.disappeared as u64, &[]);
        self.tracked_entries.record(summary.tracked as u64, &[]);
    }
}

pub fn init_metrics() -> Result<(Arc<Metrics>, Registry), Box<dyn std::error::Error + Send + Sync>>
{
    let registry = Registry::default();

    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()?;

    let meter_provider = SdkMeterProvider::builder().with_reader(exporter).build();

    global::set_meter_provider(meter_provider);

    let meter = global::meter("conntrack-cleaner");
    let metrics = Arc::new(Metrics::new(meter));

    metrics.set_build_info();

    Ok((metrics, registry))
}
