mod consumer;
mod daemon;
mod gate;
mod generation;
mod pipeline;
mod tracker;

pub use consumer::{Cleaner, CleanerStats};
pub use daemon::{run, spawn_signal_listener};
pub use gate::{evaluate, should_delete, GateVerdict, DNS_PORT};
pub use generation::{GenerationComparator, RotationSummary};
pub use pipeline::{channel, DumpEvent, PipelineClosed, Producer, RoundStats, PIPELINE_CAPACITY};
pub use tracker::{Observation, StalenessTracker, TrackedEntry, TrackingMap};
