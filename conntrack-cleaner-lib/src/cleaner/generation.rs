use std::time::{Duration, Instant};

use crate::conntrack::ConnKey;

use super::tracker::{StalenessTracker, TrackingMap};

/// What a rotation changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationSummary {
    /// First rotation: baseline taken, nothing evicted
    pub first: bool,
    /// Flows gone from the tracker since the previous generation
    pub disappeared: usize,
    /// Flows forgotten for exceeding the purge threshold
    pub purged: usize,
    /// Flows tracked once the rotation finished
    pub tracked: usize,
}

/// Compares successive generations of the tracker and forgets flows that
/// outlived the purge threshold.
///
/// Purging only drops local state. It does not delete kernel entries.
#[derive(Debug, Clone)]
pub struct GenerationComparator {
    purge_threshold: Duration,
    previous: Option<TrackingMap>,
}

impl GenerationComparator {
    pub fn new(purge_threshold: Duration) -> Self {
        Self { purge_threshold, previous: None }
    }

    pub fn purge_threshold(&self) -> Duration {
        self.purge_threshold
    }

    /// Snapshot taken at the end of the last rotation, if any.
    pub fn previous(&self) -> Option<&TrackingMap> {
        self.previous.as_ref()
    }

    pub fn rotate(&mut self, tracker: &mut StalenessTracker) -> RotationSummary {
        self.rotate_at(tracker, Instant::now())
    }

    /// Close the current generation at `now`.
    ///
    /// Must run once per table dump, after every record of that dump has been
    /// observed.
    pub fn rotate_at(&mut self, tracker: &mut StalenessTracker, now: Instant) -> RotationSummary {
        let Some(mut previous) = self.previous.take() else {
            self.previous = Some(tracker.entries().clone());
            return RotationSummary { first: true, tracked: tracker.len(), ..Default::default() };
        };

        let before = previous.len();
        previous.retain(|key, _| tracker.contains(key));
        let disappeared = before.saturating_sub(previous.len());

        let expired: Vec<ConnKey> = previous
            .iter()
            .filter(|(_, entry)| entry.age(now) > self.purge_threshold)
            .map(|(key, _)| *key)
            .collect();
        for key in &expired {
            tracker.evict(key);
            previous.remove(key);
        }

        self.previous = Some(tracker.entries().clone());

        RotationSummary { first: false, disappeared, purged: expired.len(), tracked: tracker.len() }
    }
}
