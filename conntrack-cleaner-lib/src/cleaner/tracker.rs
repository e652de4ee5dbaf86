//! Per-flow staleness accounting.
//!
//! Every unanswered flow seen in a table dump is keyed by its 5-tuple. When
//! the kernel keeps re-reporting a flow with an expiry that did not go down,
//! nothing is answering it: each such observation bumps the flow's counter,
//! and once the counter exceeds the renewal threshold the flow is reported as
//! stale and forgotten.

use std::time::{Duration, Instant};

use ahash::AHashMap;

use crate::conntrack::{ConnKey, ConnRecord};

/// State kept for one flow between observations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedEntry {
    /// Record the counter is compared against
    pub latest: ConnRecord,
    /// Consecutive observations with a non-decreasing expiry
    pub stale_count: u32,
    pub first_seen: Instant,
}

impl TrackedEntry {
    fn new(record: ConnRecord, now: Instant) -> Self {
        Self { latest: record, stale_count: 0, first_seen: now }
    }

    /// Time since the flow was first observed, zero if `now` is earlier.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.first_seen)
    }
}

pub type TrackingMap = AHashMap<ConnKey, TrackedEntry>;

/// Outcome of feeding one record into the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// First sighting, tracking started
    New,
    /// Expiry did not decrease; counter bumped but still within the threshold
    Renewed { stale_count: u32 },
    /// Expiry went down; the flow is making progress, counter untouched
    Progressing { stale_count: u32 },
    /// Threshold exceeded; the entry has already been removed from the tracker
    Stale(ConnRecord),
}

impl Observation {
    pub fn is_stale(&self) -> bool {
        matches!(self, Observation::Stale(_))
    }
}

#[derive(Debug, Clone)]
pub struct StalenessTracker {
    entries: TrackingMap,
    renewal_threshold: u32,
}

impl StalenessTracker {
    pub fn new(renewal_threshold: u32) -> Self {
        Self { entries: TrackingMap::default(), renewal_threshold }
    }

    pub fn renewal_threshold(&self) -> u32 {
        self.renewal_threshold
    }

    pub fn observe(&mut self, record: ConnRecord) -> Observation {
        self.observe_at(record, Instant::now())
    }

    /// Feed one record observed at `now`.
    ///
    /// A stale entry is removed here, before the caller decides whether the
    /// kernel entry should actually be deleted, so flows that are never
    /// deleted (DNS, loopback) cannot grow their counter forever.
    pub fn observe_at(&mut self, record: ConnRecord, now: Instant) -> Observation {
        let key = ConnKey::from(&record);

        let Some(entry) = self.entries.get_mut(&key) else {
            self.entries.insert(key, TrackedEntry::new(record, now));
            return Observation::New;
        };

        if record.expiry < entry.latest.expiry {
            entry.latest = record;
            return Observation::Progressing { stale_count: entry.stale_count };
        }

        entry.stale_count = entry.stale_count.saturating_add(1);
        let stale_count = entry.stale_count;
        if stale_count > self.renewal_threshold {
            self.entries.remove(&key);
            return Observation::Stale(record);
        }

        Observation::Renewed { stale_count }
    }

    pub fn get(&self, key: &ConnKey) -> Option<&TrackedEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &ConnKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Drop a flow without reporting it.
    pub fn evict(&mut self, key: &ConnKey) -> Option<TrackedEntry> {
        self.entries.remove(key)
    }

    pub fn entries(&self) -> &TrackingMap {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
