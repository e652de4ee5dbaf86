use std::net::IpAddr;
use std::time::{Duration, Instant};

use conntrack_cleaner_lib::cleaner::{GenerationComparator, RotationSummary, StalenessTracker};
use conntrack_cleaner_lib::conntrack::{ConnKey, ConnRecord, Protocol};

const PURGE: Duration = Duration::from_secs(60);

fn flow(sport: u16) -> ConnRecord {
    let src: IpAddr = [10, 0, 0, 1].into();
    let dst: IpAddr = [10, 0, 0, 2].into();
    ConnRecord::new(Protocol::Udp, 30, src, sport, dst, 6000)
}

#[test]
fn test_first_rotation_only_takes_baseline() {
    let mut tracker = StalenessTracker::new(5);
    let mut generations = GenerationComparator::new(PURGE);
    let start = Instant::now();

    tracker.observe_at(flow(1), start);
    tracker.observe_at(flow(2), start);

    // Far past the purge threshold, but nothing to compare against yet.
    let summary = generations.rotate_at(&mut tracker, start + PURGE * 10);
    assert_eq!(summary, RotationSummary { first: true, tracked: 2, ..Default::default() });
    assert_eq!(tracker.len(), 2);
    assert_eq!(generations.previous().map(|p| p.len()), Some(2));
}

#[test]
fn test_old_flow_purged_even_with_zero_counter() {
    let mut tracker = StalenessTracker::new(5);
    let mut generations = GenerationComparator::new(PURGE);
    let start = Instant::now();

    tracker.observe_at(flow(1), start);
    generations.rotate_at(&mut tracker, start);

    let summary = generations.rotate_at(&mut tracker, start + PURGE + Duration::from_secs(1));
    assert_eq!(summary.purged, 1);
    assert_eq!(summary.tracked, 0);
    assert!(!tracker.contains(&ConnKey::from(&flow(1))));
}

#[test]
fn test_flow_at_threshold_is_kept() {
    let mut tracker = StalenessTracker::new(5);
    let mut generations = GenerationComparator::new(PURGE);
    let start = Instant::now();

    tracker.observe_at(flow(1), start);
    generations.rotate_at(&mut tracker, start);

    let summary = generations.rotate_at(&mut tracker, start + PURGE);
    assert_eq!(summary.purged, 0);
    assert_eq!(tracker.len(), 1);
}

#[test]
fn test_disappeared_flow_dropped_from_snapshot() {
    let mut tracker = StalenessTracker::new(0);
    let mut generations = GenerationComparator::new(PURGE);
    let start = Instant::now();

    tracker.observe_at(flow(1), start);
    tracker.observe_at(flow(2), start);
    generations.rotate_at(&mut tracker, start);

    // flow 1 goes stale and leaves the tracker during the next dump
    assert!(tracker.observe_at(flow(1), start).is_stale());

    let summary = generations.rotate_at(&mut tracker, start + Duration::from_secs(1));
    assert_eq!(summary.disappeared, 1);
    assert_eq!(summary.purged, 0);

    let previous = generations.previous().map(|p| p.len());
    assert_eq!(previous, Some(1));
}

#[test]
fn test_new_flows_join_the_next_snapshot() {
    let mut tracker = StalenessTracker::new(5);
    let mut generations = GenerationComparator::new(PURGE);
    let start = Instant::now();

    generations.rotate_at(&mut tracker, start);
    tracker.observe_at(flow(7), start + Duration::from_secs(1));

    let summary = generations.rotate_at(&mut tracker, start + Duration::from_secs(2));
    assert!(!summary.first);
    assert_eq!(summary.tracked, 1);
    assert!(generations
        .previous()
        .is_some_and(|p| p.contains_key(&ConnKey::from(&flow(7)))));
}

#[test]
fn test_young_flows_survive_many_rotations() {
    let mut tracker = StalenessTracker::new(u32::MAX);
    let mut generations = GenerationComparator::new(PURGE);
    let start = Instant::now();

    tracker.observe_at(flow(1), start);
    for secs in 0..30 {
        let now = start + Duration::from_secs(secs);
        tracker.observe_at(flow(1), now);
        generations.rotate_at(&mut tracker, now);
    }
    assert_eq!(tracker.len(), 1);
}
