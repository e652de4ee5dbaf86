//! Micro benchmarks for the cleaner hot path: decoding a table dump and
//! feeding it through the staleness tracker and generation rotation.
//! Pure CPU - no conntrack binary, no IO.
//!
//! ```bash
//! cargo bench --bench bench_tracker
//! ```

use std::time::Duration;

use conntrack_cleaner_lib::cleaner::{GenerationComparator, StalenessTracker};
use conntrack_cleaner_lib::conntrack::{parse_line, parse_table, ConnRecord};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const TABLE_SIZES: [usize; 3] = [100, 1_000, 10_000];

// ---------------------------------------------------------------------------
// Synthetic table dump shaped like `conntrack -L` output filtered to
// unanswered entries. Every flow gets a distinct source port.
// ---------------------------------------------------------------------------
fn table(flows: usize) -> String {
    (0..flows)
        .map(|i| {
            let sport = 10_000 + (i % 50_000);
            let host = i / 50_000 + 1;
            format!(
                "udp      17 29 src=10.0.{host}.1 dst=10.1.0.2 sport={sport} dport=6000 [UNREPLIED] src=10.1.0.2 dst=10.0.{host}.1 sport=6000 dport={sport} mark=0 use=1"
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn records(flows: usize) -> Vec<ConnRecord> {
    parse_table(&table(flows))
        .filter_map(|(_, result)| result.ok())
        .collect()
}

fn bench_parse_line(c: &mut Criterion) {
    let dump = table(1);
    if let Err(e) = parse_line(&dump) {
        panic!("benchmark fixture does not decode: {e}");
    }

    c.bench_function("parse_conntrack_line", |b| {
        b.iter(|| parse_line(std::hint::black_box(&dump)));
    });
}

fn bench_observe_dump(c: &mut Criterion) {
    let mut group = c.benchmark_group("observe_dump");
    for size in TABLE_SIZES {
        let dump = records(size);
        assert_eq!(dump.len(), size, "benchmark fixture lost records");

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &dump, |b, dump| {
            b.iter(|| {
                let mut tracker = StalenessTracker::new(u32::MAX);
                for record in dump {
                    tracker.observe(record.clone());
                }
                tracker.len()
            });
        });
    }
    group.finish();
}

fn bench_rotate(c: &mut Criterion) {
    let mut group = c.benchmark_group("rotate_generation");
    for size in TABLE_SIZES {
        let dump = records(size);

        let mut tracker = StalenessTracker::new(u32::MAX);
        for record in &dump {
            tracker.observe(record.clone());
        }
        let mut generations = GenerationComparator::new(Duration::from_secs(3600));
        generations.rotate(&mut tracker);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter(|| generations.rotate(&mut tracker));
        });
    }
    group.finish();
}

criterion_group!(tracker_benches, bench_parse_line, bench_observe_dump, bench_rotate);
criterion_main!(tracker_benches);
