//! Benchmarks for the hot paths: stage matching (quadratic in stage
//! count) and timeline merging/comparison (linear in sample count).

#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

use std::hint::black_box;

use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use spark_compare::matching::match_stages;
use spark_compare::options::CompareOptions;
use spark_compare::report::compare_snapshots;
use spark_compare::snapshot::{
    ApplicationSnapshot, StageRecord, TimelineEvent, TimelineSample,
};
use spark_compare::timeline::{compare_timelines, merge_samples};

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).single().unwrap()
}

fn stages(count: usize) -> Vec<StageRecord> {
    (0..count)
        .map(|i| {
            let mut stage =
                StageRecord::named(i as i64, format!("stage {i} at Pipeline.scala:{i}"));
            stage.submission_time = Some(base_time() + Duration::seconds(i as i64 * 30));
            stage.completion_time =
                Some(base_time() + Duration::seconds(i as i64 * 30 + 45 + (i as i64 % 7) * 10));
            stage.metrics.num_tasks = 100 + (i as u64 % 13) * 50;
            stage.metrics.shuffle_write_bytes = (i as u64 % 5) * 1_000_000;
            stage
        })
        .collect()
}

fn samples(count: usize) -> Vec<TimelineSample> {
    (0..count)
        .map(|i| {
            // Step pattern: plateaus of varying executor counts.
            let executors = 2 + (i / 17 % 6) as u32;
            TimelineSample {
                timestamp: base_time() + Duration::seconds(i as i64 * 15),
                active_executors: executors,
                total_cores: executors * 4,
                total_memory_mb: f64::from(executors) * 4096.0,
                event: TimelineEvent::ExecutorAdded,
            }
        })
        .collect()
}

fn bench_stage_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("stage_matching");
    for size in [10usize, 50, 200] {
        let a = stages(size);
        let b = stages(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |bencher, _| {
            bencher.iter(|| match_stages(black_box(&a), black_box(&b), 0.6));
        });
    }
    group.finish();
}

fn bench_timeline_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("timeline_merge");
    for size in [100usize, 1_000, 10_000] {
        let timeline = samples(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |bencher, _| {
            bencher.iter(|| merge_samples(black_box(&timeline)));
        });
    }
    group.finish();
}

fn bench_timeline_compare(c: &mut Criterion) {
    let a = samples(5_000);
    let b = samples(5_000);
    c.bench_function("timeline_compare_5k", |bencher| {
        bencher.iter(|| compare_timelines(black_box(&a), black_box(&b), 1));
    });
}

fn bench_full_comparison(c: &mut Criterion) {
    let run_a = ApplicationSnapshot::builder("app-001", "nightly etl")
        .stages(stages(100))
        .timeline(samples(1_000))
        .build()
        .unwrap();
    let run_b = ApplicationSnapshot::builder("app-002", "nightly etl")
        .stages(stages(100))
        .timeline(samples(1_000))
        .build()
        .unwrap();
    let options = CompareOptions::default();
    c.bench_function("compare_snapshots_100_stages", |bencher| {
        bencher.iter(|| compare_snapshots(black_box(&run_a), black_box(&run_b), &options));
    });
}

criterion_group!(
    benches,
    bench_stage_matching,
    bench_timeline_merge,
    bench_timeline_compare,
    bench_full_comparison
);
criterion_main!(benches);
