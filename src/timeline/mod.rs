//! Executor-timeline merging and cross-run timeline comparison.
//!
//! Raw timelines are event-granular: one sample per executor add/remove or
//! stage boundary. Reading them side by side is hopeless, so two reductions
//! happen here:
//!
//! 1. [`merge_samples`] folds consecutive samples that share an
//!    active-executor count into [`MergedInterval`]s. The merged sequence is
//!    contiguous, non-overlapping, covers the whole span, and its
//!    `duration_intervals` sum equals the original sample count.
//! 2. [`compare_timelines`] aligns the two runs by *elapsed* time (runs
//!    start at different wall-clock instants), samples both at a fixed
//!    granularity over the overlapping window, and merges consecutive rows
//!    whose executor-count difference is equal.
//!
//! Differences are signed as run B minus run A throughout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::snapshot::TimelineSample;

/// A maximal run of consecutive samples sharing one executor count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergedInterval {
    /// Interval start (first sample of the run).
    pub start: DateTime<Utc>,
    /// Interval end (start of the next interval, or the last sample).
    pub end: DateTime<Utc>,
    /// Active executor count throughout the interval.
    pub executor_count: u32,
    /// How many raw samples this interval absorbed.
    pub duration_intervals: usize,
}

/// Fold consecutive samples with equal executor counts into intervals.
///
/// Each interval ends where the next begins, so the union of intervals
/// covers the original sample span exactly. An empty input yields an empty
/// output.
#[must_use]
pub fn merge_samples(samples: &[TimelineSample]) -> Vec<MergedInterval> {
    let mut intervals: Vec<MergedInterval> = Vec::new();
    for sample in samples {
        match intervals.last_mut() {
            Some(current) if current.executor_count == sample.active_executors => {
                current.duration_intervals += 1;
            }
            _ => {
                // Close the previous interval at this sample's timestamp.
                if let Some(previous) = intervals.last_mut() {
                    previous.end = sample.timestamp;
                }
                intervals.push(MergedInterval {
                    start: sample.timestamp,
                    end: sample.timestamp,
                    executor_count: sample.active_executors,
                    duration_intervals: 1,
                });
            }
        }
    }
    if let (Some(last_interval), Some(last_sample)) = (intervals.last_mut(), samples.last()) {
        last_interval.end = last_sample.timestamp;
    }
    intervals
}

/// One comparison row: a maximal stretch of elapsed time over which the
/// executor-count difference between the runs is constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineRow {
    /// Stretch start, seconds since each run's own start.
    pub start_offset_seconds: u64,
    /// Stretch end, seconds since each run's own start.
    pub end_offset_seconds: u64,
    /// Run A's executor count at the start of the stretch.
    pub executor_count_a: u32,
    /// Run B's executor count at the start of the stretch.
    pub executor_count_b: u32,
    /// Signed difference, run B minus run A. Constant over the stretch.
    pub executor_count_diff: i64,
    /// How many fixed-granularity rows this stretch absorbed.
    pub intervals: usize,
}

/// Cross-run timeline comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineComparison {
    /// Merged comparison rows over the overlapping window.
    pub rows: Vec<TimelineRow>,
    /// Row count before merging equal-diff neighbors.
    pub original_intervals: usize,
    /// Row count after merging.
    pub merged_intervals: usize,
    /// Mean absolute executor-count difference across original rows.
    pub average_abs_diff: f64,
    /// Largest absolute executor-count difference.
    pub max_abs_diff: u64,
    /// Run B's timeline span minus run A's, in seconds. Nonzero when one
    /// run kept running past the overlapping window.
    pub duration_difference_seconds: f64,
    /// Set when the timelines cannot be compared at all.
    pub error: Option<String>,
    /// Recovery advice accompanying `error`.
    pub suggestion: Option<String>,
}

impl TimelineComparison {
    fn empty(error: String, suggestion: String, duration_difference_seconds: f64) -> Self {
        Self {
            rows: Vec::new(),
            original_intervals: 0,
            merged_intervals: 0,
            average_abs_diff: 0.0,
            max_abs_diff: 0,
            duration_difference_seconds,
            error: Some(error),
            suggestion: Some(suggestion),
        }
    }
}

/// Compare two runs' executor timelines at a fixed granularity.
///
/// Both timelines are re-sampled at `interval_minutes` over the elapsed-time
/// window both runs cover; consecutive rows with the same signed difference
/// merge into one [`TimelineRow`]. A run with no timeline data produces a
/// structured `error`/`suggestion` pair, never a failure, so the rest of a
/// report stays usable.
#[must_use]
pub fn compare_timelines(
    samples_a: &[TimelineSample],
    samples_b: &[TimelineSample],
    interval_minutes: u32,
) -> TimelineComparison {
    let span_a = span_seconds(samples_a);
    let span_b = span_seconds(samples_b);
    let duration_difference_seconds = span_b - span_a;

    if samples_a.is_empty() || samples_b.is_empty() {
        let missing = if samples_a.is_empty() { "A" } else { "B" };
        return TimelineComparison::empty(
            format!("Run {missing} has no timeline samples; the executor timelines do not overlap."),
            "Re-collect the run with event-log timeline data enabled, or compare runs that both \
             report executor events."
                .to_string(),
            duration_difference_seconds,
        );
    }

    // Zero granularity cannot make progress; options validation rejects it
    // upstream, but this function is callable on its own.
    let interval_seconds = u64::from(interval_minutes.max(1)) * 60;
    let overlap_seconds = span_a.min(span_b).max(0.0) as u64;

    // One row per granularity step across the overlapping window, both
    // endpoints included.
    let mut offsets = Vec::new();
    let mut offset = 0;
    loop {
        offsets.push(offset);
        if offset >= overlap_seconds {
            break;
        }
        offset = (offset + interval_seconds).min(overlap_seconds);
    }

    let original_intervals = offsets.len();
    let mut rows: Vec<TimelineRow> = Vec::new();
    let mut abs_diff_total = 0u64;
    let mut max_abs_diff = 0u64;
    for &offset in &offsets {
        let count_a = count_at_offset(samples_a, offset);
        let count_b = count_at_offset(samples_b, offset);
        let diff = i64::from(count_b) - i64::from(count_a);
        abs_diff_total += diff.unsigned_abs();
        max_abs_diff = max_abs_diff.max(diff.unsigned_abs());

        match rows.last_mut() {
            Some(current) if current.executor_count_diff == diff => {
                current.end_offset_seconds = offset;
                current.intervals += 1;
            }
            _ => {
                if let Some(previous) = rows.last_mut() {
                    previous.end_offset_seconds = offset;
                }
                rows.push(TimelineRow {
                    start_offset_seconds: offset,
                    end_offset_seconds: offset,
                    executor_count_a: count_a,
                    executor_count_b: count_b,
                    executor_count_diff: diff,
                    intervals: 1,
                });
            }
        }
    }

    let merged_intervals = rows.len();
    let average_abs_diff = if original_intervals == 0 {
        0.0
    } else {
        abs_diff_total as f64 / original_intervals as f64
    };

    debug!(
        original = original_intervals,
        merged = merged_intervals,
        max_abs_diff,
        "timeline comparison complete"
    );

    TimelineComparison {
        rows,
        original_intervals,
        merged_intervals,
        average_abs_diff,
        max_abs_diff,
        duration_difference_seconds,
        error: None,
        suggestion: None,
    }
}

/// Time-weighted average active-executor count over a run's timeline.
/// 0.0 for empty timelines; the instantaneous count for single-sample ones.
#[must_use]
pub fn average_executor_count(samples: &[TimelineSample]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let span = span_seconds(samples);
    if span <= 0.0 {
        return f64::from(samples[0].active_executors);
    }
    let mut weighted = 0.0;
    for pair in samples.windows(2) {
        let width = (pair[1].timestamp - pair[0].timestamp).num_milliseconds() as f64 / 1000.0;
        weighted += f64::from(pair[0].active_executors) * width;
    }
    weighted / span
}

/// Peak active-executor count over a run's timeline.
#[must_use]
pub fn peak_executor_count(samples: &[TimelineSample]) -> u32 {
    samples.iter().map(|s| s.active_executors).max().unwrap_or(0)
}

fn span_seconds(samples: &[TimelineSample]) -> f64 {
    match (samples.first(), samples.last()) {
        (Some(first), Some(last)) => {
            (last.timestamp - first.timestamp).num_milliseconds() as f64 / 1000.0
        }
        _ => 0.0,
    }
}

/// Executor count in force `offset` seconds after the run's first sample:
/// the last sample at or before that instant.
fn count_at_offset(samples: &[TimelineSample], offset: u64) -> u32 {
    let Some(first) = samples.first() else {
        return 0;
    };
    let mut count = first.active_executors;
    for sample in samples {
        let elapsed = (sample.timestamp - first.timestamp).num_seconds();
        if elapsed >= 0 && elapsed as u64 <= offset {
            count = sample.active_executors;
        } else {
            break;
        }
    }
    count
}
