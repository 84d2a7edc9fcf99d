//! Per-run metric rollups.
//!
//! Each run's entity lists collapse into one [`RunAggregates`] record of
//! totals, averages, and peaks. The recommendation rules and the report
//! composer both read from these rollups, so every derived number is
//! computed exactly once.
//!
//! Derived ratios use [`safe_ratio`]: division by zero yields 0.0, the
//! engine-wide "undefined" sentinel, rather than an error or a NaN.

use serde::{Deserialize, Serialize};

use crate::snapshot::{
    ApplicationSnapshot, ExecutorRecord, JobRecord, JobStatus, StageRecord, StageStatus,
};
use crate::timeline::{average_executor_count, peak_executor_count};

/// `numerator / denominator`, or 0.0 when the denominator is zero or the
/// result would not be finite. 0.0 means "undefined" throughout the engine.
#[must_use]
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let ratio = numerator / denominator;
    if ratio.is_finite() { ratio } else { 0.0 }
}

/// Totals and averages over one run's stages.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StageTotals {
    /// Stage count.
    pub stage_count: usize,
    /// Stages with `COMPLETE` status.
    pub completed_stages: usize,
    /// Stages with `FAILED` status.
    pub failed_stages: usize,
    /// Total tasks across all stages.
    pub total_tasks: u64,
    /// Total failed tasks.
    pub failed_tasks: u64,
    /// Total executor run time, milliseconds.
    pub executor_run_time_ms: u64,
    /// Total JVM GC time, milliseconds.
    pub jvm_gc_time_ms: u64,
    /// Total input, bytes.
    pub input_bytes: u64,
    /// Total input records.
    pub input_records: u64,
    /// Total output, bytes.
    pub output_bytes: u64,
    /// Total output records.
    pub output_records: u64,
    /// Total shuffle read, bytes.
    pub shuffle_read_bytes: u64,
    /// Total shuffle write, bytes.
    pub shuffle_write_bytes: u64,
    /// Total bytes spilled to memory.
    pub memory_spilled_bytes: u64,
    /// Total bytes spilled to disk.
    pub disk_spilled_bytes: u64,
    /// Sum of per-stage wall durations, seconds (stages with both
    /// timestamps only).
    pub total_duration_seconds: f64,
    /// Mean stage duration, seconds. 0.0 when no stage has a duration.
    pub average_duration_seconds: f64,
    /// Mean tasks per stage. 0.0 for stageless runs.
    pub average_tasks_per_stage: f64,
}

impl StageTotals {
    /// Roll up a run's stage list.
    #[must_use]
    pub fn from_stages(stages: &[StageRecord]) -> Self {
        let mut totals = Self {
            stage_count: stages.len(),
            ..Self::default()
        };
        let mut timed_stages = 0usize;
        for stage in stages {
            match stage.status {
                StageStatus::Complete => totals.completed_stages += 1,
                StageStatus::Failed => totals.failed_stages += 1,
                _ => {}
            }
            let m = &stage.metrics;
            totals.total_tasks += m.num_tasks;
            totals.failed_tasks += m.num_failed_tasks;
            totals.executor_run_time_ms += m.executor_run_time_ms;
            totals.jvm_gc_time_ms += m.jvm_gc_time_ms;
            totals.input_bytes += m.input_bytes;
            totals.input_records += m.input_records;
            totals.output_bytes += m.output_bytes;
            totals.output_records += m.output_records;
            totals.shuffle_read_bytes += m.shuffle_read_bytes;
            totals.shuffle_write_bytes += m.shuffle_write_bytes;
            totals.memory_spilled_bytes += m.memory_spilled_bytes;
            totals.disk_spilled_bytes += m.disk_spilled_bytes;
            if let Some(duration) = stage.duration_seconds() {
                totals.total_duration_seconds += duration;
                timed_stages += 1;
            }
        }
        totals.average_duration_seconds =
            safe_ratio(totals.total_duration_seconds, timed_stages as f64);
        totals.average_tasks_per_stage =
            safe_ratio(totals.total_tasks as f64, stages.len() as f64);
        totals
    }
}

/// Counts and durations over one run's jobs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JobStats {
    /// Job count.
    pub job_count: usize,
    /// Jobs that succeeded.
    pub succeeded_jobs: usize,
    /// Jobs that failed.
    pub failed_jobs: usize,
    /// Jobs still running.
    pub running_jobs: usize,
    /// Sum of job wall durations, seconds.
    pub total_duration_seconds: f64,
    /// Mean job duration, seconds. 0.0 when no job has a duration.
    pub average_duration_seconds: f64,
}

impl JobStats {
    /// Roll up a run's job list.
    #[must_use]
    pub fn from_jobs(jobs: &[JobRecord]) -> Self {
        let mut stats = Self {
            job_count: jobs.len(),
            ..Self::default()
        };
        let mut timed_jobs = 0usize;
        for job in jobs {
            match job.status {
                JobStatus::Succeeded => stats.succeeded_jobs += 1,
                JobStatus::Failed => stats.failed_jobs += 1,
                JobStatus::Running => stats.running_jobs += 1,
                JobStatus::Unknown => {}
            }
            if let Some(duration) = job.duration_seconds() {
                stats.total_duration_seconds += duration;
                timed_jobs += 1;
            }
        }
        stats.average_duration_seconds =
            safe_ratio(stats.total_duration_seconds, timed_jobs as f64);
        stats
    }
}

/// Totals over one run's executors.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ExecutorTotals {
    /// Executor count, active and removed.
    pub executor_count: usize,
    /// Executors still active at the end of the run.
    pub active_executors: usize,
    /// Total cores granted.
    pub total_cores: u64,
    /// Total maximum memory, MB.
    pub total_max_memory_mb: f64,
    /// Total completed tasks.
    pub completed_tasks: u64,
    /// Total failed tasks.
    pub failed_tasks: u64,
    /// Total task duration, milliseconds.
    pub total_duration_ms: u64,
    /// Total GC time, milliseconds.
    pub total_gc_time_ms: u64,
    /// Total input, bytes.
    pub input_bytes: u64,
    /// Total shuffle read, bytes.
    pub shuffle_read_bytes: u64,
    /// Total shuffle write, bytes.
    pub shuffle_write_bytes: u64,
    /// Total storage memory in use, bytes.
    pub memory_used_bytes: u64,
    /// Total disk in use, bytes.
    pub disk_used_bytes: u64,
    /// Mean completed tasks per executor. 0.0 for executorless runs.
    pub average_tasks_per_executor: f64,
    /// Mean memory per executor, MB.
    pub average_memory_per_executor_mb: f64,
}

impl ExecutorTotals {
    /// Roll up a run's executor list.
    #[must_use]
    pub fn from_executors(executors: &[ExecutorRecord]) -> Self {
        let mut totals = Self {
            executor_count: executors.len(),
            ..Self::default()
        };
        for executor in executors {
            if executor.is_active {
                totals.active_executors += 1;
            }
            totals.total_cores += u64::from(executor.total_cores);
            totals.total_max_memory_mb += executor.max_memory_mb;
            totals.completed_tasks += executor.completed_tasks;
            totals.failed_tasks += executor.failed_tasks;
            totals.total_duration_ms += executor.total_duration_ms;
            totals.total_gc_time_ms += executor.total_gc_time_ms;
            totals.input_bytes += executor.input_bytes;
            totals.shuffle_read_bytes += executor.shuffle_read_bytes;
            totals.shuffle_write_bytes += executor.shuffle_write_bytes;
            totals.memory_used_bytes += executor.memory_used_bytes;
            totals.disk_used_bytes += executor.disk_used_bytes;
        }
        totals.average_tasks_per_executor =
            safe_ratio(totals.completed_tasks as f64, executors.len() as f64);
        totals.average_memory_per_executor_mb =
            safe_ratio(totals.total_max_memory_mb, executors.len() as f64);
        totals
    }

    /// Share of task time spent in GC, in `[0, 1]`. 0.0 when no task time
    /// was recorded.
    #[must_use]
    pub fn gc_time_share(&self) -> f64 {
        safe_ratio(self.total_gc_time_ms as f64, self.total_duration_ms as f64)
    }
}

/// Everything the rules and the report need to know about one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunAggregates {
    /// Stage rollup.
    pub stages: StageTotals,
    /// Job rollup.
    pub jobs: JobStats,
    /// Executor rollup.
    pub executors: ExecutorTotals,
    /// Timeline span, seconds.
    pub wall_clock_seconds: f64,
    /// Input throughput over wall clock, bytes/second. 0.0 when the
    /// timeline is empty.
    pub input_bytes_per_second: f64,
    /// Output throughput over wall clock, bytes/second.
    pub output_bytes_per_second: f64,
    /// Time-weighted average active executors over the timeline.
    pub average_active_executors: f64,
    /// Peak active executors over the timeline.
    pub peak_active_executors: u32,
}

impl RunAggregates {
    /// Roll up one snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: &ApplicationSnapshot) -> Self {
        let stages = StageTotals::from_stages(&snapshot.stages);
        let wall_clock_seconds = snapshot.timeline_span_seconds();
        Self {
            stages,
            jobs: JobStats::from_jobs(&snapshot.jobs),
            executors: ExecutorTotals::from_executors(&snapshot.executors),
            wall_clock_seconds,
            input_bytes_per_second: safe_ratio(stages.input_bytes as f64, wall_clock_seconds),
            output_bytes_per_second: safe_ratio(stages.output_bytes as f64, wall_clock_seconds),
            average_active_executors: average_executor_count(&snapshot.timeline),
            peak_active_executors: peak_executor_count(&snapshot.timeline),
        }
    }
}
