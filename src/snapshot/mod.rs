//! Input data model.
//!
//! Immutable value objects describing one complete run of a distributed
//! batch job, as materialized by an upstream history-service client. The
//! engine never mutates a snapshot.
//!
//! Source payloads are loosely-typed JSON with optional fields, so every
//! entity here is an explicit typed record and all validation happens at the
//! construction boundary ([`ApplicationSnapshot::new`] /
//! [`SnapshotBuilder::build`]). The comparison algorithms operate on
//! validated records only.
//!
//! # Example
//!
//! ```
//! use spark_compare::snapshot::{ApplicationSnapshot, StageRecord};
//!
//! let snapshot = ApplicationSnapshot::builder("app-001", "nightly etl")
//!     .stages(vec![StageRecord::named(0, "map at Etl.scala:42")])
//!     .build()?;
//! assert_eq!(snapshot.stages.len(), 1);
//! # Ok::<(), spark_compare::error::SnapshotError>(())
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;

/// One complete, independent execution of a batch job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSnapshot {
    /// Application id, unique per history server.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Stages in submission order.
    pub stages: Vec<StageRecord>,
    /// Jobs in submission order.
    pub jobs: Vec<JobRecord>,
    /// All executors, active and removed.
    pub executors: Vec<ExecutorRecord>,
    /// Runtime environment properties.
    pub environment: EnvironmentInfo,
    /// Resource-timeline samples in timestamp order.
    pub timeline: Vec<TimelineSample>,
}

impl ApplicationSnapshot {
    /// Construct a validated snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] when a required field is missing or the
    /// timeline is out of timestamp order.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        stages: Vec<StageRecord>,
        jobs: Vec<JobRecord>,
        executors: Vec<ExecutorRecord>,
        environment: EnvironmentInfo,
        timeline: Vec<TimelineSample>,
    ) -> Result<Self, SnapshotError> {
        let snapshot = Self {
            id: id.into(),
            name: name.into(),
            stages,
            jobs,
            executors,
            environment,
            timeline,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Start building a snapshot with empty entity lists.
    #[must_use]
    pub fn builder(id: impl Into<String>, name: impl Into<String>) -> SnapshotBuilder {
        SnapshotBuilder {
            id: id.into(),
            name: name.into(),
            stages: Vec::new(),
            jobs: Vec::new(),
            executors: Vec::new(),
            environment: EnvironmentInfo::default(),
            timeline: Vec::new(),
        }
    }

    /// Wall-clock span of the timeline, in seconds. 0.0 for empty timelines.
    #[must_use]
    pub fn timeline_span_seconds(&self) -> f64 {
        match (self.timeline.first(), self.timeline.last()) {
            (Some(first), Some(last)) => {
                (last.timestamp - first.timestamp).num_milliseconds() as f64 / 1000.0
            }
            _ => 0.0,
        }
    }

    fn validate(&self) -> Result<(), SnapshotError> {
        if self.id.trim().is_empty() {
            return Err(SnapshotError::MissingField { field: "id".into() });
        }
        if self.name.trim().is_empty() {
            return Err(SnapshotError::MissingField {
                field: "name".into(),
            });
        }
        for stage in &self.stages {
            if stage.name.trim().is_empty() {
                return Err(SnapshotError::MissingField {
                    field: format!("stages[{}].name", stage.stage_id),
                });
            }
            if let (Some(submitted), Some(completed)) =
                (stage.submission_time, stage.completion_time)
            {
                if completed < submitted {
                    return Err(SnapshotError::InvalidValue {
                        field: format!("stages[{}].completion_time", stage.stage_id),
                        reason: "earlier than submission_time".into(),
                    });
                }
            }
        }
        for executor in &self.executors {
            if executor.id.trim().is_empty() {
                return Err(SnapshotError::MissingField {
                    field: "executors[].id".into(),
                });
            }
        }
        for (index, pair) in self.timeline.windows(2).enumerate() {
            if pair[1].timestamp < pair[0].timestamp {
                return Err(SnapshotError::UnorderedTimeline { index: index + 1 });
            }
        }
        Ok(())
    }
}

/// Builder for [`ApplicationSnapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    id: String,
    name: String,
    stages: Vec<StageRecord>,
    jobs: Vec<JobRecord>,
    executors: Vec<ExecutorRecord>,
    environment: EnvironmentInfo,
    timeline: Vec<TimelineSample>,
}

impl SnapshotBuilder {
    /// Set the stage list.
    #[must_use]
    pub fn stages(mut self, stages: Vec<StageRecord>) -> Self {
        self.stages = stages;
        self
    }

    /// Set the job list.
    #[must_use]
    pub fn jobs(mut self, jobs: Vec<JobRecord>) -> Self {
        self.jobs = jobs;
        self
    }

    /// Set the executor list.
    #[must_use]
    pub fn executors(mut self, executors: Vec<ExecutorRecord>) -> Self {
        self.executors = executors;
        self
    }

    /// Set the environment properties.
    #[must_use]
    pub fn environment(mut self, environment: EnvironmentInfo) -> Self {
        self.environment = environment;
        self
    }

    /// Set the timeline samples.
    #[must_use]
    pub fn timeline(mut self, timeline: Vec<TimelineSample>) -> Self {
        self.timeline = timeline;
        self
    }

    /// Validate and build the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] on missing required fields or an unordered
    /// timeline.
    pub fn build(self) -> Result<ApplicationSnapshot, SnapshotError> {
        ApplicationSnapshot::new(
            self.id,
            self.name,
            self.stages,
            self.jobs,
            self.executors,
            self.environment,
            self.timeline,
        )
    }
}

/// A unit of parallel work within a run.
///
/// `stage_id` is scoped to its own run only; it is never compared across
/// runs (the matcher pairs stages by name and duration instead).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Stage id within this run.
    pub stage_id: i64,
    /// Display name, e.g. `"map at Etl.scala:42"`.
    pub name: String,
    /// Completion status.
    pub status: StageStatus,
    /// Submission timestamp, absent while pending.
    pub submission_time: Option<DateTime<Utc>>,
    /// Completion timestamp, absent while running.
    pub completion_time: Option<DateTime<Utc>>,
    /// Numeric metrics for the stage.
    pub metrics: StageMetrics,
}

impl StageRecord {
    /// A minimal stage with the given id and name and zeroed metrics.
    #[must_use]
    pub fn named(stage_id: i64, name: impl Into<String>) -> Self {
        Self {
            stage_id,
            name: name.into(),
            status: StageStatus::Complete,
            submission_time: None,
            completion_time: None,
            metrics: StageMetrics::default(),
        }
    }

    /// Wall-clock duration in seconds, `None` unless both timestamps exist.
    #[must_use]
    pub fn duration_seconds(&self) -> Option<f64> {
        match (self.submission_time, self.completion_time) {
            (Some(submitted), Some(completed)) => {
                Some((completed - submitted).num_milliseconds() as f64 / 1000.0)
            }
            _ => None,
        }
    }
}

/// Stage completion status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageStatus {
    /// Finished successfully.
    Complete,
    /// Still running.
    Active,
    /// Failed.
    Failed,
    /// Submitted but not started.
    Pending,
    /// Skipped (result reused).
    Skipped,
}

/// Numeric metrics of one stage. All byte/time fields are totals across
/// the stage's tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StageMetrics {
    /// Total task count.
    pub num_tasks: u64,
    /// Failed task count.
    pub num_failed_tasks: u64,
    /// Executor run time, milliseconds.
    pub executor_run_time_ms: u64,
    /// Executor CPU time, nanoseconds.
    pub executor_cpu_time_ns: u64,
    /// JVM GC time, milliseconds.
    pub jvm_gc_time_ms: u64,
    /// Input volume, bytes.
    pub input_bytes: u64,
    /// Input record count.
    pub input_records: u64,
    /// Output volume, bytes.
    pub output_bytes: u64,
    /// Output record count.
    pub output_records: u64,
    /// Shuffle read volume, bytes.
    pub shuffle_read_bytes: u64,
    /// Shuffle write volume, bytes.
    pub shuffle_write_bytes: u64,
    /// Bytes spilled to memory.
    pub memory_spilled_bytes: u64,
    /// Bytes spilled to disk.
    pub disk_spilled_bytes: u64,
    /// Median per-task shuffle write, bytes (from task distributions).
    pub shuffle_write_median_task_bytes: Option<u64>,
    /// Maximum per-task shuffle write, bytes (from task distributions).
    pub shuffle_write_max_task_bytes: Option<u64>,
}

/// A job within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job id within this run.
    pub job_id: i64,
    /// Display name.
    pub name: String,
    /// Completion status.
    pub status: JobStatus,
    /// Submission timestamp.
    pub submission_time: Option<DateTime<Utc>>,
    /// Completion timestamp.
    pub completion_time: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Wall-clock duration in seconds, `None` unless both timestamps exist.
    #[must_use]
    pub fn duration_seconds(&self) -> Option<f64> {
        match (self.submission_time, self.completion_time) {
            (Some(submitted), Some(completed)) => {
                Some((completed - submitted).num_milliseconds() as f64 / 1000.0)
            }
            _ => None,
        }
    }
}

/// Job completion status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Finished successfully.
    Succeeded,
    /// Failed.
    Failed,
    /// Still running.
    Running,
    /// State not reported.
    Unknown,
}

/// One executor of a run, with its lifecycle and aggregate task metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorRecord {
    /// Executor id (`"driver"` or a numeric string).
    pub id: String,
    /// Whether the executor was still active at the end of the run.
    pub is_active: bool,
    /// Cores allocated.
    pub total_cores: u32,
    /// Maximum memory, MB.
    pub max_memory_mb: f64,
    /// Add timestamp.
    pub add_time: Option<DateTime<Utc>>,
    /// Remove timestamp, absent while active.
    pub remove_time: Option<DateTime<Utc>>,
    /// Completed task count.
    pub completed_tasks: u64,
    /// Failed task count.
    pub failed_tasks: u64,
    /// Total task duration, milliseconds.
    pub total_duration_ms: u64,
    /// Total GC time, milliseconds.
    pub total_gc_time_ms: u64,
    /// Total input volume, bytes.
    pub input_bytes: u64,
    /// Total shuffle read, bytes.
    pub shuffle_read_bytes: u64,
    /// Total shuffle write, bytes.
    pub shuffle_write_bytes: u64,
    /// Storage memory in use, bytes.
    pub memory_used_bytes: u64,
    /// Disk in use, bytes.
    pub disk_used_bytes: u64,
}

impl ExecutorRecord {
    /// A minimal active executor with the given id and cores.
    #[must_use]
    pub fn named(id: impl Into<String>, total_cores: u32) -> Self {
        Self {
            id: id.into(),
            is_active: true,
            total_cores,
            max_memory_mb: 0.0,
            add_time: None,
            remove_time: None,
            completed_tasks: 0,
            failed_tasks: 0,
            total_duration_ms: 0,
            total_gc_time_ms: 0,
            input_bytes: 0,
            shuffle_read_bytes: 0,
            shuffle_write_bytes: 0,
            memory_used_bytes: 0,
            disk_used_bytes: 0,
        }
    }
}

/// Runtime environment of a run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    /// Spark properties, name → value.
    pub spark_properties: BTreeMap<String, String>,
    /// System properties, name → value.
    pub system_properties: BTreeMap<String, String>,
    /// JVM runtime info, when reported.
    pub runtime: Option<RuntimeInfo>,
}

/// JVM runtime versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeInfo {
    /// Java version string.
    pub java_version: String,
    /// Scala version string.
    pub scala_version: String,
}

/// One resource-timeline sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimelineSample {
    /// Sample timestamp.
    pub timestamp: DateTime<Utc>,
    /// Active executor count at this instant.
    pub active_executors: u32,
    /// Total allocated cores at this instant.
    pub total_cores: u32,
    /// Total allocated memory, MB.
    pub total_memory_mb: f64,
    /// The discrete event that produced the sample.
    pub event: TimelineEvent,
}

/// The discrete event behind a timeline sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEvent {
    /// An executor was added.
    ExecutorAdded,
    /// An executor was removed.
    ExecutorRemoved,
    /// A stage started.
    StageStarted,
    /// A stage ended.
    StageEnded,
}
