//! Report composition and the engine entry point.
//!
//! [`compare_snapshots`] runs every comparison dimension and assembles the
//! results into one [`ComparisonReport`]. The composer only filters,
//! orders, caps, and elides what the other modules computed; it never
//! derives a number itself. Empty dimensions (metric groups all-zero on
//! both sides) are elided rather than emitted as walls of zeros.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregate::RunAggregates;
use crate::diff::{DiffSet, DiffStyle, MetricDiff};
use crate::error::EngineError;
use crate::matching::{match_stages, MatchReport, StageMatch};
use crate::options::CompareOptions;
use crate::recommend::{evaluate_rules, Recommendation, RuleContext};
use crate::snapshot::{ApplicationSnapshot, StageRecord};
use crate::timeline::{compare_timelines, TimelineComparison};

/// Spark properties most likely to explain performance differences, in
/// display order. Differing properties outside this list rank after it,
/// alphabetically.
const PROPERTY_PRIORITY: &[&str] = &[
    "spark.executor.memory",
    "spark.executor.cores",
    "spark.executor.instances",
    "spark.driver.memory",
    "spark.sql.shuffle.partitions",
    "spark.default.parallelism",
    "spark.dynamicAllocation.enabled",
    "spark.dynamicAllocation.maxExecutors",
    "spark.dynamicAllocation.initialExecutors",
    "spark.sql.adaptive.enabled",
    "spark.memory.fraction",
    "spark.shuffle.service.enabled",
    "spark.serializer",
    "spark.sql.autoBroadcastJoinThreshold",
];

/// How many differing Spark properties a report shows.
const SPARK_PROPERTY_CAP: usize = 10;

/// How many differing system properties a report shows.
const SYSTEM_PROPERTY_CAP: usize = 5;

/// Identity card for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationInfo {
    /// Application id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Stage count.
    pub stage_count: usize,
    /// Job count.
    pub job_count: usize,
    /// Executor count.
    pub executor_count: usize,
    /// Timeline span, seconds.
    pub wall_clock_seconds: f64,
}

impl ApplicationInfo {
    fn from_snapshot(snapshot: &ApplicationSnapshot) -> Self {
        Self {
            id: snapshot.id.clone(),
            name: snapshot.name.clone(),
            stage_count: snapshot.stages.len(),
            job_count: snapshot.jobs.len(),
            executor_count: snapshot.executors.len(),
            wall_clock_seconds: snapshot.timeline_span_seconds(),
        }
    }
}

/// The two compared runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationPair {
    /// First run (the baseline).
    pub run_a: ApplicationInfo,
    /// Second run.
    pub run_b: ApplicationInfo,
}

/// Significant metric diffs for one dimension, with "N of M" counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSection {
    /// The significant diffs only.
    pub metrics: Vec<MetricDiff>,
    /// Significant diff count.
    pub significant_count: usize,
    /// Diffs computed for this dimension, significant or not.
    pub total_count: usize,
}

impl MetricSection {
    /// `None` when both sides are all-zero across the whole dimension.
    fn from_diff_set(set: &DiffSet) -> Option<Self> {
        if set.is_all_zero() {
            return None;
        }
        Some(Self {
            metrics: set.significant().into_iter().cloned().collect(),
            significant_count: set.significant_count(),
            total_count: set.total(),
        })
    }
}

/// Summary of cross-run stage matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    /// Accepted pair count.
    pub matched: usize,
    /// Stage count in run A.
    pub stage_count_a: usize,
    /// Stage count in run B.
    pub stage_count_b: usize,
    /// Matched share of the smaller run, in `[0, 1]`.
    pub match_fraction: f64,
}

/// Deep dive into one matched stage pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageComparison {
    /// Stage id in run A.
    pub stage_id_a: i64,
    /// Stage id in run B.
    pub stage_id_b: i64,
    /// Stage name in run A.
    pub name_a: String,
    /// Stage name in run B.
    pub name_b: String,
    /// Pairing score in `[0, 1]`.
    pub score: f64,
    /// Duration in run A, seconds, when known.
    pub duration_seconds_a: Option<f64>,
    /// Duration in run B, seconds, when known.
    pub duration_seconds_b: Option<f64>,
    /// Significant metric diffs for this pair.
    pub metrics: Vec<MetricDiff>,
}

/// Stage dimension: matching summary plus the top per-stage differences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSection {
    /// Matching summary.
    pub matching: MatchSummary,
    /// Matched pairs with the largest duration change, biggest first.
    pub top_differences: Vec<StageComparison>,
}

/// One differing environment property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDiff {
    /// Property name.
    pub name: String,
    /// Value in run A, if set.
    pub value_a: Option<String>,
    /// Value in run B, if set.
    pub value_b: Option<String>,
}

/// Environment dimension: differing properties, capped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSection {
    /// Differing Spark properties, performance-relevant first.
    pub spark_properties: Vec<PropertyDiff>,
    /// Differing Spark properties not shown.
    pub spark_properties_omitted: usize,
    /// Differing JVM system properties.
    pub system_properties: Vec<PropertyDiff>,
    /// Differing system properties not shown.
    pub system_properties_omitted: usize,
    /// Runtime version differences, when any.
    pub runtime: Vec<PropertyDiff>,
}

impl EnvironmentSection {
    fn is_empty(&self) -> bool {
        self.spark_properties.is_empty()
            && self.spark_properties_omitted == 0
            && self.system_properties.is_empty()
            && self.system_properties_omitted == 0
            && self.runtime.is_empty()
    }
}

/// The complete differential report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// The two compared runs.
    pub applications: ApplicationPair,
    /// Aggregate stage metric diffs across all stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_aggregate: Option<MetricSection>,
    /// Matching summary and per-stage deep dives.
    pub stages: StageSection,
    /// Executor totals diffs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executors: Option<MetricSection>,
    /// Job count and duration diffs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<MetricSection>,
    /// Parallelism and throughput diffs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<MetricSection>,
    /// Differing environment properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentSection>,
    /// Executor-timeline comparison.
    pub timeline: TimelineComparison,
    /// Prioritized tuning recommendations.
    pub recommendations: Vec<Recommendation>,
    /// Set when a dimension could not be compared at all (e.g. no stage
    /// pair cleared the similarity threshold).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Recovery advice accompanying `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Compare two runs and compose the differential report.
///
/// Pure and synchronous: no I/O, no shared state, safe to call
/// concurrently. Domain-level "nothing matched" outcomes land in the
/// report's `error`/`suggestion` fields with every other dimension still
/// populated.
///
/// # Errors
///
/// Returns [`EngineError::Options`] when `options` fails validation.
/// Malformed snapshots cannot reach this function; they are rejected at
/// construction.
pub fn compare_snapshots(
    run_a: &ApplicationSnapshot,
    run_b: &ApplicationSnapshot,
    options: &CompareOptions,
) -> Result<ComparisonReport, EngineError> {
    options.validate()?;
    let span = tracing::info_span!("compare_snapshots", run_a = %run_a.id, run_b = %run_b.id);
    let _guard = span.enter();

    let aggregates_a = RunAggregates::from_snapshot(run_a);
    let aggregates_b = RunAggregates::from_snapshot(run_b);

    let match_report = match_stages(&run_a.stages, &run_b.stages, options.similarity_threshold);
    let timeline = compare_timelines(&run_a.timeline, &run_b.timeline, options.interval_minutes);

    let recommendations = {
        let context = RuleContext {
            run_a,
            run_b,
            aggregates_a: &aggregates_a,
            aggregates_b: &aggregates_b,
            options,
        };
        let mut recommendations = evaluate_rules(&context);
        if let Some(top_n) = options.top_n {
            recommendations.truncate(top_n);
        }
        recommendations
    };

    let stage_aggregate = MetricSection::from_diff_set(&stage_aggregate_diffs(
        &aggregates_a,
        &aggregates_b,
        options.significance_threshold,
    ));
    let executors = MetricSection::from_diff_set(&executor_diffs(
        &aggregates_a,
        &aggregates_b,
        options.significance_threshold,
    ));
    let jobs = MetricSection::from_diff_set(&job_diffs(
        &aggregates_a,
        &aggregates_b,
        options.significance_threshold,
    ));
    let resources = MetricSection::from_diff_set(&resource_diffs(
        &aggregates_a,
        &aggregates_b,
        options.significance_threshold,
    ));
    let environment = environment_diffs(run_a, run_b);

    let stages = StageSection {
        matching: MatchSummary {
            matched: match_report.matches.len(),
            stage_count_a: match_report.stage_count_a,
            stage_count_b: match_report.stage_count_b,
            match_fraction: match_report.match_fraction(),
        },
        top_differences: top_stage_differences(run_a, run_b, &match_report, options),
    };

    let (error, suggestion) = match &match_report.suggestion {
        Some(advice) => (
            Some("No stages could be matched between the runs.".to_string()),
            Some(advice.clone()),
        ),
        None => (None, None),
    };

    info!(
        matched_stages = stages.matching.matched,
        recommendations = recommendations.len(),
        has_error = error.is_some(),
        "comparison complete"
    );

    Ok(ComparisonReport {
        applications: ApplicationPair {
            run_a: ApplicationInfo::from_snapshot(run_a),
            run_b: ApplicationInfo::from_snapshot(run_b),
        },
        stage_aggregate,
        stages,
        executors,
        jobs,
        resources,
        environment,
        timeline,
        recommendations,
        error,
        suggestion,
    })
}

/// Style for one composed metric. Derived per-entity averages and shares
/// are already comparisons, so any change in them is surfaced; raw totals
/// go through the significance threshold.
fn diff_style(name: &str) -> DiffStyle {
    match name {
        "average_tasks_per_stage" | "average_tasks_per_executor" | "gc_time_share" => {
            DiffStyle::Ratio
        }
        _ => DiffStyle::Absolute,
    }
}

fn stage_aggregate_diffs(a: &RunAggregates, b: &RunAggregates, threshold: f64) -> DiffSet {
    let sa = &a.stages;
    let sb = &b.stages;
    DiffSet::new(
        [
            ("stage_count", sa.stage_count as f64, sb.stage_count as f64),
            ("failed_stages", sa.failed_stages as f64, sb.failed_stages as f64),
            ("total_tasks", sa.total_tasks as f64, sb.total_tasks as f64),
            ("failed_tasks", sa.failed_tasks as f64, sb.failed_tasks as f64),
            (
                "executor_run_time_ms",
                sa.executor_run_time_ms as f64,
                sb.executor_run_time_ms as f64,
            ),
            ("jvm_gc_time_ms", sa.jvm_gc_time_ms as f64, sb.jvm_gc_time_ms as f64),
            ("input_bytes", sa.input_bytes as f64, sb.input_bytes as f64),
            ("input_records", sa.input_records as f64, sb.input_records as f64),
            ("output_bytes", sa.output_bytes as f64, sb.output_bytes as f64),
            ("output_records", sa.output_records as f64, sb.output_records as f64),
            (
                "shuffle_read_bytes",
                sa.shuffle_read_bytes as f64,
                sb.shuffle_read_bytes as f64,
            ),
            (
                "shuffle_write_bytes",
                sa.shuffle_write_bytes as f64,
                sb.shuffle_write_bytes as f64,
            ),
            (
                "memory_spilled_bytes",
                sa.memory_spilled_bytes as f64,
                sb.memory_spilled_bytes as f64,
            ),
            (
                "disk_spilled_bytes",
                sa.disk_spilled_bytes as f64,
                sb.disk_spilled_bytes as f64,
            ),
            (
                "average_duration_seconds",
                sa.average_duration_seconds,
                sb.average_duration_seconds,
            ),
            (
                "average_tasks_per_stage",
                sa.average_tasks_per_stage,
                sb.average_tasks_per_stage,
            ),
        ]
        .into_iter()
        .map(|(name, va, vb)| MetricDiff::compute(name, va, vb, diff_style(name), threshold))
        .collect(),
    )
}

fn executor_diffs(a: &RunAggregates, b: &RunAggregates, threshold: f64) -> DiffSet {
    let ea = &a.executors;
    let eb = &b.executors;
    DiffSet::new(
        [
            ("executor_count", ea.executor_count as f64, eb.executor_count as f64),
            ("total_cores", ea.total_cores as f64, eb.total_cores as f64),
            ("total_max_memory_mb", ea.total_max_memory_mb, eb.total_max_memory_mb),
            ("completed_tasks", ea.completed_tasks as f64, eb.completed_tasks as f64),
            ("failed_tasks", ea.failed_tasks as f64, eb.failed_tasks as f64),
            ("total_gc_time_ms", ea.total_gc_time_ms as f64, eb.total_gc_time_ms as f64),
            (
                "shuffle_read_bytes",
                ea.shuffle_read_bytes as f64,
                eb.shuffle_read_bytes as f64,
            ),
            (
                "shuffle_write_bytes",
                ea.shuffle_write_bytes as f64,
                eb.shuffle_write_bytes as f64,
            ),
            ("memory_used_bytes", ea.memory_used_bytes as f64, eb.memory_used_bytes as f64),
            ("disk_used_bytes", ea.disk_used_bytes as f64, eb.disk_used_bytes as f64),
            (
                "average_tasks_per_executor",
                ea.average_tasks_per_executor,
                eb.average_tasks_per_executor,
            ),
            ("gc_time_share", ea.gc_time_share(), eb.gc_time_share()),
        ]
        .into_iter()
        .map(|(name, va, vb)| MetricDiff::compute(name, va, vb, diff_style(name), threshold))
        .collect(),
    )
}

fn job_diffs(a: &RunAggregates, b: &RunAggregates, threshold: f64) -> DiffSet {
    let ja = &a.jobs;
    let jb = &b.jobs;
    DiffSet::new(
        [
            ("job_count", ja.job_count as f64, jb.job_count as f64),
            ("succeeded_jobs", ja.succeeded_jobs as f64, jb.succeeded_jobs as f64),
            ("failed_jobs", ja.failed_jobs as f64, jb.failed_jobs as f64),
            (
                "total_duration_seconds",
                ja.total_duration_seconds,
                jb.total_duration_seconds,
            ),
            (
                "average_duration_seconds",
                ja.average_duration_seconds,
                jb.average_duration_seconds,
            ),
        ]
        .into_iter()
        .map(|(name, va, vb)| MetricDiff::compute(name, va, vb, diff_style(name), threshold))
        .collect(),
    )
}

fn resource_diffs(a: &RunAggregates, b: &RunAggregates, threshold: f64) -> DiffSet {
    DiffSet::new(
        [
            ("wall_clock_seconds", a.wall_clock_seconds, b.wall_clock_seconds),
            (
                "average_active_executors",
                a.average_active_executors,
                b.average_active_executors,
            ),
            (
                "peak_active_executors",
                f64::from(a.peak_active_executors),
                f64::from(b.peak_active_executors),
            ),
            (
                "input_bytes_per_second",
                a.input_bytes_per_second,
                b.input_bytes_per_second,
            ),
            (
                "output_bytes_per_second",
                a.output_bytes_per_second,
                b.output_bytes_per_second,
            ),
        ]
        .into_iter()
        .map(|(name, va, vb)| MetricDiff::compute(name, va, vb, diff_style(name), threshold))
        .collect(),
    )
}

/// Matched stage pairs ordered by absolute duration change, largest first,
/// capped to `top_n` when set.
fn top_stage_differences(
    run_a: &ApplicationSnapshot,
    run_b: &ApplicationSnapshot,
    match_report: &MatchReport,
    options: &CompareOptions,
) -> Vec<StageComparison> {
    let mut comparisons: Vec<StageComparison> = match_report
        .matches
        .iter()
        .map(|m| stage_comparison(m, &run_a.stages[m.index_a], &run_b.stages[m.index_b], options))
        .collect();
    comparisons.sort_by(|x, y| {
        duration_change(y)
            .partial_cmp(&duration_change(x))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    if let Some(top_n) = options.top_n {
        comparisons.truncate(top_n);
    }
    debug!(pairs = comparisons.len(), "stage deep dives composed");
    comparisons
}

fn duration_change(comparison: &StageComparison) -> f64 {
    match (comparison.duration_seconds_a, comparison.duration_seconds_b) {
        (Some(a), Some(b)) => (b - a).abs(),
        _ => 0.0,
    }
}

fn stage_comparison(
    m: &StageMatch,
    stage_a: &StageRecord,
    stage_b: &StageRecord,
    options: &CompareOptions,
) -> StageComparison {
    let ma = &stage_a.metrics;
    let mb = &stage_b.metrics;
    let threshold = options.significance_threshold;
    let metrics: Vec<MetricDiff> = [
        ("num_tasks", ma.num_tasks as f64, mb.num_tasks as f64),
        ("num_failed_tasks", ma.num_failed_tasks as f64, mb.num_failed_tasks as f64),
        (
            "executor_run_time_ms",
            ma.executor_run_time_ms as f64,
            mb.executor_run_time_ms as f64,
        ),
        ("jvm_gc_time_ms", ma.jvm_gc_time_ms as f64, mb.jvm_gc_time_ms as f64),
        ("input_bytes", ma.input_bytes as f64, mb.input_bytes as f64),
        ("output_bytes", ma.output_bytes as f64, mb.output_bytes as f64),
        ("shuffle_read_bytes", ma.shuffle_read_bytes as f64, mb.shuffle_read_bytes as f64),
        (
            "shuffle_write_bytes",
            ma.shuffle_write_bytes as f64,
            mb.shuffle_write_bytes as f64,
        ),
        (
            "memory_spilled_bytes",
            ma.memory_spilled_bytes as f64,
            mb.memory_spilled_bytes as f64,
        ),
        (
            "disk_spilled_bytes",
            ma.disk_spilled_bytes as f64,
            mb.disk_spilled_bytes as f64,
        ),
    ]
    .into_iter()
    .map(|(name, va, vb)| MetricDiff::compute(name, va, vb, DiffStyle::Absolute, threshold))
    .filter(|d| d.significant)
    .collect();

    StageComparison {
        stage_id_a: stage_a.stage_id,
        stage_id_b: stage_b.stage_id,
        name_a: stage_a.name.clone(),
        name_b: stage_b.name.clone(),
        score: m.score,
        duration_seconds_a: stage_a.duration_seconds(),
        duration_seconds_b: stage_b.duration_seconds(),
        metrics,
    }
}

/// Differing environment properties, capped and priority-ordered.
/// `None` when the environments are identical.
fn environment_diffs(
    run_a: &ApplicationSnapshot,
    run_b: &ApplicationSnapshot,
) -> Option<EnvironmentSection> {
    let env_a = &run_a.environment;
    let env_b = &run_b.environment;

    let mut spark = differing_properties(&env_a.spark_properties, &env_b.spark_properties);
    spark.sort_by(|x, y| {
        property_rank(&x.name)
            .cmp(&property_rank(&y.name))
            .then_with(|| x.name.cmp(&y.name))
    });
    let spark_total = spark.len();
    spark.truncate(SPARK_PROPERTY_CAP);

    let mut system = differing_properties(&env_a.system_properties, &env_b.system_properties);
    system.sort_by(|x, y| x.name.cmp(&y.name));
    let system_total = system.len();
    system.truncate(SYSTEM_PROPERTY_CAP);

    let mut runtime = Vec::new();
    if let (Some(ra), Some(rb)) = (&env_a.runtime, &env_b.runtime) {
        if ra.java_version != rb.java_version {
            runtime.push(PropertyDiff {
                name: "java_version".to_string(),
                value_a: Some(ra.java_version.clone()),
                value_b: Some(rb.java_version.clone()),
            });
        }
        if ra.scala_version != rb.scala_version {
            runtime.push(PropertyDiff {
                name: "scala_version".to_string(),
                value_a: Some(ra.scala_version.clone()),
                value_b: Some(rb.scala_version.clone()),
            });
        }
    }

    let section = EnvironmentSection {
        spark_properties_omitted: spark_total.saturating_sub(spark.len()),
        spark_properties: spark,
        system_properties_omitted: system_total.saturating_sub(system.len()),
        system_properties: system,
        runtime,
    };
    if section.is_empty() {
        None
    } else {
        Some(section)
    }
}

fn differing_properties(
    a: &std::collections::BTreeMap<String, String>,
    b: &std::collections::BTreeMap<String, String>,
) -> Vec<PropertyDiff> {
    let mut names: Vec<&String> = a.keys().chain(b.keys()).collect();
    names.sort_unstable();
    names.dedup();
    names
        .into_iter()
        .filter(|name| a.get(*name) != b.get(*name))
        .map(|name| PropertyDiff {
            name: name.clone(),
            value_a: a.get(name).cloned(),
            value_b: b.get(name).cloned(),
        })
        .collect()
}

/// Rank of a Spark property in the performance-relevance list; properties
/// outside the list share the lowest rank.
fn property_rank(name: &str) -> usize {
    PROPERTY_PRIORITY
        .iter()
        .position(|p| *p == name)
        .unwrap_or(PROPERTY_PRIORITY.len())
}
