//! Rule-based tuning recommendations.
//!
//! Every heuristic is one entry in the declarative [`RULES`] table: a kind,
//! an optional subtype, and a pure evaluation function over a
//! [`RuleContext`] holding both runs' aggregates and options. Rules are
//! order-independent and never read each other's output; priority is
//! intrinsic to the rule, not derived from evaluation order.
//!
//! Adding a heuristic means adding one `Rule` entry and its function.
//! Nothing else changes.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregate::{safe_ratio, RunAggregates};
use crate::options::CompareOptions;
use crate::snapshot::{ApplicationSnapshot, StageRecord};

/// Dynamic-allocation property names consulted by the auto-scaling rules.
const DYNAMIC_ALLOCATION_ENABLED: &str = "spark.dynamicAllocation.enabled";
const INITIAL_EXECUTORS: &str = "spark.dynamicAllocation.initialExecutors";
const MAX_EXECUTORS: &str = "spark.dynamicAllocation.maxExecutors";

/// Recommendation urgency, most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Act before the next run.
    Critical,
    /// Likely a large win.
    High,
    /// Worth investigating.
    Medium,
    /// Informational.
    Low,
}

/// A concrete configuration change backing a recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigAdvice {
    /// Spark property to change.
    pub parameter: String,
    /// Current value in run B, if set.
    pub current: Option<String>,
    /// Suggested value.
    pub recommended: String,
}

/// One tuning recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Rule family, e.g. `"executor_scaling"`.
    pub kind: String,
    /// Variant within the family, e.g. `"initial_executors"`.
    pub subtype: Option<String>,
    /// Urgency.
    pub priority: Priority,
    /// What was observed, with the computed ratio embedded.
    pub issue: String,
    /// What to do about it.
    pub suggestion: String,
    /// Concrete property change, when one applies.
    pub config: Option<ConfigAdvice>,
}

/// What a triggered rule reports. `kind` and `subtype` come from the
/// [`Rule`] table entry, so a rule function cannot disagree with its own
/// registration.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    /// Urgency.
    pub priority: Priority,
    /// What was observed, with the computed ratio embedded.
    pub issue: String,
    /// What to do about it.
    pub suggestion: String,
    /// Concrete property change, when one applies.
    pub config: Option<ConfigAdvice>,
}

/// Inputs shared by every rule.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    /// First run.
    pub run_a: &'a ApplicationSnapshot,
    /// Second run.
    pub run_b: &'a ApplicationSnapshot,
    /// First run's rollups.
    pub aggregates_a: &'a RunAggregates,
    /// Second run's rollups.
    pub aggregates_b: &'a RunAggregates,
    /// Engine options.
    pub options: &'a CompareOptions,
}

/// One entry in the rule table.
pub struct Rule {
    /// Rule family.
    pub kind: &'static str,
    /// Variant within the family.
    pub subtype: Option<&'static str>,
    /// Pure evaluation over the shared context.
    pub eval: fn(&RuleContext<'_>) -> Option<RuleOutcome>,
}

/// The complete rule table. Evaluation order is irrelevant; output order
/// comes from [`evaluate_rules`] sorting by priority.
pub static RULES: &[Rule] = &[
    Rule {
        kind: "executor_scaling",
        subtype: None,
        eval: executor_scaling,
    },
    Rule {
        kind: "job_complexity",
        subtype: None,
        eval: job_complexity,
    },
    Rule {
        kind: "job_performance",
        subtype: None,
        eval: job_performance,
    },
    Rule {
        kind: "shuffle_skew",
        subtype: None,
        eval: shuffle_skew,
    },
    Rule {
        kind: "auto_scaling",
        subtype: Some("initial_executors"),
        eval: auto_scaling_initial,
    },
    Rule {
        kind: "auto_scaling",
        subtype: Some("max_executors"),
        eval: auto_scaling_max,
    },
    Rule {
        kind: "resource_allocation",
        subtype: None,
        eval: resource_allocation,
    },
    Rule {
        kind: "memory_spill",
        subtype: None,
        eval: memory_spill,
    },
    Rule {
        kind: "gc_pressure",
        subtype: None,
        eval: gc_pressure,
    },
    Rule {
        kind: "task_reliability",
        subtype: None,
        eval: task_reliability,
    },
];

/// Evaluate every rule, deduplicate by `(kind, subtype)`, and sort by
/// priority (most urgent first), then kind for determinism.
#[must_use]
pub fn evaluate_rules(context: &RuleContext<'_>) -> Vec<Recommendation> {
    let mut recommendations: Vec<Recommendation> = RULES
        .iter()
        .filter_map(|rule| {
            (rule.eval)(context).map(|outcome| Recommendation {
                kind: rule.kind.to_string(),
                subtype: rule.subtype.map(str::to_string),
                priority: outcome.priority,
                issue: outcome.issue,
                suggestion: outcome.suggestion,
                config: outcome.config,
            })
        })
        .collect();
    dedupe_recommendations(&mut recommendations);
    recommendations.sort_by(|x, y| {
        x.priority
            .cmp(&y.priority)
            .then_with(|| x.kind.cmp(&y.kind))
            .then_with(|| x.subtype.cmp(&y.subtype))
    });
    debug!(count = recommendations.len(), "rule evaluation complete");
    recommendations
}

/// Drop duplicate `(kind, subtype)` entries, keeping the first (most
/// urgent after sorting happens upstream of callers that re-merge lists).
pub fn dedupe_recommendations(recommendations: &mut Vec<Recommendation>) {
    let mut seen: Vec<(String, Option<String>)> = Vec::new();
    recommendations.retain(|r| {
        let key = (r.kind.clone(), r.subtype.clone());
        if seen.contains(&key) {
            false
        } else {
            seen.push(key);
            true
        }
    });
}

/// Larger-over-smaller ratio of two nonnegative quantities. `None` when
/// either side is zero (no meaningful ratio).
fn divergence_ratio(a: f64, b: f64) -> Option<f64> {
    if a <= 0.0 || b <= 0.0 {
        return None;
    }
    Some(a.max(b) / a.min(b))
}

fn executor_scaling(ctx: &RuleContext<'_>) -> Option<RuleOutcome> {
    let avg_a = ctx.aggregates_a.average_active_executors;
    let avg_b = ctx.aggregates_b.average_active_executors;
    if avg_a <= 0.0 || avg_b <= 0.0 {
        return None;
    }
    let ratio = avg_b / avg_a;
    if (0.5..=2.0).contains(&ratio) {
        return None;
    }
    let (direction, verb) = if ratio < 0.5 {
        ("fewer", "Increase")
    } else {
        ("more", "Decrease")
    };
    let recommended = avg_a.round().max(1.0);
    Some(RuleOutcome {
        priority: Priority::High,
        issue: format!(
            "Run B averaged {avg_b:.1} active executors against {avg_a:.1} in run A \
             (ratio {ratio:.2}): substantially {direction} parallelism."
        ),
        suggestion: format!(
            "{verb} executor allocation for run B to bring parallelism in line with run A."
        ),
        config: Some(ConfigAdvice {
            parameter: "spark.executor.instances".to_string(),
            current: ctx
                .run_b
                .environment
                .spark_properties
                .get("spark.executor.instances")
                .cloned(),
            recommended: format!("{recommended:.0}"),
        }),
    })
}

fn job_complexity(ctx: &RuleContext<'_>) -> Option<RuleOutcome> {
    let count_a = ctx.aggregates_a.jobs.job_count as f64;
    let count_b = ctx.aggregates_b.jobs.job_count as f64;
    let ratio = divergence_ratio(count_a, count_b)?;
    if ratio < 3.0 {
        return None;
    }
    Some(RuleOutcome {
        priority: Priority::Medium,
        issue: format!(
            "Job counts diverge by {ratio:.1}x ({} vs {} jobs): the runs executed \
             substantially different query plans.",
            ctx.aggregates_a.jobs.job_count, ctx.aggregates_b.jobs.job_count
        ),
        suggestion: "Verify both runs executed the same application logic before comparing \
                     performance; plan changes usually dominate tuning effects."
            .to_string(),
        config: None,
    })
}

fn job_performance(ctx: &RuleContext<'_>) -> Option<RuleOutcome> {
    let avg_a = ctx.aggregates_a.jobs.average_duration_seconds;
    let avg_b = ctx.aggregates_b.jobs.average_duration_seconds;
    let ratio = divergence_ratio(avg_a, avg_b)?;
    if ratio < 2.0 {
        return None;
    }
    let slower = if avg_b > avg_a { "B" } else { "A" };
    Some(RuleOutcome {
        priority: Priority::High,
        issue: format!(
            "Average job duration differs by {ratio:.1}x ({avg_a:.0}s vs {avg_b:.0}s); \
             run {slower} is markedly slower."
        ),
        suggestion: "Inspect the slower run's longest stages for skew, spill, or reduced \
                     executor parallelism."
            .to_string(),
        config: None,
    })
}

fn shuffle_skew(ctx: &RuleContext<'_>) -> Option<RuleOutcome> {
    let threshold_bytes = ctx.options.shuffle_threshold_gb * 1024.0 * 1024.0 * 1024.0;
    let worst = worst_skewed_stage(&ctx.run_a.stages, "A", threshold_bytes, ctx)
        .into_iter()
        .chain(worst_skewed_stage(&ctx.run_b.stages, "B", threshold_bytes, ctx))
        .max_by(|x, y| x.1.partial_cmp(&y.1).unwrap_or(std::cmp::Ordering::Equal))?;
    let (label, ratio, name) = worst;
    let priority = if ratio >= 2.0 * ctx.options.skew_ratio_threshold {
        Priority::High
    } else {
        Priority::Medium
    };
    Some(RuleOutcome {
        priority,
        issue: format!(
            "Stage \"{name}\" in run {label} shows task-level shuffle-write skew: the \
             largest task wrote {ratio:.1}x the median."
        ),
        suggestion: "Repartition on a higher-cardinality key or salt the hot keys so shuffle \
                     write spreads evenly across tasks."
            .to_string(),
        config: None,
    })
}

/// Worst skew offender in one run: `(run label, max/median ratio, name)`
/// among stages above the shuffle-volume floor.
fn worst_skewed_stage<'a>(
    stages: &'a [StageRecord],
    label: &'static str,
    threshold_bytes: f64,
    ctx: &RuleContext<'_>,
) -> Option<(&'static str, f64, &'a str)> {
    stages
        .iter()
        .filter(|s| s.metrics.shuffle_write_bytes as f64 >= threshold_bytes)
        .filter_map(|s| {
            let median = s.metrics.shuffle_write_median_task_bytes?;
            let max = s.metrics.shuffle_write_max_task_bytes?;
            if median == 0 {
                return None;
            }
            let ratio = max as f64 / median as f64;
            (ratio > ctx.options.skew_ratio_threshold).then_some((label, ratio, s.name.as_str()))
        })
        .max_by(|x, y| x.1.partial_cmp(&y.1).unwrap_or(std::cmp::Ordering::Equal))
}

/// Executors needed to finish a stage's task time within the target
/// duration, at run B's cores-per-executor.
fn stage_executor_demand(stage: &StageRecord, ctx: &RuleContext<'_>) -> u64 {
    let executors = &ctx.aggregates_b.executors;
    let cores_per_executor = if executors.executor_count == 0 {
        4.0
    } else {
        safe_ratio(executors.total_cores as f64, executors.executor_count as f64).max(1.0)
    };
    let target_ms = f64::from(ctx.options.target_stage_duration_minutes) * 60_000.0;
    let demand = stage.metrics.executor_run_time_ms as f64 / (target_ms * cores_per_executor);
    demand.ceil() as u64
}

fn dynamic_allocation_enabled(ctx: &RuleContext<'_>) -> bool {
    ctx.run_b
        .environment
        .spark_properties
        .get(DYNAMIC_ALLOCATION_ENABLED)
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

fn parsed_property(ctx: &RuleContext<'_>, name: &str) -> Option<u64> {
    ctx.run_b
        .environment
        .spark_properties
        .get(name)
        .and_then(|v| v.parse::<u64>().ok())
}

fn auto_scaling_initial(ctx: &RuleContext<'_>) -> Option<RuleOutcome> {
    if !dynamic_allocation_enabled(ctx) {
        return None;
    }
    let first_stage = ctx
        .run_b
        .stages
        .iter()
        .min_by_key(|s| (s.submission_time, s.stage_id))?;
    let demand = stage_executor_demand(first_stage, ctx);
    if demand == 0 {
        return None;
    }
    let current = parsed_property(ctx, INITIAL_EXECUTORS);
    if current.is_some_and(|v| v >= demand) {
        return None;
    }
    Some(RuleOutcome {
        priority: Priority::Medium,
        issue: format!(
            "Run B's first stage needs roughly {demand} executors to hit the target \
             duration, but {INITIAL_EXECUTORS} is {}.",
            current.map_or_else(|| "unset".to_string(), |v| v.to_string())
        ),
        suggestion: "Raise the initial executor count so early stages do not wait for \
                     scale-up."
            .to_string(),
        config: Some(ConfigAdvice {
            parameter: INITIAL_EXECUTORS.to_string(),
            current: ctx
                .run_b
                .environment
                .spark_properties
                .get(INITIAL_EXECUTORS)
                .cloned(),
            recommended: demand.to_string(),
        }),
    })
}

fn auto_scaling_max(ctx: &RuleContext<'_>) -> Option<RuleOutcome> {
    if !dynamic_allocation_enabled(ctx) {
        return None;
    }
    let peak_demand = ctx
        .run_b
        .stages
        .iter()
        .map(|s| stage_executor_demand(s, ctx))
        .max()
        .filter(|&d| d > 0)?;
    let current = parsed_property(ctx, MAX_EXECUTORS);
    // Diverges when the cap is below peak demand or more than twice it.
    let diverges = current.is_none_or(|v| v < peak_demand || v > peak_demand * 2);
    if !diverges {
        return None;
    }
    Some(RuleOutcome {
        priority: Priority::Medium,
        issue: format!(
            "Run B's peak stage demand is roughly {peak_demand} executors, but \
             {MAX_EXECUTORS} is {}.",
            current.map_or_else(|| "unset".to_string(), |v| v.to_string())
        ),
        suggestion: "Set the executor cap near peak demand: lower caps throttle wide \
                     stages, far higher caps waste cluster quota."
            .to_string(),
        config: Some(ConfigAdvice {
            parameter: MAX_EXECUTORS.to_string(),
            current: ctx
                .run_b
                .environment
                .spark_properties
                .get(MAX_EXECUTORS)
                .cloned(),
            recommended: peak_demand.to_string(),
        }),
    })
}

fn resource_allocation(ctx: &RuleContext<'_>) -> Option<RuleOutcome> {
    let cores_ratio = divergence_ratio(
        ctx.aggregates_a.executors.total_cores as f64,
        ctx.aggregates_b.executors.total_cores as f64,
    );
    let memory_ratio = divergence_ratio(
        ctx.aggregates_a.executors.average_memory_per_executor_mb,
        ctx.aggregates_b.executors.average_memory_per_executor_mb,
    );
    let (resource, ratio) = match (cores_ratio, memory_ratio) {
        (Some(c), _) if c > 1.5 => ("total cores granted", c),
        (_, Some(m)) if m > 1.5 => ("memory per executor", m),
        _ => return None,
    };
    Some(RuleOutcome {
        priority: Priority::Medium,
        issue: format!(
            "The runs differ {ratio:.1}x in {resource}; metric differences may reflect \
             allocation rather than workload."
        ),
        suggestion: "Align executor cores and memory between runs before drawing tuning \
                     conclusions."
            .to_string(),
        config: None,
    })
}

fn memory_spill(ctx: &RuleContext<'_>) -> Option<RuleOutcome> {
    let spill_a = (ctx.aggregates_a.stages.memory_spilled_bytes
        + ctx.aggregates_a.stages.disk_spilled_bytes) as f64;
    let spill_b = (ctx.aggregates_b.stages.memory_spilled_bytes
        + ctx.aggregates_b.stages.disk_spilled_bytes) as f64;
    let ratio = divergence_ratio(spill_a, spill_b)?;
    if ratio <= 2.0 {
        return None;
    }
    let heavier = if spill_b > spill_a { "B" } else { "A" };
    Some(RuleOutcome {
        priority: Priority::High,
        issue: format!(
            "Run {heavier} spilled {ratio:.1}x more bytes to memory/disk than the other run."
        ),
        suggestion: "Increase executor memory or spark.sql.shuffle.partitions for the \
                     heavier run so operators stay in memory."
            .to_string(),
        config: None,
    })
}

fn gc_pressure(ctx: &RuleContext<'_>) -> Option<RuleOutcome> {
    let share_a = ctx.aggregates_a.executors.gc_time_share();
    let share_b = ctx.aggregates_b.executors.gc_time_share();
    let worst = share_a.max(share_b);
    if worst <= 0.2 {
        return None;
    }
    let label = if share_b >= share_a { "B" } else { "A" };
    Some(RuleOutcome {
        priority: Priority::High,
        issue: format!(
            "Run {label} spent {:.0}% of task time in garbage collection.",
            worst * 100.0
        ),
        suggestion: "Increase executor memory or reduce cached data; GC above 20% of task \
                     time usually means heap pressure."
            .to_string(),
        config: None,
    })
}

fn task_reliability(ctx: &RuleContext<'_>) -> Option<RuleOutcome> {
    let failed_a = ctx.aggregates_a.stages.failed_tasks;
    let failed_b = ctx.aggregates_b.stages.failed_tasks;
    if failed_a == 0 && failed_b == 0 {
        return None;
    }
    let triggered = match divergence_ratio(failed_a as f64, failed_b as f64) {
        Some(ratio) => ratio > 2.0,
        // One side failure-free: any failures on the other are a regression.
        None => failed_a.max(failed_b) > 0,
    };
    if !triggered {
        return None;
    }
    let worse = if failed_b > failed_a { "B" } else { "A" };
    Some(RuleOutcome {
        priority: Priority::Critical,
        issue: format!(
            "Task failures diverge sharply ({failed_a} vs {failed_b}); run {worse} is \
             retrying significant work."
        ),
        suggestion: "Check the failing run's executor logs for OOM kills, fetch failures, \
                     or preemption before trusting its timings."
            .to_string(),
        config: None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::snapshot::{TimelineEvent, TimelineSample};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn timeline(counts: &[u32]) -> Vec<TimelineSample> {
        counts
            .iter()
            .enumerate()
            .map(|(i, &c)| TimelineSample {
                timestamp: Utc
                    .with_ymd_and_hms(2026, 3, 14, 9, 0, 0)
                    .single()
                    .unwrap()
                    + chrono::Duration::minutes(i as i64),
                active_executors: c,
                total_cores: c * 4,
                total_memory_mb: f64::from(c) * 4096.0,
                event: TimelineEvent::ExecutorAdded,
            })
            .collect()
    }

    fn snapshot(id: &str, executor_counts: &[u32]) -> ApplicationSnapshot {
        ApplicationSnapshot::builder(id, "etl")
            .timeline(timeline(executor_counts))
            .build()
            .unwrap()
    }

    fn eval_with(
        run_a: &ApplicationSnapshot,
        run_b: &ApplicationSnapshot,
        options: &CompareOptions,
    ) -> Vec<Recommendation> {
        let aggregates_a = RunAggregates::from_snapshot(run_a);
        let aggregates_b = RunAggregates::from_snapshot(run_b);
        evaluate_rules(&RuleContext {
            run_a,
            run_b,
            aggregates_a: &aggregates_a,
            aggregates_b: &aggregates_b,
            options,
        })
    }

    #[test]
    fn test_priority_order() {
        assert!(Priority::Critical < Priority::High);
        assert!(Priority::High < Priority::Medium);
        assert!(Priority::Medium < Priority::Low);
    }

    #[test]
    fn test_identical_runs_no_recommendations() {
        let run = snapshot("app-1", &[4, 4, 4]);
        let recs = eval_with(&run, &run.clone(), &CompareOptions::default());
        assert!(recs.is_empty());
    }

    #[test]
    fn test_executor_scarcity_flags_high() {
        // B averages 0.4x of A's executors.
        let run_a = snapshot("app-1", &[10, 10, 10]);
        let run_b = snapshot("app-2", &[4, 4, 4]);
        let recs = eval_with(&run_a, &run_b, &CompareOptions::default());
        let scaling = recs.iter().find(|r| r.kind == "executor_scaling").unwrap();
        assert_eq!(scaling.priority, Priority::High);
        assert!(scaling.issue.contains("0.40"));
        let config = scaling.config.as_ref().unwrap();
        assert_eq!(config.parameter, "spark.executor.instances");
        assert_eq!(config.recommended, "10");
    }

    #[test]
    fn test_executor_ratio_within_band_silent() {
        let run_a = snapshot("app-1", &[10, 10]);
        let run_b = snapshot("app-2", &[6, 6]);
        let recs = eval_with(&run_a, &run_b, &CompareOptions::default());
        assert!(recs.iter().all(|r| r.kind != "executor_scaling"));
    }

    #[test]
    fn test_oversized_run_also_flags() {
        let run_a = snapshot("app-1", &[4, 4]);
        let run_b = snapshot("app-2", &[12, 12]);
        let recs = eval_with(&run_a, &run_b, &CompareOptions::default());
        let scaling = recs.iter().find(|r| r.kind == "executor_scaling").unwrap();
        assert!(scaling.issue.contains("3.00"));
        assert!(scaling.suggestion.starts_with("Decrease"));
    }

    #[test]
    fn test_job_complexity_threshold() {
        let mut run_a = snapshot("app-1", &[4, 4]);
        let mut run_b = snapshot("app-2", &[4, 4]);
        run_a.jobs = (0..2).map(|i| job(i, 60)).collect();
        run_b.jobs = (0..6).map(|i| job(i, 60)).collect();
        let recs = eval_with(&run_a, &run_b, &CompareOptions::default());
        let complexity = recs.iter().find(|r| r.kind == "job_complexity").unwrap();
        assert_eq!(complexity.priority, Priority::Medium);
        assert!(complexity.issue.contains("3.0x"));
    }

    #[test]
    fn test_job_performance_ratio() {
        let mut run_a = snapshot("app-1", &[4, 4]);
        let mut run_b = snapshot("app-2", &[4, 4]);
        run_a.jobs = vec![job(0, 100)];
        run_b.jobs = vec![job(0, 250)];
        let recs = eval_with(&run_a, &run_b, &CompareOptions::default());
        let perf = recs.iter().find(|r| r.kind == "job_performance").unwrap();
        assert_eq!(perf.priority, Priority::High);
        assert!(perf.issue.contains("2.5x"));
        assert!(perf.issue.contains("run B"));
    }

    fn job(id: i64, duration_secs: i64) -> crate::snapshot::JobRecord {
        let base = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).single().unwrap();
        crate::snapshot::JobRecord {
            job_id: id,
            name: format!("job {id}"),
            status: crate::snapshot::JobStatus::Succeeded,
            submission_time: Some(base),
            completion_time: Some(base + chrono::Duration::seconds(duration_secs)),
        }
    }

    fn skewed_stage(name: &str, shuffle_gb: u64, median: u64, max: u64) -> StageRecord {
        let mut stage = StageRecord::named(0, name);
        stage.metrics.shuffle_write_bytes = shuffle_gb * 1024 * 1024 * 1024;
        stage.metrics.shuffle_write_median_task_bytes = Some(median);
        stage.metrics.shuffle_write_max_task_bytes = Some(max);
        stage
    }

    #[test]
    fn test_shuffle_skew_priorities() {
        let mut run_a = snapshot("app-1", &[4, 4]);
        let run_b = snapshot("app-2", &[4, 4]);
        // Ratio 5.0 >= 2 * default threshold 2.0: High.
        run_a.stages = vec![skewed_stage("join at Merge.scala:9", 20, 1000, 5000)];
        let recs = eval_with(&run_a, &run_b, &CompareOptions::default());
        let skew = recs.iter().find(|r| r.kind == "shuffle_skew").unwrap();
        assert_eq!(skew.priority, Priority::High);
        assert!(skew.issue.contains("5.0x"));
        assert!(skew.issue.contains("join at Merge.scala:9"));

        // Ratio 3.0 between threshold and 2x threshold: Medium.
        run_a.stages = vec![skewed_stage("join at Merge.scala:9", 20, 1000, 3000)];
        let recs = eval_with(&run_a, &run_b, &CompareOptions::default());
        let skew = recs.iter().find(|r| r.kind == "shuffle_skew").unwrap();
        assert_eq!(skew.priority, Priority::Medium);
    }

    #[test]
    fn test_shuffle_skew_volume_floor() {
        let mut run_a = snapshot("app-1", &[4, 4]);
        let run_b = snapshot("app-2", &[4, 4]);
        // Heavy skew but only 1 GB written: below the 10 GB floor.
        run_a.stages = vec![skewed_stage("join", 1, 1000, 9000)];
        let recs = eval_with(&run_a, &run_b, &CompareOptions::default());
        assert!(recs.iter().all(|r| r.kind != "shuffle_skew"));
    }

    #[test]
    fn test_auto_scaling_requires_dynamic_allocation() {
        let mut run_b = snapshot("app-2", &[4, 4]);
        let mut stage = StageRecord::named(0, "scan");
        stage.metrics.executor_run_time_ms = 100_000_000;
        run_b.stages = vec![stage];
        run_b.executors = vec![crate::snapshot::ExecutorRecord::named("1", 4)];
        let run_a = snapshot("app-1", &[4, 4]);
        let recs = eval_with(&run_a, &run_b, &CompareOptions::default());
        assert!(recs.iter().all(|r| r.kind != "auto_scaling"));
    }

    #[test]
    fn test_auto_scaling_initial_and_max() {
        let run_a = snapshot("app-1", &[4, 4]);
        let mut run_b = snapshot("app-2", &[4, 4]);
        let mut stage = StageRecord::named(0, "scan");
        // 100M ms of task time / (2 min * 4 cores) => 209 executors.
        stage.metrics.executor_run_time_ms = 100_000_000;
        run_b.stages = vec![stage];
        run_b.executors = vec![crate::snapshot::ExecutorRecord::named("1", 4)];
        run_b
            .environment
            .spark_properties
            .insert(DYNAMIC_ALLOCATION_ENABLED.to_string(), "true".to_string());
        run_b
            .environment
            .spark_properties
            .insert(INITIAL_EXECUTORS.to_string(), "2".to_string());

        let recs = eval_with(&run_a, &run_b, &CompareOptions::default());
        let initial = recs
            .iter()
            .find(|r| r.subtype.as_deref() == Some("initial_executors"))
            .unwrap();
        assert_eq!(initial.priority, Priority::Medium);
        assert_eq!(initial.config.as_ref().unwrap().current.as_deref(), Some("2"));
        let max = recs
            .iter()
            .find(|r| r.subtype.as_deref() == Some("max_executors"))
            .unwrap();
        assert!(max.issue.contains("unset"));
    }

    #[test]
    fn test_auto_scaling_satisfied_config_silent() {
        let run_a = snapshot("app-1", &[4, 4]);
        let mut run_b = snapshot("app-2", &[4, 4]);
        let mut stage = StageRecord::named(0, "scan");
        // Demand: 960_000 / (120_000 * 4) = 2 executors.
        stage.metrics.executor_run_time_ms = 960_000;
        run_b.stages = vec![stage];
        run_b.executors = vec![crate::snapshot::ExecutorRecord::named("1", 4)];
        for (key, value) in [
            (DYNAMIC_ALLOCATION_ENABLED, "true"),
            (INITIAL_EXECUTORS, "4"),
            (MAX_EXECUTORS, "3"),
        ] {
            run_b
                .environment
                .spark_properties
                .insert(key.to_string(), value.to_string());
        }
        let recs = eval_with(&run_a, &run_b, &CompareOptions::default());
        assert!(recs.iter().all(|r| r.kind != "auto_scaling"));
    }

    #[test]
    fn test_memory_spill_rule() {
        let mut run_a = snapshot("app-1", &[4, 4]);
        let mut run_b = snapshot("app-2", &[4, 4]);
        let mut stage_a = StageRecord::named(0, "join");
        stage_a.metrics.disk_spilled_bytes = 1_000;
        let mut stage_b = StageRecord::named(0, "join");
        stage_b.metrics.disk_spilled_bytes = 5_000;
        run_a.stages = vec![stage_a];
        run_b.stages = vec![stage_b];
        let recs = eval_with(&run_a, &run_b, &CompareOptions::default());
        let spill = recs.iter().find(|r| r.kind == "memory_spill").unwrap();
        assert_eq!(spill.priority, Priority::High);
        assert!(spill.issue.contains("Run B"));
        assert!(spill.issue.contains("5.0x"));
    }

    #[test]
    fn test_gc_pressure_rule() {
        let mut run_a = snapshot("app-1", &[4, 4]);
        let run_b = snapshot("app-2", &[4, 4]);
        let mut executor = crate::snapshot::ExecutorRecord::named("1", 4);
        executor.total_duration_ms = 1000;
        executor.total_gc_time_ms = 300;
        run_a.executors = vec![executor];
        let recs = eval_with(&run_a, &run_b, &CompareOptions::default());
        let gc = recs.iter().find(|r| r.kind == "gc_pressure").unwrap();
        assert_eq!(gc.priority, Priority::High);
        assert!(gc.issue.contains("30%"));
        assert!(gc.issue.contains("Run A"));
    }

    #[test]
    fn test_task_reliability_rule() {
        let mut run_a = snapshot("app-1", &[4, 4]);
        let mut run_b = snapshot("app-2", &[4, 4]);
        let mut stage_a = StageRecord::named(0, "scan");
        stage_a.metrics.num_failed_tasks = 2;
        let mut stage_b = StageRecord::named(0, "scan");
        stage_b.metrics.num_failed_tasks = 50;
        run_a.stages = vec![stage_a];
        run_b.stages = vec![stage_b];
        let recs = eval_with(&run_a, &run_b, &CompareOptions::default());
        let reliability = recs.iter().find(|r| r.kind == "task_reliability").unwrap();
        assert_eq!(reliability.priority, Priority::Critical);
        // Critical sorts first.
        assert_eq!(recs[0].kind, "task_reliability");
    }

    #[test]
    fn test_task_reliability_one_sided_failures() {
        let mut run_a = snapshot("app-1", &[4, 4]);
        let run_b = snapshot("app-2", &[4, 4]);
        let mut stage = StageRecord::named(0, "scan");
        stage.metrics.num_failed_tasks = 10;
        run_a.stages = vec![stage];
        let recs = eval_with(&run_a, &run_b, &CompareOptions::default());
        assert!(recs.iter().any(|r| r.kind == "task_reliability"));
    }

    #[test]
    fn test_dedupe_by_kind_and_subtype() {
        let make = |kind: &str, subtype: Option<&str>| Recommendation {
            kind: kind.to_string(),
            subtype: subtype.map(str::to_string),
            priority: Priority::Medium,
            issue: String::new(),
            suggestion: String::new(),
            config: None,
        };
        let mut recs = vec![
            make("auto_scaling", Some("initial_executors")),
            make("auto_scaling", Some("max_executors")),
            make("auto_scaling", Some("initial_executors")),
            make("gc_pressure", None),
        ];
        dedupe_recommendations(&mut recs);
        assert_eq!(recs.len(), 3);
    }

    #[test]
    fn test_priority_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&Priority::Critical).unwrap(),
            "\"critical\""
        );
    }
}
