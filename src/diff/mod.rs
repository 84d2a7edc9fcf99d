//! Metric diffing and the significance filter.
//!
//! Every numeric comparison in the engine funnels through
//! [`MetricDiff::compute`]: one metric, two values, one relative change, one
//! significance verdict. Reports only surface significant diffs, so a 10%
//! default threshold keeps noise (GC jitter, scheduler wobble) out of the
//! output while real regressions pass through.
//!
//! "Significance" here is a relative-change cutoff, not a statistical test.

use serde::{Deserialize, Serialize};

/// Denominator floor for relative change, so zero baselines stay finite.
pub const EPSILON: f64 = 1e-9;

/// How a metric's significance is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffStyle {
    /// Apply the significance threshold to the relative change.
    Absolute,
    /// Already a derived comparison (e.g. tasks per stage, GC share):
    /// retained whenever the values differ, bypassing the threshold.
    Ratio,
}

/// One compared metric across the two runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDiff {
    /// Metric name, e.g. `"shuffle_write_bytes"`.
    pub name: String,
    /// Value in run A.
    pub value_a: f64,
    /// Value in run B.
    pub value_b: f64,
    /// `|b − a| / max(|a|, ε)`.
    pub relative_change: f64,
    /// Whether the change clears the significance threshold.
    pub significant: bool,
}

impl MetricDiff {
    /// Compare one metric between runs.
    ///
    /// The relative change is `|b − a| / max(|a|, ε)`; an identical pair
    /// (including zero/zero) is never significant. For
    /// [`DiffStyle::Ratio`] metrics any nonzero change is retained
    /// regardless of the threshold.
    #[must_use]
    pub fn compute(
        name: impl Into<String>,
        value_a: f64,
        value_b: f64,
        style: DiffStyle,
        threshold: f64,
    ) -> Self {
        let relative_change = (value_b - value_a).abs() / value_a.abs().max(EPSILON);
        let significant = match style {
            DiffStyle::Absolute => relative_change >= threshold && relative_change > 0.0,
            DiffStyle::Ratio => relative_change > 0.0,
        };
        Self {
            name: name.into(),
            value_a,
            value_b,
            relative_change,
            significant,
        }
    }
}

/// A set of metric diffs for one comparison dimension.
///
/// Keeps every computed diff so reports can state "N of M significant"
/// and callers can re-filter without recomputing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffSet {
    diffs: Vec<MetricDiff>,
}

impl DiffSet {
    /// Wrap an already-computed diff list.
    #[must_use]
    pub fn new(diffs: Vec<MetricDiff>) -> Self {
        Self { diffs }
    }

    /// All diffs, significant or not.
    #[must_use]
    pub fn all(&self) -> &[MetricDiff] {
        &self.diffs
    }

    /// The significant diffs only.
    #[must_use]
    pub fn significant(&self) -> Vec<&MetricDiff> {
        self.diffs.iter().filter(|d| d.significant).collect()
    }

    /// Count of significant diffs.
    #[must_use]
    pub fn significant_count(&self) -> usize {
        self.diffs.iter().filter(|d| d.significant).count()
    }

    /// Total diff count.
    #[must_use]
    pub fn total(&self) -> usize {
        self.diffs.len()
    }

    /// Whether both sides are all-zero across the set. Used by the report
    /// composer to elide empty metric groups.
    #[must_use]
    pub fn is_all_zero(&self) -> bool {
        self.diffs
            .iter()
            .all(|d| d.value_a == 0.0 && d.value_b == 0.0)
    }

    /// Look up a diff by metric name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MetricDiff> {
        self.diffs.iter().find(|d| d.name == name)
    }

    /// Drop non-significant diffs in place. Applying this twice changes
    /// nothing.
    pub fn retain_significant(&mut self) {
        self.diffs.retain(|d| d.significant);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case(100.0, 105.0, false ; "five percent below threshold")]
    #[test_case(100.0, 110.0, true ; "ten percent at threshold")]
    #[test_case(100.0, 50.0, true ; "halved")]
    #[test_case(100.0, 100.0, false ; "identical")]
    #[test_case(0.0, 0.0, false ; "both zero")]
    fn test_absolute_significance(a: f64, b: f64, expected: bool) {
        let diff = MetricDiff::compute("m", a, b, DiffStyle::Absolute, 0.1);
        assert_eq!(diff.significant, expected);
    }

    #[test]
    fn test_zero_baseline_finite() {
        let diff = MetricDiff::compute("m", 0.0, 5.0, DiffStyle::Absolute, 0.1);
        assert!(diff.relative_change.is_finite());
        assert!(diff.significant);
    }

    #[test]
    fn test_ratio_style_bypasses_threshold() {
        let diff = MetricDiff::compute("skew_ratio", 2.0, 2.1, DiffStyle::Ratio, 0.9);
        assert!(diff.relative_change < 0.9);
        assert!(diff.significant);
    }

    #[test]
    fn test_ratio_style_equal_values_not_significant() {
        let diff = MetricDiff::compute("skew_ratio", 2.0, 2.0, DiffStyle::Ratio, 0.1);
        assert!(!diff.significant);
    }

    #[test]
    fn test_relative_change_value() {
        let diff = MetricDiff::compute("m", 200.0, 260.0, DiffStyle::Absolute, 0.1);
        assert!((diff.relative_change - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_diff_set_counts() {
        let set = DiffSet::new(vec![
            MetricDiff::compute("a", 100.0, 200.0, DiffStyle::Absolute, 0.1),
            MetricDiff::compute("b", 100.0, 101.0, DiffStyle::Absolute, 0.1),
        ]);
        assert_eq!(set.total(), 2);
        assert_eq!(set.significant_count(), 1);
        assert_eq!(set.significant()[0].name, "a");
    }

    #[test]
    fn test_retain_significant_idempotent() {
        let mut set = DiffSet::new(vec![
            MetricDiff::compute("a", 100.0, 200.0, DiffStyle::Absolute, 0.1),
            MetricDiff::compute("b", 100.0, 101.0, DiffStyle::Absolute, 0.1),
        ]);
        set.retain_significant();
        let once = set.clone();
        set.retain_significant();
        assert_eq!(set, once);
        assert_eq!(set.total(), 1);
    }

    #[test]
    fn test_all_zero_detection() {
        let zero = DiffSet::new(vec![MetricDiff::compute(
            "a",
            0.0,
            0.0,
            DiffStyle::Absolute,
            0.1,
        )]);
        assert!(zero.is_all_zero());
        let nonzero = DiffSet::new(vec![MetricDiff::compute(
            "a",
            0.0,
            1.0,
            DiffStyle::Absolute,
            0.1,
        )]);
        assert!(!nonzero.is_all_zero());
    }

    #[test]
    fn test_get_by_name() {
        let set = DiffSet::new(vec![MetricDiff::compute(
            "input_bytes",
            1.0,
            2.0,
            DiffStyle::Absolute,
            0.1,
        )]);
        assert!(set.get("input_bytes").is_some());
        assert!(set.get("output_bytes").is_none());
    }

    proptest! {
        // Lowering the threshold never demotes a significant diff.
        #[test]
        fn prop_significance_monotone_in_threshold(
            a in -1e12f64..1e12,
            b in -1e12f64..1e12,
            lo in 0.001f64..0.5,
            delta in 0.0f64..0.5,
        ) {
            let hi = lo + delta;
            let at_hi = MetricDiff::compute("m", a, b, DiffStyle::Absolute, hi);
            let at_lo = MetricDiff::compute("m", a, b, DiffStyle::Absolute, lo);
            if at_hi.significant {
                prop_assert!(at_lo.significant);
            }
        }

        // For a fixed baseline and threshold, growing the change never
        // turns a significant diff non-significant.
        #[test]
        fn prop_significance_monotone_in_change(
            a in -1e12f64..1e12,
            delta in 0.0f64..1e12,
            extra in 0.0f64..1e12,
            negative in any::<bool>(),
        ) {
            let sign = if negative { -1.0 } else { 1.0 };
            let near = MetricDiff::compute("m", a, a + sign * delta, DiffStyle::Absolute, 0.1);
            let far =
                MetricDiff::compute("m", a, a + sign * (delta + extra), DiffStyle::Absolute, 0.1);
            prop_assert!(far.relative_change >= near.relative_change);
            if near.significant {
                prop_assert!(far.significant);
            }
        }

        // Equal inputs are never significant, either style.
        #[test]
        fn prop_identity_never_significant(v in -1e12f64..1e12) {
            let abs = MetricDiff::compute("m", v, v, DiffStyle::Absolute, 0.1);
            let ratio = MetricDiff::compute("m", v, v, DiffStyle::Ratio, 0.1);
            prop_assert!(!abs.significant);
            prop_assert!(!ratio.significant);
            prop_assert_eq!(abs.relative_change, 0.0);
        }
    }
}
