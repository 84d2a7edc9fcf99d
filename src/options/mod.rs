//! Comparison options.
//!
//! [`CompareOptions`] is the configuration record recognized by the engine.
//! All fields have serde defaults, so an embedding layer can deserialize a
//! partial JSON object (or use [`CompareOptions::default`]) and tighten
//! individual knobs. Validation lives in [`validate`]; the engine validates
//! once at the entry point.
//!
//! # Example
//!
//! ```
//! use spark_compare::options::CompareOptions;
//!
//! let opts: CompareOptions =
//!     serde_json::from_str(r#"{"similarity_threshold": 0.5, "top_n": 5}"#)?;
//! assert!((opts.significance_threshold - 0.1).abs() < f64::EPSILON);
//! assert_eq!(opts.top_n, Some(5));
//! opts.validate()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod validation;

pub use validation::{validate, MAX_INTERVAL_MINUTES, MIN_RATIO_THRESHOLD};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::OptionsError;

/// Default minimum relative change for a metric diff to be surfaced.
pub const DEFAULT_SIGNIFICANCE_THRESHOLD: f64 = 0.1;

/// Default minimum similarity for stage pairing.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.6;

/// Default timeline comparison granularity in minutes.
pub const DEFAULT_INTERVAL_MINUTES: u32 = 1;

/// Default minimum per-stage shuffle write (GB) for skew analysis.
pub const DEFAULT_SHUFFLE_THRESHOLD_GB: f64 = 10.0;

/// Default max/median shuffle-write ratio that flags skew.
pub const DEFAULT_SKEW_RATIO_THRESHOLD: f64 = 2.0;

/// Default target stage duration (minutes) for auto-scaling advice.
pub const DEFAULT_TARGET_STAGE_DURATION_MINUTES: u32 = 2;

/// Engine configuration record.
///
/// Thresholds are relative changes (0.1 = 10%), not confidence intervals;
/// the engine's "significance" is deliberately informal (see crate docs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct CompareOptions {
    /// Minimum relative change for a metric diff to be marked significant.
    pub significance_threshold: f64,
    /// Minimum combined similarity score for a stage pair to be accepted.
    pub similarity_threshold: f64,
    /// Granularity of paired timeline comparison rows, in minutes.
    pub interval_minutes: u32,
    /// Minimum per-stage shuffle write volume (GB) to analyze for skew.
    pub shuffle_threshold_gb: f64,
    /// Minimum max/median task shuffle-write ratio that flags skew.
    pub skew_ratio_threshold: f64,
    /// Target stage duration (minutes) used by auto-scaling advice.
    pub target_stage_duration_minutes: u32,
    /// Cap on recommendation and stage-diff list lengths. `None` = no cap.
    pub top_n: Option<usize>,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            significance_threshold: DEFAULT_SIGNIFICANCE_THRESHOLD,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            shuffle_threshold_gb: DEFAULT_SHUFFLE_THRESHOLD_GB,
            skew_ratio_threshold: DEFAULT_SKEW_RATIO_THRESHOLD,
            target_stage_duration_minutes: DEFAULT_TARGET_STAGE_DURATION_MINUTES,
            top_n: None,
        }
    }
}

impl CompareOptions {
    /// Validate all option values.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError::InvalidValue`] for the first out-of-range
    /// field (see [`validate`] for the ranges).
    pub fn validate(&self) -> Result<(), OptionsError> {
        validate(self)
    }
}
