//! Option validation.
//!
//! Range checks for [`CompareOptions`], run once at the engine entry point.

use super::CompareOptions;
use crate::error::OptionsError;

/// Maximum allowed comparison granularity (one day).
pub const MAX_INTERVAL_MINUTES: u32 = 1440;

/// Minimum allowed ratio-style threshold (skew).
pub const MIN_RATIO_THRESHOLD: f64 = 1.0;

/// Validate option values.
///
/// # Errors
///
/// Returns [`OptionsError::InvalidValue`] if any value is out of range:
/// - `significance_threshold` must be in (0, 1]
/// - `similarity_threshold` must be in (0, 1]
/// - `interval_minutes` must be between 1 and 1440
/// - `shuffle_threshold_gb` must be finite and non-negative
/// - `skew_ratio_threshold` must be at least 1.0
/// - `target_stage_duration_minutes` must be nonzero
/// - `top_n`, when set, must be nonzero
pub fn validate(options: &CompareOptions) -> Result<(), OptionsError> {
    check_unit_range("significance_threshold", options.significance_threshold)?;
    check_unit_range("similarity_threshold", options.similarity_threshold)?;

    if options.interval_minutes == 0 || options.interval_minutes > MAX_INTERVAL_MINUTES {
        return Err(OptionsError::InvalidValue {
            option: "interval_minutes".into(),
            reason: format!("must be between 1 and {MAX_INTERVAL_MINUTES}"),
        });
    }

    if !options.shuffle_threshold_gb.is_finite() || options.shuffle_threshold_gb < 0.0 {
        return Err(OptionsError::InvalidValue {
            option: "shuffle_threshold_gb".into(),
            reason: "must be finite and non-negative".into(),
        });
    }

    if !options.skew_ratio_threshold.is_finite()
        || options.skew_ratio_threshold < MIN_RATIO_THRESHOLD
    {
        return Err(OptionsError::InvalidValue {
            option: "skew_ratio_threshold".into(),
            reason: format!("must be at least {MIN_RATIO_THRESHOLD}"),
        });
    }

    if options.target_stage_duration_minutes == 0 {
        return Err(OptionsError::InvalidValue {
            option: "target_stage_duration_minutes".into(),
            reason: "must be nonzero".into(),
        });
    }

    if options.top_n == Some(0) {
        return Err(OptionsError::InvalidValue {
            option: "top_n".into(),
            reason: "must be nonzero when set".into(),
        });
    }

    Ok(())
}

fn check_unit_range(option: &str, value: f64) -> Result<(), OptionsError> {
    if !value.is_finite() || value <= 0.0 || value > 1.0 {
        return Err(OptionsError::InvalidValue {
            option: option.into(),
            reason: "must be in (0, 1]".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_default_options_valid() {
        assert!(validate(&CompareOptions::default()).is_ok());
    }

    #[test_case(0.0 ; "zero")]
    #[test_case(-0.1 ; "negative")]
    #[test_case(1.5 ; "above one")]
    #[test_case(f64::NAN ; "nan")]
    fn test_significance_threshold_rejected(value: f64) {
        let opts = CompareOptions {
            significance_threshold: value,
            ..CompareOptions::default()
        };
        let err = validate(&opts).unwrap_err();
        assert!(
            matches!(err, OptionsError::InvalidValue { option, .. } if option == "significance_threshold")
        );
    }

    #[test_case(0.0 ; "zero")]
    #[test_case(1.01 ; "above one")]
    fn test_similarity_threshold_rejected(value: f64) {
        let opts = CompareOptions {
            similarity_threshold: value,
            ..CompareOptions::default()
        };
        assert!(validate(&opts).is_err());
    }

    #[test]
    fn test_boundary_thresholds_accepted() {
        let opts = CompareOptions {
            significance_threshold: 1.0,
            similarity_threshold: 1.0,
            ..CompareOptions::default()
        };
        assert!(validate(&opts).is_ok());
    }

    #[test_case(0 ; "zero")]
    #[test_case(MAX_INTERVAL_MINUTES + 1 ; "above max")]
    fn test_interval_minutes_rejected(value: u32) {
        let opts = CompareOptions {
            interval_minutes: value,
            ..CompareOptions::default()
        };
        let err = validate(&opts).unwrap_err();
        assert!(
            matches!(err, OptionsError::InvalidValue { option, .. } if option == "interval_minutes")
        );
    }

    #[test]
    fn test_interval_minutes_boundary() {
        let opts = CompareOptions {
            interval_minutes: MAX_INTERVAL_MINUTES,
            ..CompareOptions::default()
        };
        assert!(validate(&opts).is_ok());
    }

    #[test]
    fn test_negative_shuffle_threshold_rejected() {
        let opts = CompareOptions {
            shuffle_threshold_gb: -1.0,
            ..CompareOptions::default()
        };
        assert!(validate(&opts).is_err());
    }

    #[test]
    fn test_zero_shuffle_threshold_accepted() {
        let opts = CompareOptions {
            shuffle_threshold_gb: 0.0,
            ..CompareOptions::default()
        };
        assert!(validate(&opts).is_ok());
    }

    #[test]
    fn test_skew_ratio_below_one_rejected() {
        let opts = CompareOptions {
            skew_ratio_threshold: 0.9,
            ..CompareOptions::default()
        };
        let err = validate(&opts).unwrap_err();
        assert!(
            matches!(err, OptionsError::InvalidValue { option, .. } if option == "skew_ratio_threshold")
        );
    }

    #[test]
    fn test_zero_target_duration_rejected() {
        let opts = CompareOptions {
            target_stage_duration_minutes: 0,
            ..CompareOptions::default()
        };
        assert!(validate(&opts).is_err());
    }

    #[test]
    fn test_zero_top_n_rejected() {
        let opts = CompareOptions {
            top_n: Some(0),
            ..CompareOptions::default()
        };
        let err = validate(&opts).unwrap_err();
        assert!(matches!(err, OptionsError::InvalidValue { option, .. } if option == "top_n"));
    }
}
