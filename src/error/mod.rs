//! Error types for the comparison engine.
//!
//! Two kinds of failure exist:
//! - [`SnapshotError`]: malformed input snapshots. Fatal; raised to the
//!   caller immediately, the engine never computes over broken input.
//! - [`OptionsError`]: out-of-range configuration values.
//!
//! Domain-level "nothing matched" conditions (no stage pairs above the
//! similarity threshold, non-overlapping timelines) are *not* errors. They
//! are expected and common, and the rest of the report stays valid, so they
//! surface as `error`/`suggestion` fields inside the report instead.
//!
//! All errors implement `Send + Sync`.

use thiserror::Error;

/// Top-level engine error.
///
/// Returned by [`compare_snapshots`](crate::report::compare_snapshots) and
/// the snapshot construction boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Input snapshot is malformed.
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Configuration value is out of range.
    #[error("Options error: {0}")]
    Options(#[from] OptionsError),
}

/// Malformed input snapshot errors.
///
/// Raised from snapshot construction; the comparison algorithms assume
/// validated input and never re-check.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// A required field is missing or empty.
    #[error("Missing required field: {field}")]
    MissingField {
        /// The missing field name.
        field: String,
    },

    /// A field holds an invalid value.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        /// The field name.
        field: String,
        /// Why the value is invalid.
        reason: String,
    },

    /// Timeline samples are not in timestamp order.
    #[error("Timeline samples out of order at index {index}")]
    UnorderedTimeline {
        /// Index of the first sample earlier than its predecessor.
        index: usize,
    },
}

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OptionsError {
    /// Option value is out of range.
    #[error("Invalid value for {option}: {reason}")]
    InvalidValue {
        /// The option name.
        option: String,
        /// Why the value is invalid.
        reason: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;

    assert_impl_all!(EngineError: Send, Sync, std::error::Error, Clone);
    assert_impl_all!(SnapshotError: Send, Sync, std::error::Error, Clone);
    assert_impl_all!(OptionsError: Send, Sync, std::error::Error, Clone);

    #[test]
    fn test_engine_error_display_snapshot() {
        let err = EngineError::Snapshot(SnapshotError::MissingField {
            field: "id".to_string(),
        });
        assert_eq!(err.to_string(), "Snapshot error: Missing required field: id");
    }

    #[test]
    fn test_engine_error_display_options() {
        let err = EngineError::Options(OptionsError::InvalidValue {
            option: "significance_threshold".to_string(),
            reason: "must be positive".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Options error: Invalid value for significance_threshold: must be positive"
        );
    }

    #[test]
    fn test_snapshot_error_display_unordered() {
        let err = SnapshotError::UnorderedTimeline { index: 3 };
        assert_eq!(err.to_string(), "Timeline samples out of order at index 3");
    }

    #[test]
    fn test_engine_error_from_snapshot_error() {
        let err: EngineError = SnapshotError::MissingField {
            field: "name".to_string(),
        }
        .into();
        assert!(matches!(err, EngineError::Snapshot(_)));
    }

    #[test]
    fn test_engine_error_from_options_error() {
        let err: EngineError = OptionsError::InvalidValue {
            option: "top_n".to_string(),
            reason: "must be nonzero".to_string(),
        }
        .into();
        assert!(matches!(err, EngineError::Options(_)));
    }

    #[test]
    fn test_error_eq() {
        let a = SnapshotError::UnorderedTimeline { index: 1 };
        let b = SnapshotError::UnorderedTimeline { index: 1 };
        let c = SnapshotError::UnorderedTimeline { index: 2 };
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
