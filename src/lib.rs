//! Comparative performance analysis engine for Spark application runs.
//!
//! Given two [`snapshot::ApplicationSnapshot`]s of independently executed
//! batch jobs, the engine produces a structured differential report:
//!
//! - matches equivalent stages across runs whose internal ids differ
//! - computes metric diffs filtered by a significance threshold
//! - merges fine-grained executor-timeline samples into readable intervals
//! - derives prioritized, rule-based tuning recommendations
//!
//! # Example
//!
//! ```
//! use spark_compare::options::CompareOptions;
//! use spark_compare::report::compare_snapshots;
//! use spark_compare::snapshot::ApplicationSnapshot;
//!
//! let run_a = ApplicationSnapshot::builder("app-001", "nightly etl").build()?;
//! let run_b = ApplicationSnapshot::builder("app-002", "nightly etl").build()?;
//!
//! let report = compare_snapshots(&run_a, &run_b, &CompareOptions::default())?;
//! assert_eq!(report.applications.run_a.id, "app-001");
//! # Ok::<(), spark_compare::error::EngineError>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! ApplicationSnapshot x2
//!        │
//!        ├──▶ aggregate ──▶ diff (significance filter) ─┐
//!        ├──▶ matching  (stage pairing)                 ├──▶ recommend ──▶ report
//!        └──▶ timeline  (interval merge + pairing)     ─┘
//! ```
//!
//! The engine is synchronous and side-effect free: inputs are immutable,
//! every comparison is a bounded in-memory computation, and concurrent
//! invocations need no coordination. Fetching snapshots from a history
//! service, CLI/MCP front ends, and on-disk caching all live outside this
//! crate.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod aggregate;
pub mod diff;
pub mod error;
pub mod matching;
pub mod options;
pub mod recommend;
pub mod report;
pub mod snapshot;
pub mod timeline;
