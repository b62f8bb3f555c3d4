//! Core library of fieldprof, a streaming field profiler.
//!
//! The crate profiles the fields of tabular datasets too large to hold in
//! memory: one forward pass over a record source computes exact running
//! statistics and bounded uniform samples per field, then derives a report
//! of numeric, text and temporal statistics, a Pearson correlation matrix
//! and validation rule fail counts.
//!
//! # Guarantees
//! - Bounded memory: every sample and id list has a hard cap
//! - Counts that can be kept exactly are never estimated
//! - Sampled statistics are scaled to the population and marked `(Est.)`
//! - A cancelled run produces no partial result
//!
//! # Architecture
//! - [`source`]: read-only record cursors (in-memory, JSON Lines)
//! - [`sampling`]: Welford running statistics and reservoir sampling
//! - [`profiling`]: collectors, finalizers and the engine state machine
//! - [`validation`]: rule compilation and fail counting

pub mod error;
pub mod logging;
pub mod models;
pub mod profiling;
pub mod sampling;
pub mod source;
pub mod validation;

// Re-export commonly used types
pub use error::{ProfileError, Result};
pub use models::{FieldDescriptor, FieldDomain, FieldValue, Record, RecordId, TemporalValue};
pub use profiling::{
    NoopTask, ProfileOptions, ProfileReport, ProfilerConfig, ProfilingEngine, ProfilingTask,
    RunOutcome, RunRequest, StatKey, StatValue, TaskHandle,
};
pub use source::{JsonLinesSource, MemorySource, RecordSource};
pub use validation::{ComparisonRuleEvaluator, RowPredicate, RuleError, RuleEvaluator};
