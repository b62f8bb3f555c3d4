//! Field profiling.
//!
//! This module implements the single-pass profiling run:
//! - **Collection**: per-field null accounting, exact running statistics and
//!   bounded reservoir samples
//! - **Finalization**: numeric, text and temporal statistics derived from
//!   collector state, scaled to the population when sampled
//! - **Correlation**: Pearson matrix over sampled complete numeric rows
//! - **Execution**: the engine state machine and its background task
//!
//! # Memory Guarantees
//! - Every per-field sample holds at most `max_exact_values` items
//! - Flagged record id lists hold at most `id_list_cap` ids
//! - Counters stay exact regardless of sampling
//!
//! # Example
//! ```rust,ignore
//! use fieldprof_core::profiling::{NoopTask, ProfilerConfig, ProfilingEngine, RunRequest};
//!
//! let mut engine = ProfilingEngine::new(ProfilerConfig::default());
//! let outcome = engine.run(&mut source, &RunRequest::new(["age", "name"]), &NoopTask);
//! if let Some(report) = outcome.into_report() {
//!     println!("{}", serde_json::to_string_pretty(&report)?);
//! }
//! ```

mod collector;
mod config;
mod correlation;
mod engine;
mod finalize;
mod hints;
mod models;
mod numeric;
pub mod stats;
mod task;
mod temporal;
mod text;

// Re-export public API
pub use collector::{FieldCollector, FlaggedRecords, TemporalExtrema, has_non_printable};
pub use config::{
    ConfigValidationError, DEFAULT_DECIMAL_PLACES, DEFAULT_ID_LIST_CAP, DEFAULT_LIMIT_UNIQUE,
    DEFAULT_PROGRESS_INTERVAL, ProfileOptions, ProfilerConfig,
};
pub use correlation::{CorrelationCollector, pearson_matrix};
pub use engine::{FIELD_NOT_FOUND, ProfilingEngine, RunOutcome, RunRequest, RunState};
pub use finalize::{ALL_NULL_STATUS, APPROXIMATED_METHOD, FinalizeContext, finalize_field};
pub use hints::{NO_HINT, type_mismatch_hint};
pub use models::{
    CorrelationBlock, FieldReport, FieldSideChannel, Histogram, OutlierBounds, ProfileReport,
    RuleParseError, Scale, StatKey, StatMap, StatValue, TopValue, ValidationBlock, format_real,
};
pub use task::{NoopTask, ProfilingTask, TaskHandle};
