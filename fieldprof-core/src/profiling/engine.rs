//! Single-pass profiling engine.
//!
//! One run moves through `Idle -> Collecting -> Finalizing` and ends in
//! `Completed`, `Cancelled` or `Failed`. Collection reads every record once,
//! feeding per-field collectors, the correlation row sample and the
//! validation counters. Finalization turns collector state into the report.

use chrono::Local;
use std::collections::HashSet;

use crate::error::ProfileError;
use crate::models::{FieldDomain, RecordId};
use crate::source::RecordSource;
use crate::validation::{ComparisonRuleEvaluator, RuleEvaluator, ValidationTracker};

use super::collector::FieldCollector;
use super::config::ProfilerConfig;
use super::correlation::CorrelationCollector;
use super::finalize::{FinalizeContext, finalize_field};
use super::models::{FieldReport, ProfileReport};
use super::task::TaskHandle;

/// Message of the report of a requested field missing from the schema.
pub const FIELD_NOT_FOUND: &str = "Field not found";

/// Progress published right before finalization starts.
const FINALIZING_PROGRESS: u8 = 90;

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No run started yet
    Idle,
    /// Reading records
    Collecting,
    /// Deriving statistics from collector state
    Finalizing,
    /// Report produced
    Completed,
    /// Stopped by the host
    Cancelled,
    /// Aborted by an error
    Failed,
}

/// What to profile.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Requested field names, in report order
    pub fields: Vec<String>,
    /// Restricts the pass to these records when set
    pub selection: Option<HashSet<RecordId>>,
    /// Validation rules evaluated once per row
    pub rules: Vec<String>,
}

impl RunRequest {
    /// Creates a request for `fields`.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Restricts the pass to the given record identifiers.
    pub fn with_selection(mut self, ids: impl IntoIterator<Item = RecordId>) -> Self {
        self.selection = Some(ids.into_iter().collect());
        self
    }

    /// Adds validation rules.
    pub fn with_rules<I, S>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules.extend(rules.into_iter().map(Into::into));
        self
    }
}

/// Terminal result of a run.
#[derive(Debug)]
pub enum RunOutcome {
    /// The pass finished; the report is handed over exactly once
    Completed(ProfileReport),
    /// The host cancelled the pass; there is no result
    Cancelled,
    /// The pass aborted; the reason is kept for diagnostics
    Failed(ProfileError),
}

impl RunOutcome {
    /// The report of a completed run.
    pub fn into_report(self) -> Option<ProfileReport> {
        match self {
            RunOutcome::Completed(report) => Some(report),
            RunOutcome::Cancelled | RunOutcome::Failed(_) => None,
        }
    }

    /// Whether the run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunOutcome::Cancelled)
    }

    /// The terminal state matching this outcome.
    pub fn state(&self) -> RunState {
        match self {
            RunOutcome::Completed(_) => RunState::Completed,
            RunOutcome::Cancelled => RunState::Cancelled,
            RunOutcome::Failed(_) => RunState::Failed,
        }
    }
}

/// Where a requested field's report comes from.
enum Slot {
    Missing,
    Collected(usize),
}

/// Runs profiling passes over record sources.
pub struct ProfilingEngine {
    config: ProfilerConfig,
    evaluator: Box<dyn RuleEvaluator>,
    state: RunState,
}

impl std::fmt::Debug for ProfilingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfilingEngine")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ProfilingEngine {
    /// Creates an engine using the built-in comparison rule evaluator.
    pub fn new(config: ProfilerConfig) -> Self {
        Self {
            config,
            evaluator: Box::new(ComparisonRuleEvaluator),
            state: RunState::Idle,
        }
    }

    /// Replaces the rule evaluator.
    pub fn with_evaluator(mut self, evaluator: Box<dyn RuleEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Engine configuration.
    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    /// State of the current or last run.
    pub fn state(&self) -> RunState {
        self.state
    }

    fn fail(&mut self, error: ProfileError) -> RunOutcome {
        tracing::error!("Profiling run failed: {}", error);
        self.state = RunState::Failed;
        RunOutcome::Failed(error)
    }

    fn cancelled(&mut self, rows: u64) -> RunOutcome {
        tracing::info!("Profiling run cancelled after {} rows", rows);
        self.state = RunState::Cancelled;
        RunOutcome::Cancelled
    }

    /// Profiles the requested fields of `source` in one pass.
    ///
    /// Cancellation is polled once per row through `task`; a cancelled run
    /// produces no report.
    pub fn run(
        &mut self,
        source: &mut dyn RecordSource,
        request: &RunRequest,
        task: &dyn TaskHandle,
    ) -> RunOutcome {
        self.state = RunState::Collecting;
        if let Err(e) = self.config.validate() {
            return self.fail(ProfileError::configuration(e.to_string()));
        }

        let schema = source.schema().to_vec();
        let mut requested: Vec<&str> = Vec::with_capacity(request.fields.len());
        for name in &request.fields {
            if !requested.contains(&name.as_str()) {
                requested.push(name);
            }
        }

        let mut slots = Vec::with_capacity(requested.len());
        let mut collectors: Vec<FieldCollector> = Vec::new();
        for name in &requested {
            match schema.iter().find(|f| f.name == *name) {
                Some(descriptor) => {
                    slots.push(Slot::Collected(collectors.len()));
                    collectors.push(FieldCollector::new(descriptor.clone(), &self.config));
                }
                None => {
                    tracing::warn!("Requested field '{}' not found in source", name);
                    slots.push(Slot::Missing);
                }
            }
        }

        let numeric: Vec<usize> = collectors
            .iter()
            .enumerate()
            .filter(|(_, c)| c.descriptor().domain == FieldDomain::Numeric)
            .map(|(i, _)| i)
            .collect();
        let mut correlation = (numeric.len() >= 2).then(|| {
            let names = numeric
                .iter()
                .map(|&i| collectors[i].descriptor().name.clone())
                .collect();
            CorrelationCollector::new(names, &self.config)
        });

        let mut validation = (!request.rules.is_empty()).then(|| {
            ValidationTracker::new(request.rules.clone(), self.evaluator.as_ref(), &schema)
        });

        let total = request
            .selection
            .as_ref()
            .map_or_else(|| source.record_count(), |ids| ids.len() as u64);
        tracing::info!(
            "Profiling {} fields over {} records",
            collectors.len(),
            total
        );

        let records = match source.records(request.selection.as_ref()) {
            Ok(records) => records,
            Err(e) => return self.fail(e),
        };

        let interval = self.config.progress_interval;
        let mut converted: Vec<Option<f64>> = vec![None; collectors.len()];
        let mut numeric_row: Vec<Option<f64>> = vec![None; numeric.len()];
        let mut rows = 0u64;

        for item in records {
            if task.is_cancelled() {
                return self.cancelled(rows);
            }
            let record = match item {
                Ok(record) => record,
                Err(e) => return self.fail(e),
            };
            rows += 1;

            for (collector, slot) in collectors.iter_mut().zip(converted.iter_mut()) {
                let index = collector.descriptor().index;
                *slot = collector.observe(record.id, record.value(index));
            }
            if let Some(correlation) = correlation.as_mut() {
                for (value, &i) in numeric_row.iter_mut().zip(&numeric) {
                    *value = converted[i];
                }
                correlation.observe(&numeric_row);
            }
            if let Some(validation) = validation.as_mut() {
                validation.observe(&record);
            }

            if rows % interval == 0 {
                let percent = progress_percent(rows, total);
                tracing::debug!("Processed {} of {} records ({}%)", rows, total, percent);
                task.report_progress(percent);
            }
        }

        if task.is_cancelled() {
            return self.cancelled(rows);
        }

        self.state = RunState::Finalizing;
        task.report_progress(FINALIZING_PROGRESS);

        let now = self
            .config
            .reference_time
            .unwrap_or_else(|| Local::now().naive_local());
        let ctx = FinalizeContext {
            options: &self.config.options,
            now,
            rows_analyzed: rows,
        };

        let fields = requested
            .iter()
            .zip(&slots)
            .map(|(name, slot)| {
                let report = match slot {
                    Slot::Missing => FieldReport::error(FIELD_NOT_FOUND),
                    Slot::Collected(i) => finalize_field(&collectors[*i], &ctx),
                };
                ((*name).to_string(), report)
            })
            .collect();

        let correlation = correlation
            .filter(|c| !c.is_empty())
            .map(CorrelationCollector::finish);
        let validation = validation.map(ValidationTracker::finish);

        task.report_progress(100);
        self.state = RunState::Completed;
        tracing::info!(
            "Profiling completed: {} fields, {} rows analyzed",
            requested.len(),
            rows
        );

        RunOutcome::Completed(ProfileReport {
            rows_analyzed: rows,
            fields,
            correlation,
            validation,
        })
    }
}

/// Share of `total` done after `rows`. Stays below [`FINALIZING_PROGRESS`]
/// so progress never moves backwards once finalization starts.
fn progress_percent(rows: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    (rows.saturating_mul(100) / total).min(u64::from(FINALIZING_PROGRESS - 1)) as u8
}
