//! Row validation rules.
//!
//! Rules are strings handed to a [`RuleEvaluator`], which compiles each of
//! them into a [`RowPredicate`] against the source schema. The engine only
//! sees the predicate interface; [`ComparisonRuleEvaluator`] is the built-in
//! implementation.
//!
//! Failure accounting:
//! - a predicate returning `false` is a failure
//! - a predicate returning an error is a failure
//! - a rule that does not parse fails on every row and is listed in the
//!   validation block's parse errors

mod comparison;

pub use comparison::ComparisonRuleEvaluator;

use thiserror::Error;

use crate::models::{FieldDescriptor, Record};
use crate::profiling::{RuleParseError, ValidationBlock};

/// Errors raised while compiling or evaluating a rule.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("Unknown field '{0}'")]
    UnknownField(String),

    #[error("Cannot evaluate rule: {0}")]
    Evaluation(String),
}

/// A compiled rule, evaluated once per row.
pub trait RowPredicate: Send {
    /// Returns whether `record` satisfies the rule.
    ///
    /// # Errors
    /// Returns an error when the rule cannot be evaluated for this row, for
    /// example when a value has the wrong type.
    fn evaluate(&self, record: &Record) -> Result<bool, RuleError>;
}

/// Compiles rule strings into predicates.
pub trait RuleEvaluator: Send + Sync {
    /// Compiles `rule` against the source schema.
    ///
    /// # Errors
    /// Returns an error if the rule is malformed or references an unknown
    /// field.
    fn compile(
        &self,
        rule: &str,
        schema: &[FieldDescriptor],
    ) -> Result<Box<dyn RowPredicate>, RuleError>;
}

/// Per-run fail counters for a list of rules.
pub struct ValidationTracker {
    rules: Vec<String>,
    predicates: Vec<Option<Box<dyn RowPredicate>>>,
    fail_counts: Vec<u64>,
    total_checked: u64,
    parse_errors: Vec<RuleParseError>,
}

impl std::fmt::Debug for ValidationTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationTracker")
            .field("rules", &self.rules)
            .field("fail_counts", &self.fail_counts)
            .field("total_checked", &self.total_checked)
            .field("parse_errors", &self.parse_errors)
            .finish_non_exhaustive()
    }
}

impl ValidationTracker {
    /// Compiles every rule. Rules that fail to compile are kept with a
    /// recorded parse error.
    pub fn new(rules: Vec<String>, evaluator: &dyn RuleEvaluator, schema: &[FieldDescriptor]) -> Self {
        let mut predicates = Vec::with_capacity(rules.len());
        let mut parse_errors = Vec::new();

        for rule in &rules {
            match evaluator.compile(rule, schema) {
                Ok(predicate) => predicates.push(Some(predicate)),
                Err(e) => {
                    tracing::warn!("Validation rule '{}' could not be parsed: {}", rule, e);
                    parse_errors.push(RuleParseError {
                        rule: rule.clone(),
                        message: e.to_string(),
                    });
                    predicates.push(None);
                }
            }
        }

        Self {
            fail_counts: vec![0; rules.len()],
            rules,
            predicates,
            total_checked: 0,
            parse_errors,
        }
    }

    /// Evaluates every rule against one row.
    pub fn observe(&mut self, record: &Record) {
        self.total_checked += 1;
        for (predicate, fails) in self.predicates.iter().zip(self.fail_counts.iter_mut()) {
            let passed = match predicate {
                Some(predicate) => predicate.evaluate(record).unwrap_or_else(|e| {
                    tracing::trace!("Rule evaluation failed for record {}: {}", record.id, e);
                    false
                }),
                None => false,
            };
            if !passed {
                *fails += 1;
            }
        }
    }

    /// Produces the validation block.
    pub fn finish(self) -> ValidationBlock {
        ValidationBlock {
            rules: self.rules,
            fail_counts: self.fail_counts,
            total_checked: self.total_checked,
            parse_errors: self.parse_errors,
        }
    }
}
