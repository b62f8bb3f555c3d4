//! Data type mismatch hints.
//!
//! Flags fields whose sampled content suggests a different declared domain:
//! text that is almost entirely numeric or temporal, and numeric fields that
//! only hold 0 and 1.

use crate::models::{FieldDomain, FieldValue, TemporalValue};

use super::collector::FieldCollector;

/// Share of sampled values that must look like another type.
const HINT_THRESHOLD: f64 = 0.9;

/// Hint reported when nothing suspicious was found.
pub const NO_HINT: &str = "N/A";

/// Returns a short hint describing a likely domain mismatch.
pub fn type_mismatch_hint(collector: &FieldCollector) -> String {
    let sample = collector.raw_sample();
    match collector.descriptor().domain {
        FieldDomain::Text => text_hint(sample),
        FieldDomain::Numeric => numeric_hint(sample),
        FieldDomain::Temporal | FieldDomain::Other => NO_HINT.to_string(),
    }
}

fn text_hint(sample: &[FieldValue]) -> String {
    let values: Vec<&str> = sample
        .iter()
        .filter_map(FieldValue::as_text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if values.is_empty() {
        return NO_HINT.to_string();
    }
    let total = values.len() as f64;

    let numeric = values.iter().filter(|s| s.parse::<f64>().is_ok()).count() as f64;
    if numeric / total >= HINT_THRESHOLD {
        return format!(
            "Looks numeric ({:.0}% of sampled values)",
            numeric / total * 100.0
        );
    }

    let temporal = values
        .iter()
        .filter(|s| TemporalValue::parse(s).is_some())
        .count() as f64;
    if temporal / total >= HINT_THRESHOLD {
        return format!(
            "Looks like dates ({:.0}% of sampled values)",
            temporal / total * 100.0
        );
    }

    NO_HINT.to_string()
}

fn numeric_hint(sample: &[FieldValue]) -> String {
    let mut seen_zero = false;
    let mut seen_one = false;
    for value in sample.iter().filter_map(FieldValue::as_f64) {
        if value == 0.0 {
            seen_zero = true;
        } else if value == 1.0 {
            seen_one = true;
        } else {
            return NO_HINT.to_string();
        }
    }
    if seen_zero && seen_one {
        "Looks boolean (only 0 and 1)".to_string()
    } else {
        NO_HINT.to_string()
    }
}
