//! Conversion of collected field state into field reports.
//!
//! Every field gets the base null accounting entries. Domain statistics are
//! delegated to [`numeric`](super::numeric), [`text`](super::text) and
//! [`temporal`](super::temporal). A failure inside a domain finalizer is
//! contained to the field: its report becomes a single `Error` entry.

use chrono::NaiveDateTime;

use crate::Result;
use crate::models::FieldDomain;

use super::collector::FieldCollector;
use super::config::ProfileOptions;
use super::hints::type_mismatch_hint;
use super::models::{FieldReport, StatKey, StatValue};
use super::{numeric, temporal, text};

/// Status reported for fields without a single non-null value.
pub const ALL_NULL_STATUS: &str = "All Null or Empty";
/// Method reported for fields profiled from a sample.
pub const APPROXIMATED_METHOD: &str = "Approximated (Large Dataset)";

/// Run-wide inputs of finalization.
#[derive(Debug, Clone, Copy)]
pub struct FinalizeContext<'a> {
    /// Enabled statistic groups and display settings
    pub options: &'a ProfileOptions,
    /// Reference time for before/after comparisons
    pub now: NaiveDateTime,
    /// Rows read during the pass
    pub rows_analyzed: u64,
}

/// Builds the report of one field.
pub fn finalize_field(collector: &FieldCollector, ctx: &FinalizeContext<'_>) -> FieldReport {
    let name = &collector.descriptor().name;
    match build_report(collector, ctx) {
        Ok(report) => {
            tracing::debug!(
                "Finalized field '{}' with {} statistics",
                name,
                report.stats.len()
            );
            report
        }
        Err(e) => {
            tracing::warn!("Statistics for field '{}' failed: {}", name, e);
            FieldReport::error(e.to_string())
        }
    }
}

fn build_report(collector: &FieldCollector, ctx: &FinalizeContext<'_>) -> Result<FieldReport> {
    let mut report = FieldReport::default();
    let null_count = collector.null_count();
    let non_null_count = collector.non_null_count();

    report.stats.insert(StatKey::NullCount, StatValue::count(null_count));
    report.stats.insert(
        StatKey::PercentNull,
        StatValue::percent(null_count, ctx.rows_analyzed),
    );
    report
        .stats
        .insert(StatKey::NonNullCount, StatValue::count(non_null_count));
    if !collector.is_exact() {
        report
            .stats
            .insert(StatKey::Method, StatValue::text(APPROXIMATED_METHOD));
    }

    report.side.conversion_error_ids = collector.conversion_errors().ids().to_vec();
    report.side.non_printable_ids = collector.non_printable().ids().to_vec();

    if non_null_count == 0 {
        report
            .stats
            .insert(StatKey::Status, StatValue::text(ALL_NULL_STATUS));
        return Ok(report);
    }

    match collector.descriptor().domain {
        FieldDomain::Numeric => numeric::analyze(collector, ctx, &mut report)?,
        FieldDomain::Text => text::analyze(collector, ctx, &mut report)?,
        FieldDomain::Temporal => temporal::analyze(collector, ctx, &mut report)?,
        FieldDomain::Other => report
            .stats
            .insert(StatKey::Status, StatValue::text("Null accounting only")),
    }

    report.stats.insert(
        StatKey::TypeMismatchHint,
        StatValue::text(type_mismatch_hint(collector)),
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldDescriptor, FieldValue, RecordId};
    use crate::profiling::config::ProfilerConfig;

    fn context(options: &ProfileOptions, rows: u64) -> FinalizeContext<'_> {
        FinalizeContext {
            options,
            now: chrono::NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            rows_analyzed: rows,
        }
    }

    #[test]
    fn test_all_null_field() {
        let config = ProfilerConfig::new().with_seed(1);
        let mut collector =
            FieldCollector::new(FieldDescriptor::new("x", FieldDomain::Numeric, 0), &config);
        for i in 0..4 {
            collector.observe(RecordId(i), &FieldValue::Null);
        }
        let report = finalize_field(&collector, &context(&config.options, 4));

        assert_eq!(report.get(StatKey::NullCount), Some(&StatValue::Integer(4)));
        assert_eq!(report.get(StatKey::NonNullCount), Some(&StatValue::Integer(0)));
        assert_eq!(
            report.get(StatKey::PercentNull),
            Some(&StatValue::text("100.00%"))
        );
        assert_eq!(
            report.get(StatKey::Status),
            Some(&StatValue::text(ALL_NULL_STATUS))
        );
        assert!(!report.stats.contains(StatKey::Mean));
    }

    #[test]
    fn test_other_domain_gets_null_accounting_only() {
        let config = ProfilerConfig::new().with_seed(1);
        let mut collector =
            FieldCollector::new(FieldDescriptor::new("flag", FieldDomain::Other, 0), &config);
        collector.observe(RecordId(0), &FieldValue::Bool(true));
        collector.observe(RecordId(1), &FieldValue::Null);
        let report = finalize_field(&collector, &context(&config.options, 2));

        assert_eq!(report.get(StatKey::NonNullCount), Some(&StatValue::Integer(1)));
        assert!(report.stats.contains(StatKey::Status));
        assert!(report.stats.contains(StatKey::TypeMismatchHint));
    }

    #[test]
    fn test_sampled_field_reports_method() {
        let config = ProfilerConfig::new().with_seed(3).with_max_exact_values(4);
        let mut collector =
            FieldCollector::new(FieldDescriptor::new("t", FieldDomain::Text, 0), &config);
        for i in 0..10 {
            collector.observe(RecordId(i), &FieldValue::from("v"));
        }
        let report = finalize_field(&collector, &context(&config.options, 10));
        assert_eq!(
            report.get(StatKey::Method),
            Some(&StatValue::text(APPROXIMATED_METHOD))
        );
    }
}
