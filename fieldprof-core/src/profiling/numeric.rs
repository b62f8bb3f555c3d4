//! Numeric field statistics.
//!
//! Aggregates (min, max, mean, sum, stdev) come from the exact streaming
//! statistics. Order statistics, modes, outliers and the optional groups
//! come from the sample of converted values.

use crate::Result;
use crate::error::ProfileError;

use super::collector::FieldCollector;
use super::finalize::FinalizeContext;
use super::models::{
    FieldReport, OutlierBounds, Scale, StatKey, StatMap, StatValue, format_real,
};
use super::stats;

/// Most modes listed before the list is truncated.
const MAX_LISTED_MODES: usize = 100;
/// Tolerance below which a standard deviation counts as zero.
const LOW_VARIANCE_EPSILON: f64 = 1e-9;
/// Shapiro-Wilk p-value above which a sample is considered normal.
const NORMALITY_ALPHA: f64 = 0.05;
/// IQR multiplier of the outlier fences.
const OUTLIER_FENCE: f64 = 1.5;

/// Adds numeric statistics to `report`.
pub fn analyze(
    collector: &FieldCollector,
    ctx: &FinalizeContext<'_>,
    report: &mut FieldReport,
) -> Result<()> {
    let running = collector.stats().ok_or_else(|| {
        ProfileError::finalization(
            &collector.descriptor().name,
            "numeric field has no running statistics",
        )
    })?;
    let options = ctx.options;
    let dp = options.decimal_places;
    let out = &mut report.stats;

    out.insert(
        StatKey::ConversionErrors,
        StatValue::count(collector.conversion_errors().count()),
    );

    let (min, max, mean, std_dev) = (
        running.min(),
        running.max(),
        running.mean(),
        running.std_dev(),
    );
    out.insert(StatKey::Min, StatValue::Real(min));
    out.insert(StatKey::Max, StatValue::Real(max));
    out.insert(StatKey::Range, StatValue::Real(max - min));
    out.insert(StatKey::Mean, StatValue::Real(mean));
    out.insert(StatKey::Sum, StatValue::Real(running.sum()));
    out.insert(StatKey::StdDev, StatValue::Real(std_dev));
    let cv = if mean == 0.0 || mean.is_nan() {
        f64::NAN
    } else {
        std_dev / mean * 100.0
    };
    out.insert(StatKey::CoefficientOfVariation, StatValue::Real(cv));

    let sample: Vec<f64> = collector
        .ordered_raw_sample()
        .into_iter()
        .filter_map(|value| value.as_f64())
        .collect();
    let sorted = stats::sorted_finite(&sample);
    let n = sorted.len();
    let scale = Scale::for_sample(collector.is_exact(), running.count(), n);

    let modes = stats::multimode(&sample);
    if modes.is_empty() {
        out.insert(StatKey::Modes, StatValue::text("N/A"));
    } else {
        let mut listed: Vec<String> = modes
            .iter()
            .take(MAX_LISTED_MODES)
            .map(|m| format_real(*m, dp))
            .collect();
        if modes.len() > MAX_LISTED_MODES {
            listed.push(format!("(+{} more)", modes.len() - MAX_LISTED_MODES));
        }
        out.insert(StatKey::Modes, StatValue::List(listed));
    }

    let distinct = stats::distinct_count(&sorted);
    out.insert(
        StatKey::Variety,
        match scale {
            None => StatValue::count(distinct as u64),
            Some(_) => StatValue::text(format!(">={} (Sample)", distinct)),
        },
    );

    out.insert(StatKey::Median, StatValue::Real(stats::median(&sorted)));

    if n > 0 {
        let q1 = stats::percentile(&sorted, 25.0);
        let q3 = stats::percentile(&sorted, 75.0);
        let iqr = q3 - q1;
        let bounds = OutlierBounds {
            lower: q1 - OUTLIER_FENCE * iqr,
            upper: q3 + OUTLIER_FENCE * iqr,
        };
        let outliers: Vec<f64> = sorted
            .iter()
            .copied()
            .filter(|v| *v < bounds.lower || *v > bounds.upper)
            .collect();

        out.insert(StatKey::Q1, StatValue::Real(q1));
        out.insert(StatKey::Q3, StatValue::Real(q3));
        out.insert(StatKey::Iqr, StatValue::Real(iqr));
        out.insert(
            StatKey::Outliers,
            StatValue::sampled_count(outliers.len() as u64, scale),
        );
        out.insert(StatKey::MinOutlier, outlier_value(outliers.first()));
        out.insert(StatKey::MaxOutlier, outlier_value(outliers.last()));
        out.insert(
            StatKey::PercentOutliers,
            StatValue::Real(outliers.len() as f64 / n as f64 * 100.0),
        );
        report.side.outlier_bounds = Some(bounds);

        match stats::histogram(&sorted, stats::auto_bin_count(&sorted)) {
            Ok(histogram) => report.side.histogram = Some(histogram),
            Err(e) => tracing::debug!("Histogram skipped: {}", e),
        }
    }

    let out = &mut report.stats;

    if options.numeric_outlier_details {
        let zeros = sorted.iter().filter(|v| **v == 0.0).count() as u64;
        let positives = sorted.iter().filter(|v| **v > 0.0).count() as u64;
        let negatives = sorted.iter().filter(|v| **v < 0.0).count() as u64;
        out.insert(StatKey::Zeros, StatValue::sampled_count(zeros, scale));
        out.insert(StatKey::Positives, StatValue::sampled_count(positives, scale));
        out.insert(StatKey::Negatives, StatValue::sampled_count(negatives, scale));
        let low_variance = distinct <= 1
            || std_dev.is_nan()
            || std_dev <= LOW_VARIANCE_EPSILON * mean.abs().max(1.0);
        out.insert(StatKey::LowVariance, StatValue::Boolean(low_variance));
    }

    if options.numeric_int_decimal {
        let integers = sorted.iter().filter(|v| v.fract() == 0.0).count() as u64;
        let decimals = n as u64 - integers;
        out.insert(
            StatKey::IntegerValues,
            StatValue::sampled_count(integers, scale),
        );
        out.insert(
            StatKey::DecimalValues,
            StatValue::sampled_count(decimals, scale),
        );
        let pct = if n == 0 {
            f64::NAN
        } else {
            integers as f64 / n as f64 * 100.0
        };
        out.insert(StatKey::PercentInteger, StatValue::Real(pct));
    }

    if options.numeric_adv_percentiles {
        for (key, p) in [
            (StatKey::P1, 1.0),
            (StatKey::P5, 5.0),
            (StatKey::P95, 95.0),
            (StatKey::P99, 99.0),
        ] {
            out.insert(key, StatValue::Real(stats::percentile(&sorted, p)));
        }
        out.insert(
            StatKey::OptimalBins,
            stats::freedman_diaconis_bins(&sorted)
                .map_or_else(|| StatValue::text("N/A"), |b| StatValue::count(b as u64)),
        );
    }

    if options.numeric_dist_shape {
        distribution_shape(&sorted, options.advanced_stats_available, out);
    }

    Ok(())
}

fn outlier_value(value: Option<&f64>) -> StatValue {
    value.map_or_else(|| StatValue::text("N/A"), |v| StatValue::Real(*v))
}

fn distribution_shape(sorted: &[f64], available: bool, out: &mut StatMap) {
    if !available {
        let unavailable = StatValue::text("N/A (advanced statistics unavailable)");
        out.insert(StatKey::Skewness, unavailable.clone());
        out.insert(StatKey::Kurtosis, unavailable.clone());
        out.insert(StatKey::ShapiroP, unavailable);
        return;
    }

    out.insert(StatKey::Skewness, StatValue::Real(stats::skewness(sorted)));
    out.insert(StatKey::Kurtosis, StatValue::Real(stats::kurtosis(sorted)));

    let n = sorted.len();
    if n < 3 {
        out.insert(StatKey::ShapiroP, StatValue::text("N/A (<3 values)"));
        return;
    }
    if n >= stats::SHAPIRO_MAX_N {
        out.insert(
            StatKey::ShapiroP,
            StatValue::text(format!("N/A (N>={})", stats::SHAPIRO_MAX_N)),
        );
        return;
    }
    match stats::shapiro_wilk(sorted) {
        Ok((_, p)) => {
            out.insert(StatKey::ShapiroP, StatValue::Real(p));
            out.insert(StatKey::LikelyNormal, StatValue::Boolean(p > NORMALITY_ALPHA));
        }
        Err(e) => out.insert(StatKey::ShapiroP, StatValue::text(format!("N/A ({})", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldDescriptor, FieldDomain, FieldValue, RecordId};
    use crate::profiling::config::{ProfileOptions, ProfilerConfig};

    fn collect(values: &[FieldValue], config: &ProfilerConfig) -> FieldCollector {
        let mut collector =
            FieldCollector::new(FieldDescriptor::new("n", FieldDomain::Numeric, 0), config);
        for (i, value) in values.iter().enumerate() {
            collector.observe(RecordId(i as u64), value);
        }
        collector
    }

    fn run(values: &[FieldValue], config: &ProfilerConfig) -> FieldReport {
        let collector = collect(values, config);
        let ctx = FinalizeContext {
            options: &config.options,
            now: chrono::NaiveDateTime::default(),
            rows_analyzed: values.len() as u64,
        };
        let mut report = FieldReport::default();
        analyze(&collector, &ctx, &mut report).unwrap();
        report
    }

    fn reals(values: &[f64]) -> Vec<FieldValue> {
        values.iter().map(|v| FieldValue::Real(*v)).collect()
    }

    fn real(report: &FieldReport, key: StatKey) -> f64 {
        match report.get(key) {
            Some(StatValue::Real(v)) => *v,
            other => panic!("{} is not real: {:?}", key, other),
        }
    }

    #[test]
    fn test_outlier_scenario() {
        let config = ProfilerConfig::new().with_seed(1);
        let report = run(&reals(&[1.0, 2.0, 3.0, 4.0, 5.0, 100.0]), &config);

        assert!((real(&report, StatKey::Q1) - 2.25).abs() < 1e-12);
        assert!((real(&report, StatKey::Q3) - 4.75).abs() < 1e-12);
        assert!((real(&report, StatKey::Iqr) - 2.5).abs() < 1e-12);
        assert_eq!(report.get(StatKey::Outliers), Some(&StatValue::Integer(1)));
        assert_eq!(real(&report, StatKey::MinOutlier), 100.0);
        assert_eq!(real(&report, StatKey::MaxOutlier), 100.0);

        let bounds = report.side.outlier_bounds.unwrap();
        assert!((bounds.lower + 1.5).abs() < 1e-12);
        assert!((bounds.upper - 8.5).abs() < 1e-12);
    }

    #[test]
    fn test_exact_aggregates() {
        let config = ProfilerConfig::new().with_seed(1);
        let report = run(&reals(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), &config);

        let close = |key: StatKey, expected: f64| {
            let actual = real(&report, key);
            assert!((actual - expected).abs() < 1e-9, "{}: {}", key, actual);
        };
        close(StatKey::Min, 2.0);
        close(StatKey::Max, 9.0);
        close(StatKey::Range, 7.0);
        close(StatKey::Mean, 5.0);
        close(StatKey::Sum, 40.0);
        close(StatKey::StdDev, 2.0);
        close(StatKey::CoefficientOfVariation, 40.0);
        assert_eq!(
            report.get(StatKey::Modes),
            Some(&StatValue::List(vec!["4.00".to_string()]))
        );
        assert_eq!(report.get(StatKey::Variety), Some(&StatValue::Integer(5)));
        assert!(report.side.histogram.is_some());
    }

    #[test]
    fn test_cv_is_nan_for_zero_mean() {
        let config = ProfilerConfig::new().with_seed(1);
        let report = run(&reals(&[-1.0, 1.0]), &config);
        assert!(real(&report, StatKey::CoefficientOfVariation).is_nan());
    }

    #[test]
    fn test_conversion_errors_are_reported() {
        let config = ProfilerConfig::new().with_seed(1);
        let values = vec![
            FieldValue::Integer(1),
            FieldValue::from("x"),
            FieldValue::from("3"),
        ];
        let report = run(&values, &config);
        assert_eq!(
            report.get(StatKey::ConversionErrors),
            Some(&StatValue::Integer(1))
        );
        assert!((real(&report, StatKey::Mean) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_optional_groups() {
        let config = ProfilerConfig::new().with_seed(1);
        let report = run(&reals(&[0.0, 0.0, -2.0, 1.5, 3.0]), &config);

        assert_eq!(report.get(StatKey::Zeros), Some(&StatValue::Integer(2)));
        assert_eq!(report.get(StatKey::Positives), Some(&StatValue::Integer(2)));
        assert_eq!(report.get(StatKey::Negatives), Some(&StatValue::Integer(1)));
        assert_eq!(
            report.get(StatKey::LowVariance),
            Some(&StatValue::Boolean(false))
        );
        assert_eq!(
            report.get(StatKey::IntegerValues),
            Some(&StatValue::Integer(4))
        );
        assert_eq!(
            report.get(StatKey::DecimalValues),
            Some(&StatValue::Integer(1))
        );
        assert_eq!(real(&report, StatKey::PercentInteger), 80.0);
        assert!(report.stats.contains(StatKey::P99));
        assert!(report.stats.contains(StatKey::Skewness));
        assert!(matches!(
            report.get(StatKey::ShapiroP),
            Some(StatValue::Real(_))
        ));
        assert!(report.stats.contains(StatKey::LikelyNormal));
    }

    #[test]
    fn test_minimal_options_skip_groups() {
        let config = ProfilerConfig::new()
            .with_seed(1)
            .with_options(ProfileOptions::minimal());
        let report = run(&reals(&[1.0, 2.0, 3.0]), &config);
        assert!(!report.stats.contains(StatKey::Zeros));
        assert!(!report.stats.contains(StatKey::IntegerValues));
        assert!(!report.stats.contains(StatKey::P1));
        assert!(!report.stats.contains(StatKey::Skewness));
        assert!(report.stats.contains(StatKey::Median));
    }

    #[test]
    fn test_shape_without_capability() {
        let options = ProfileOptions::new().with_advanced_stats(false);
        let config = ProfilerConfig::new().with_seed(1).with_options(options);
        let report = run(&reals(&[1.0, 2.0, 3.0, 10.0]), &config);
        assert_eq!(
            report.get(StatKey::Skewness),
            Some(&StatValue::text("N/A (advanced statistics unavailable)"))
        );
        assert!(!report.stats.contains(StatKey::LikelyNormal));
    }

    #[test]
    fn test_shapiro_not_applicable_for_tiny_sample() {
        let config = ProfilerConfig::new().with_seed(1);
        let report = run(&reals(&[1.0, 2.0]), &config);
        assert_eq!(
            report.get(StatKey::ShapiroP),
            Some(&StatValue::text("N/A (<3 values)"))
        );
    }

    #[test]
    fn test_sampled_counts_are_estimates() {
        let config = ProfilerConfig::new().with_seed(5).with_max_exact_values(100);
        // 1,000 values, every tenth is an extreme outlier
        let values: Vec<FieldValue> = (0..1000)
            .map(|i| {
                if i % 10 == 0 {
                    FieldValue::Real(1e6)
                } else {
                    FieldValue::Real(f64::from(i % 7))
                }
            })
            .collect();
        let report = run(&values, &config);

        assert!(report.get(StatKey::Outliers).unwrap().is_estimate());
        assert!(report.get(StatKey::Zeros).unwrap().is_estimate());
        assert!(matches!(report.get(StatKey::Variety), Some(StatValue::Text(_))));
        // Aggregates stay exact
        assert_eq!(real(&report, StatKey::Max), 1e6);
        assert_eq!(real(&report, StatKey::Min), 0.0);
    }
}
