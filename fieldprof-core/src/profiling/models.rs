//! Profiling result models.
//!
//! Every field produces a [`FieldReport`]: an ordered, displayable
//! [`StatMap`] plus a [`FieldSideChannel`] carrying data meant for row
//! selection and charting rather than display. A run produces one
//! [`ProfileReport`] holding all field reports and the optional correlation
//! and validation blocks.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt;

use crate::models::{FieldValue, RecordId};

macro_rules! stat_keys {
    ($($variant:ident => $label:literal,)+) => {
        /// Fixed vocabulary of statistic names.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StatKey {
            $(
                #[doc = $label]
                $variant,
            )+
        }

        impl StatKey {
            /// Every key in declaration order.
            #[cfg(test)]
            pub(crate) const ALL: &'static [StatKey] = &[$(StatKey::$variant,)+];

            /// Display label of the statistic.
            pub fn label(self) -> &'static str {
                match self {
                    $(StatKey::$variant => $label,)+
                }
            }
        }
    };
}

stat_keys! {
    // base
    NullCount => "Null Count",
    PercentNull => "% Null",
    NonNullCount => "Non-Null Count",
    Method => "Status (Method)",
    Status => "Status",
    Error => "Error",
    TypeMismatchHint => "Data Type Mismatch Hint",
    // numeric
    ConversionErrors => "Conversion Errors",
    Min => "Min",
    Max => "Max",
    Range => "Range",
    Sum => "Sum",
    Mean => "Mean",
    Median => "Median",
    StdDev => "Stdev (pop)",
    Modes => "Mode(s)",
    Variety => "Variety (distinct)",
    Q1 => "Q1",
    Q3 => "Q3",
    Iqr => "IQR",
    Outliers => "Outliers (IQR)",
    MinOutlier => "Min Outlier",
    MaxOutlier => "Max Outlier",
    PercentOutliers => "% Outliers",
    LowVariance => "Low Variance Flag",
    Zeros => "Zeros",
    Positives => "Positives",
    Negatives => "Negatives",
    CoefficientOfVariation => "CV %",
    IntegerValues => "Integer Values",
    DecimalValues => "Decimal Values",
    PercentInteger => "% Integer Values",
    Skewness => "Skewness",
    Kurtosis => "Kurtosis",
    ShapiroP => "Normality (Shapiro-Wilk p)",
    LikelyNormal => "Normality (Likely Normal)",
    P1 => "1st Pctl",
    P5 => "5th Pctl",
    P95 => "95th Pctl",
    P99 => "99th Pctl",
    OptimalBins => "Optimal Bins (Freedman-Diaconis)",
    // text
    EmptyStrings => "Empty Strings",
    PercentEmpty => "% Empty",
    PaddedValues => "Leading/Trailing Spaces",
    InternalSpaces => "Internal Multiple Spaces",
    MinLength => "Min Length",
    MaxLength => "Max Length",
    AvgLength => "Avg Length",
    TopValues => "Unique Values (Top)",
    SingletonValues => "Values Occurring Once",
    TopWords => "Top Words",
    PatternMatches => "Pattern Matches",
    PercentUppercase => "% Uppercase",
    PercentLowercase => "% Lowercase",
    PercentTitlecase => "% Titlecase",
    PercentMixedCase => "% Mixed Case",
    NonPrintable => "Non-Printable Chars Count",
    // temporal
    MinDate => "Min Date",
    MaxDate => "Max Date",
    CommonYears => "Common Years",
    CommonMonths => "Common Months",
    CommonDays => "Common Days",
    CommonHours => "Common Hours (Top 3)",
    PercentMidnight => "% Midnight Time",
    PercentNoon => "% Noon Time",
    PercentWeekend => "% Weekend Dates",
    PercentWeekday => "% Weekday Dates",
    DatesBeforeToday => "Dates Before Today",
    DatesAfterToday => "Dates After Today",
    DatesBeforeNow => "Dates Before Now",
    DatesAfterNow => "Dates After Now",
}

impl fmt::Display for StatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for StatKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// A typed statistic value.
#[derive(Debug, Clone, PartialEq)]
pub enum StatValue {
    /// Exact integer (counts, lengths)
    Integer(i64),
    /// Real number; NaN means "not available"
    Real(f64),
    /// Flag
    Boolean(bool),
    /// Short free-form text
    Text(String),
    /// Small list of rendered values
    List(Vec<String>),
    /// Count extrapolated from a sample
    Estimate(u64),
}

impl StatValue {
    /// Integer value from an unsigned count.
    pub fn count(value: u64) -> Self {
        StatValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }

    /// A sample-derived count: exact when the sample held everything,
    /// otherwise scaled to the population and marked as an estimate.
    pub fn sampled_count(sample_count: u64, scale: Option<Scale>) -> Self {
        match scale {
            None => Self::count(sample_count),
            Some(scale) => StatValue::Estimate(scale.apply(sample_count)),
        }
    }

    /// Text value.
    pub fn text(value: impl Into<String>) -> Self {
        StatValue::Text(value.into())
    }

    /// Percentage rendered as text with two decimals, e.g. `"12.50%"`.
    pub fn percent(part: u64, whole: u64) -> Self {
        let pct = if whole == 0 {
            0.0
        } else {
            part as f64 / whole as f64 * 100.0
        };
        StatValue::Text(format!("{:.2}%", pct))
    }

    /// Whether this value was extrapolated from a sample.
    pub fn is_estimate(&self) -> bool {
        matches!(self, StatValue::Estimate(_))
    }
}

impl Serialize for StatValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StatValue::Integer(i) => serializer.serialize_i64(*i),
            // serde_json maps non-finite reals to null
            StatValue::Real(r) => serializer.serialize_f64(*r),
            StatValue::Boolean(b) => serializer.serialize_bool(*b),
            StatValue::Text(text) => serializer.serialize_str(text),
            StatValue::List(items) => items.serialize(serializer),
            StatValue::Estimate(n) => serializer.serialize_str(&format!("{} (Est.)", n)),
        }
    }
}

/// Renders a real with fixed decimals; NaN renders as `"N/A"`.
pub fn format_real(value: f64, decimal_places: usize) -> String {
    if value.is_nan() {
        "N/A".to_string()
    } else {
        format!("{:.*}", decimal_places, value)
    }
}

/// Sample-to-population scaling for a sampled field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    population: u64,
    sample_size: usize,
}

impl Scale {
    /// Scaling factor for a field, or `None` when the sample is exact.
    pub fn for_sample(is_exact: bool, population: u64, sample_size: usize) -> Option<Self> {
        if is_exact || sample_size == 0 {
            None
        } else {
            Some(Self {
                population,
                sample_size,
            })
        }
    }

    /// `round(sample_count * population / sample_size)`.
    pub fn apply(self, sample_count: u64) -> u64 {
        let scaled = sample_count as f64 * self.population as f64 / self.sample_size as f64;
        scaled.round() as u64
    }
}

/// Ordered statistic name to value mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatMap {
    entries: Vec<(StatKey, StatValue)>,
}

impl StatMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, replacing an existing entry in place.
    pub fn insert(&mut self, key: StatKey, value: StatValue) {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Appends every entry of `other`.
    pub fn extend(&mut self, other: StatMap) {
        for (key, value) in other.entries {
            self.insert(key, value);
        }
    }

    /// Looks up a statistic.
    pub fn get(&self, key: StatKey) -> Option<&StatValue> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, value)| value)
    }

    /// Whether the statistic is present.
    pub fn contains(&self, key: StatKey) -> bool {
        self.get(key).is_some()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &(StatKey, StatValue)> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for StatMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key.label(), value)?;
        }
        map.end()
    }
}

/// Histogram of a numeric sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    /// Count per bin
    pub counts: Vec<u64>,
    /// Bin edges, one more than the number of bins
    pub edges: Vec<f64>,
}

/// One entry of a top-values list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopValue {
    /// Rendered value
    pub value: String,
    /// Frequency, scaled to the population when `estimated`
    pub count: u64,
    /// Whether `count` was extrapolated from a sample
    pub estimated: bool,
}

/// IQR outlier fences.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutlierBounds {
    /// `Q1 - 1.5 * IQR`
    pub lower: f64,
    /// `Q3 + 1.5 * IQR`
    pub upper: f64,
}

/// Non-display data retained for row selection and charting.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldSideChannel {
    /// Records whose value failed numeric conversion (capped)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conversion_error_ids: Vec<RecordId>,
    /// Records whose text contains non-printable characters (capped)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub non_printable_ids: Vec<RecordId>,
    /// Numeric histogram of the sample
    #[serde(skip_serializing_if = "Option::is_none")]
    pub histogram: Option<Histogram>,
    /// Raw top values for charting
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub top_values: Vec<TopValue>,
    /// Most frequent value in its original typed form, for exact-match
    /// row selection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_frequent: Option<FieldValue>,
    /// Outlier fences, for outlier row selection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outlier_bounds: Option<OutlierBounds>,
}

impl FieldSideChannel {
    /// Whether the side channel carries nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Result for one requested field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldReport {
    /// Displayable statistics
    pub stats: StatMap,
    /// Selection and charting data
    #[serde(skip_serializing_if = "FieldSideChannel::is_empty")]
    pub side: FieldSideChannel,
}

impl FieldReport {
    /// A report whose sole entry is an error message.
    pub fn error(message: impl Into<String>) -> Self {
        let mut stats = StatMap::new();
        stats.insert(StatKey::Error, StatValue::text(message));
        Self {
            stats,
            side: FieldSideChannel::default(),
        }
    }

    /// The error message if this is an error report.
    pub fn error_message(&self) -> Option<&str> {
        match self.stats.get(StatKey::Error) {
            Some(StatValue::Text(message)) => Some(message),
            _ => None,
        }
    }

    /// Shorthand for `self.stats.get(key)`.
    pub fn get(&self, key: StatKey) -> Option<&StatValue> {
        self.stats.get(key)
    }
}

/// Pearson correlation over the sampled complete numeric rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CorrelationBlock {
    /// Square matrix aligned with `fields`
    Matrix {
        /// Participating numeric fields
        fields: Vec<String>,
        /// Coefficients; NaN where a field has zero variance
        matrix: Vec<Vec<f64>>,
    },
    /// Computation failed
    Error {
        /// Failure reason
        #[serde(rename = "Error")]
        message: String,
    },
}

/// A rule that failed to parse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleParseError {
    /// Rule text
    pub rule: String,
    /// Parser message
    pub message: String,
}

/// Validation rule outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationBlock {
    /// Rule texts in request order
    pub rules: Vec<String>,
    /// Failing row count per rule
    pub fail_counts: Vec<u64>,
    /// Rows the rules were evaluated against
    pub total_checked: u64,
    /// Rules that failed to parse; their rows all count as failures
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parse_errors: Vec<RuleParseError>,
}

/// Complete result of a profiling run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileReport {
    /// Rows read from the source
    pub rows_analyzed: u64,
    /// Field reports in request order
    #[serde(serialize_with = "serialize_fields")]
    pub fields: Vec<(String, FieldReport)>,
    /// Correlation block, present when two or more numeric fields were profiled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation: Option<CorrelationBlock>,
    /// Validation block, present when rules were configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationBlock>,
}

impl ProfileReport {
    /// Looks up the report of a field.
    pub fn field(&self, name: &str) -> Option<&FieldReport> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, report)| report)
    }
}

fn serialize_fields<S: Serializer>(
    fields: &[(String, FieldReport)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(fields.iter().map(|(name, report)| (name, report)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_unique() {
        let mut labels: Vec<&str> = StatKey::ALL.iter().map(|k| k.label()).collect();
        let total = labels.len();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), total);
    }

    #[test]
    fn test_stat_map_keeps_insertion_order() {
        let mut map = StatMap::new();
        map.insert(StatKey::NullCount, StatValue::count(1));
        map.insert(StatKey::Mean, StatValue::Real(2.5));
        map.insert(StatKey::NullCount, StatValue::count(3));

        let keys: Vec<StatKey> = map.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![StatKey::NullCount, StatKey::Mean]);
        assert_eq!(map.get(StatKey::NullCount), Some(&StatValue::Integer(3)));
    }

    #[test]
    fn test_scale_rounds() {
        assert!(Scale::for_sample(true, 10, 5).is_none());
        let scale = Scale::for_sample(false, 10, 3).unwrap();
        // 1 * 10 / 3 = 3.33
        assert_eq!(scale.apply(1), 3);
        // 2 * 10 / 3 = 6.67
        assert_eq!(scale.apply(2), 7);
    }

    #[test]
    fn test_sampled_count_labels_estimates() {
        let scale = Scale::for_sample(false, 2_000, 1_000);
        let value = StatValue::sampled_count(5, scale);
        assert_eq!(value, StatValue::Estimate(10));
        assert_eq!(serde_json::to_value(&value).unwrap(), "10 (Est.)");
        assert!(value.is_estimate());
        assert_eq!(StatValue::sampled_count(5, None), StatValue::Integer(5));
    }

    #[test]
    fn test_real_and_percent_formatting() {
        assert_eq!(format_real(1.23456, 2), "1.23");
        assert_eq!(format_real(f64::NAN, 2), "N/A");
        assert_eq!(StatValue::percent(1, 8), StatValue::text("12.50%"));
    }

    #[test]
    fn test_field_report_serialization() {
        let mut report = FieldReport::default();
        report.stats.insert(StatKey::NullCount, StatValue::count(0));
        report.stats.insert(StatKey::Outliers, StatValue::Estimate(12));
        report.stats.insert(StatKey::Mean, StatValue::Real(f64::NAN));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["stats"]["Null Count"], 0);
        assert_eq!(json["stats"]["Outliers (IQR)"], "12 (Est.)");
        assert!(json["stats"]["Mean"].is_null());
        assert!(json.get("side").is_none());
    }

    #[test]
    fn test_error_report() {
        let report = FieldReport::error("Field not found");
        assert_eq!(report.stats.len(), 1);
        assert_eq!(report.error_message(), Some("Field not found"));
    }

    #[test]
    fn test_correlation_error_block_serialization() {
        let block = CorrelationBlock::Error {
            message: "boom".into(),
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["Error"], "boom");
    }
}
