//! Profiling run configuration.
//!
//! [`ProfileOptions`] is the user-facing options bag that toggles optional
//! statistic groups. [`ProfilerConfig`] wraps it together with the engine's
//! memory and reporting limits.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sampling::MAX_EXACT_VALUES;

/// Default number of top values listed per field.
pub const DEFAULT_LIMIT_UNIQUE: usize = 5;
/// Default number of decimals used when rendering reals.
pub const DEFAULT_DECIMAL_PLACES: usize = 2;
/// Cap on each per-field list of flagged record identifiers.
pub const DEFAULT_ID_LIST_CAP: usize = 1000;
/// Rows between two progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1000;

const LIMIT_UNIQUE_RANGE: std::ops::RangeInclusive<usize> = 1..=100;
const DECIMAL_PLACES_RANGE: std::ops::RangeInclusive<usize> = 0..=10;

/// Optional statistic groups and display settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileOptions {
    /// Skewness, kurtosis and Shapiro-Wilk normality for numeric fields
    pub numeric_dist_shape: bool,
    /// 1st/5th/95th/99th percentiles and Freedman-Diaconis bin count
    pub numeric_adv_percentiles: bool,
    /// Integer versus decimal value counts
    pub numeric_int_decimal: bool,
    /// Zero/positive/negative counts and the low variance flag
    pub numeric_outlier_details: bool,
    /// Case distribution and whitespace anomalies for text fields
    pub text_case_analysis: bool,
    /// Values occurring once, top words and pattern matches for text fields
    pub text_rarity_nonprintable: bool,
    /// Weekend, time-of-day and hour distribution for temporal fields
    pub date_time_weekend: bool,
    /// Number of top values listed per field (1-100)
    pub limit_unique: usize,
    /// Decimals used when rendering reals (0-10)
    pub decimal_places: usize,
    /// Whether the advanced statistics capability (normality tests) may be used
    #[serde(alias = "scipy_available")]
    pub advanced_stats_available: bool,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self {
            numeric_dist_shape: true,
            numeric_adv_percentiles: true,
            numeric_int_decimal: true,
            numeric_outlier_details: true,
            text_case_analysis: true,
            text_rarity_nonprintable: true,
            date_time_weekend: true,
            limit_unique: DEFAULT_LIMIT_UNIQUE,
            decimal_places: DEFAULT_DECIMAL_PLACES,
            advanced_stats_available: true,
        }
    }
}

impl ProfileOptions {
    /// Creates options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options with every optional group switched off.
    pub fn minimal() -> Self {
        Self {
            numeric_dist_shape: false,
            numeric_adv_percentiles: false,
            numeric_int_decimal: false,
            numeric_outlier_details: false,
            text_case_analysis: false,
            text_rarity_nonprintable: false,
            date_time_weekend: false,
            ..Self::default()
        }
    }

    /// Builder method to toggle distribution shape statistics.
    pub fn with_dist_shape(mut self, enabled: bool) -> Self {
        self.numeric_dist_shape = enabled;
        self
    }

    /// Builder method to toggle advanced percentiles.
    pub fn with_adv_percentiles(mut self, enabled: bool) -> Self {
        self.numeric_adv_percentiles = enabled;
        self
    }

    /// Builder method to toggle integer/decimal counts.
    pub fn with_int_decimal(mut self, enabled: bool) -> Self {
        self.numeric_int_decimal = enabled;
        self
    }

    /// Builder method to toggle outlier details.
    pub fn with_outlier_details(mut self, enabled: bool) -> Self {
        self.numeric_outlier_details = enabled;
        self
    }

    /// Builder method to toggle text case analysis.
    pub fn with_case_analysis(mut self, enabled: bool) -> Self {
        self.text_case_analysis = enabled;
        self
    }

    /// Builder method to toggle text rarity statistics.
    pub fn with_rarity(mut self, enabled: bool) -> Self {
        self.text_rarity_nonprintable = enabled;
        self
    }

    /// Builder method to toggle weekend/time-of-day statistics.
    pub fn with_weekend(mut self, enabled: bool) -> Self {
        self.date_time_weekend = enabled;
        self
    }

    /// Builder method to set the number of listed top values.
    pub fn with_limit_unique(mut self, limit: usize) -> Self {
        if !LIMIT_UNIQUE_RANGE.contains(&limit) {
            tracing::warn!(
                "limit_unique {} clamped to valid range [{}, {}]",
                limit,
                LIMIT_UNIQUE_RANGE.start(),
                LIMIT_UNIQUE_RANGE.end()
            );
        }
        self.limit_unique = limit.clamp(*LIMIT_UNIQUE_RANGE.start(), *LIMIT_UNIQUE_RANGE.end());
        self
    }

    /// Builder method to set rendered decimal places.
    pub fn with_decimal_places(mut self, places: usize) -> Self {
        if !DECIMAL_PLACES_RANGE.contains(&places) {
            tracing::warn!(
                "decimal_places {} clamped to valid range [{}, {}]",
                places,
                DECIMAL_PLACES_RANGE.start(),
                DECIMAL_PLACES_RANGE.end()
            );
        }
        self.decimal_places =
            places.clamp(*DECIMAL_PLACES_RANGE.start(), *DECIMAL_PLACES_RANGE.end());
        self
    }

    /// Builder method to declare the advanced statistics capability.
    pub fn with_advanced_stats(mut self, available: bool) -> Self {
        self.advanced_stats_available = available;
        self
    }

    /// Validates the options.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !LIMIT_UNIQUE_RANGE.contains(&self.limit_unique) {
            return Err(ConfigValidationError::InvalidLimitUnique(self.limit_unique));
        }
        if !DECIMAL_PLACES_RANGE.contains(&self.decimal_places) {
            return Err(ConfigValidationError::InvalidDecimalPlaces(
                self.decimal_places,
            ));
        }
        Ok(())
    }
}

/// Validation errors for profiling configuration.
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("limit_unique must be between 1 and 100, got {0}")]
    InvalidLimitUnique(usize),
    #[error("decimal_places must be between 0 and 10, got {0}")]
    InvalidDecimalPlaces(usize),
    #[error("max_exact_values must be at least 1")]
    InvalidMaxExactValues,
    #[error("progress_interval must be at least 1")]
    InvalidProgressInterval,
}

/// Engine configuration: options plus memory and reporting limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
    /// Statistic groups and display settings
    pub options: ProfileOptions,
    /// Reservoir capacity per field; fields with more non-null values are
    /// profiled from a sample
    pub max_exact_values: usize,
    /// Cap on each list of flagged record identifiers
    pub id_list_cap: usize,
    /// Rows between progress reports
    pub progress_interval: u64,
    /// Seed for reservoir sampling; `None` seeds from the operating system
    pub seed: Option<u64>,
    /// Fixed "now" for before/after comparisons; `None` uses the local
    /// clock at run start
    pub reference_time: Option<NaiveDateTime>,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            options: ProfileOptions::default(),
            max_exact_values: MAX_EXACT_VALUES,
            id_list_cap: DEFAULT_ID_LIST_CAP,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            seed: None,
            reference_time: None,
        }
    }
}

impl ProfilerConfig {
    /// Creates a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the options bag.
    pub fn with_options(mut self, options: ProfileOptions) -> Self {
        self.options = options;
        self
    }

    /// Builder method to set the exactness threshold and reservoir capacity.
    pub fn with_max_exact_values(mut self, max: usize) -> Self {
        if max == 0 {
            tracing::warn!("max_exact_values 0 raised to 1");
        }
        self.max_exact_values = max.max(1);
        self
    }

    /// Builder method to set the flagged id list cap.
    pub fn with_id_list_cap(mut self, cap: usize) -> Self {
        self.id_list_cap = cap;
        self
    }

    /// Builder method to set the progress interval.
    pub fn with_progress_interval(mut self, rows: u64) -> Self {
        if rows == 0 {
            tracing::warn!("progress_interval 0 raised to 1");
        }
        self.progress_interval = rows.max(1);
        self
    }

    /// Builder method to fix the sampling seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builder method to fix the reference time.
    pub fn with_reference_time(mut self, now: NaiveDateTime) -> Self {
        self.reference_time = Some(now);
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.options.validate()?;
        if self.max_exact_values == 0 {
            return Err(ConfigValidationError::InvalidMaxExactValues);
        }
        if self.progress_interval == 0 {
            return Err(ConfigValidationError::InvalidProgressInterval);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_options_default() {
        let options = ProfileOptions::default();
        assert_eq!(options.limit_unique, 5);
        assert_eq!(options.decimal_places, 2);
        assert!(options.advanced_stats_available);
        assert!(options.numeric_dist_shape);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_minimal_options_disable_groups() {
        let options = ProfileOptions::minimal();
        assert!(!options.numeric_dist_shape);
        assert!(!options.text_case_analysis);
        assert!(!options.date_time_weekend);
        assert_eq!(options.limit_unique, DEFAULT_LIMIT_UNIQUE);
    }

    #[test]
    fn test_builder_clamping() {
        let options = ProfileOptions::new()
            .with_limit_unique(0)
            .with_decimal_places(42);
        assert_eq!(options.limit_unique, 1);
        assert_eq!(options.decimal_places, 10);

        let options = ProfileOptions::new().with_limit_unique(500);
        assert_eq!(options.limit_unique, 100);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let options = ProfileOptions {
            limit_unique: 101,
            ..ProfileOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ConfigValidationError::InvalidLimitUnique(101))
        ));

        let options = ProfileOptions {
            decimal_places: 11,
            ..ProfileOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ConfigValidationError::InvalidDecimalPlaces(11))
        ));
    }

    #[test]
    fn test_profiler_config_validation() {
        assert!(ProfilerConfig::default().validate().is_ok());

        let config = ProfilerConfig {
            max_exact_values: 0,
            ..ProfilerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::InvalidMaxExactValues)
        ));

        let config = ProfilerConfig::new().with_max_exact_values(0);
        assert_eq!(config.max_exact_values, 1);
    }

    #[test]
    fn test_scipy_alias_is_accepted() {
        let options: ProfileOptions =
            serde_json::from_str(r#"{"scipy_available": false, "limit_unique": 3}"#).unwrap();
        assert!(!options.advanced_stats_available);
        assert_eq!(options.limit_unique, 3);
        // Unspecified fields take defaults
        assert!(options.numeric_dist_shape);
    }

    #[test]
    fn test_profiler_config_serde_roundtrip() {
        let config = ProfilerConfig::new()
            .with_max_exact_values(500)
            .with_seed(9)
            .with_options(ProfileOptions::minimal().with_limit_unique(7));

        let json = serde_json::to_string(&config).unwrap();
        let back: ProfilerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
