//! Welford running statistics.

use serde::{Deserialize, Serialize};

/// Running count, extrema, mean and sum of squared deviations.
///
/// Updated with Welford's online algorithm, so `mean` and `m2` equal the
/// exact mean and sum of squared deviations of every prefix of the stream
/// without storing the values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingStats {
    count: u64,
    min: f64,
    max: f64,
    mean: f64,
    m2: f64,
}

impl Default for StreamingStats {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingStats {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self {
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            mean: 0.0,
            m2: 0.0,
        }
    }

    /// Incorporates one value.
    pub fn update(&mut self, value: f64) {
        self.count = self.count.saturating_add(1);
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    /// Number of values seen.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Smallest value seen, NaN when empty.
    pub fn min(&self) -> f64 {
        if self.count == 0 { f64::NAN } else { self.min }
    }

    /// Largest value seen, NaN when empty.
    pub fn max(&self) -> f64 {
        if self.count == 0 { f64::NAN } else { self.max }
    }

    /// Running mean, NaN when empty.
    pub fn mean(&self) -> f64 {
        if self.count == 0 { f64::NAN } else { self.mean }
    }

    /// Sum inferred as `mean * count`.
    pub fn sum(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean * self.count as f64
        }
    }

    /// Population variance (`M2 / count`), NaN with fewer than 2 values.
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            return f64::NAN;
        }
        self.m2 / self.count as f64
    }

    /// Population standard deviation, NaN with fewer than 2 values.
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn batch_mean_std(values: &[f64]) -> (f64, f64) {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        (mean, variance.sqrt())
    }

    fn assert_close(actual: f64, expected: f64, rel: f64) {
        let scale = expected.abs().max(1.0);
        assert!(
            (actual - expected).abs() <= rel * scale,
            "expected {} got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_empty_stats_are_nan() {
        let stats = StreamingStats::new();
        assert_eq!(stats.count(), 0);
        assert!(stats.min().is_nan());
        assert!(stats.max().is_nan());
        assert!(stats.mean().is_nan());
        assert!(stats.std_dev().is_nan());
        assert_eq!(stats.sum(), 0.0);
    }

    #[test]
    fn test_single_value_std_dev_is_nan() {
        let mut stats = StreamingStats::new();
        stats.update(42.0);
        assert_eq!(stats.mean(), 42.0);
        assert_eq!(stats.min(), 42.0);
        assert_eq!(stats.max(), 42.0);
        assert!(stats.std_dev().is_nan());
        assert!(stats.variance().is_nan());
    }

    #[test]
    fn test_two_values() {
        let mut stats = StreamingStats::new();
        stats.update(1.0);
        stats.update(3.0);
        assert_eq!(stats.mean(), 2.0);
        assert_eq!(stats.variance(), 1.0);
        assert_eq!(stats.std_dev(), 1.0);
        assert_eq!(stats.sum(), 4.0);
    }

    #[test]
    fn test_all_equal_values_have_zero_std_dev() {
        let mut stats = StreamingStats::new();
        for _ in 0..1000 {
            stats.update(7.25);
        }
        assert_eq!(stats.std_dev(), 0.0);
        assert_eq!(stats.mean(), 7.25);
    }

    #[test]
    fn test_large_offset_is_stable() {
        // Naive sum-of-squares loses all precision here.
        let mut stats = StreamingStats::new();
        let values: Vec<f64> = (0..100_000).map(|i| 1e6 + (i % 10) as f64).collect();
        for v in &values {
            stats.update(*v);
        }
        let (mean, std) = batch_mean_std(&values);
        assert_close(stats.mean(), mean, 1e-9);
        assert!((stats.std_dev() - std).abs() / std < 1e-6);
        assert!((std - 8.25f64.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_one_million_updates() {
        let mut stats = StreamingStats::new();
        for i in 0..1_000_000u64 {
            stats.update((i % 1000) as f64 * 0.5);
        }
        assert_eq!(stats.count(), 1_000_000);
        assert_close(stats.mean(), 249.75, 1e-9);
        // Uniform over 0..1000 step 0.5: variance = 0.25 * (1000^2 - 1) / 12
        let expected_std = (0.25 * (1_000_000.0 - 1.0) / 12.0f64).sqrt();
        assert_close(stats.std_dev(), expected_std, 1e-9);
    }

    proptest! {
        #[test]
        fn prop_matches_batch_formulas(values in proptest::collection::vec(-1e6f64..1e6, 2..2000)) {
            let mut stats = StreamingStats::new();
            for v in &values {
                stats.update(*v);
            }
            let (mean, std) = batch_mean_std(&values);
            let scale = values.iter().fold(1.0f64, |acc, v| acc.max(v.abs()));
            prop_assert!((stats.mean() - mean).abs() <= 1e-9 * scale);
            prop_assert!((stats.std_dev() - std).abs() <= 1e-9 * scale);
            prop_assert_eq!(stats.count(), values.len() as u64);
        }

        #[test]
        fn prop_extrema_match(values in proptest::collection::vec(-1e3f64..1e3, 1..500)) {
            let mut stats = StreamingStats::new();
            for v in &values {
                stats.update(*v);
            }
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            prop_assert_eq!(stats.min(), min);
            prop_assert_eq!(stats.max(), max);
        }
    }
}
