//! Pearson correlation across numeric fields.
//!
//! [`CorrelationCollector`] keeps a uniform sample of complete rows: a row
//! contributes only when every participating field holds a convertible
//! value. The matrix is computed from that sample after the pass.

use crate::sampling::ReservoirSampler;

use super::config::ProfilerConfig;
use super::models::CorrelationBlock;
use super::stats::StatsError;

/// Reservoir stream index reserved for correlation rows.
const CORRELATION_STREAM: u64 = u64::MAX - 1;

/// Row sample over the numeric fields of a run.
#[derive(Debug)]
pub struct CorrelationCollector {
    fields: Vec<String>,
    rows: ReservoirSampler<Vec<f64>>,
}

impl CorrelationCollector {
    /// Creates a collector for `fields`, in matrix order.
    pub fn new(fields: Vec<String>, config: &ProfilerConfig) -> Self {
        let capacity = config.max_exact_values;
        let rows = match config.seed {
            Some(seed) => ReservoirSampler::with_seed(
                capacity,
                super::collector::derive_seed(seed, CORRELATION_STREAM),
            ),
            None => ReservoirSampler::new(capacity),
        };
        Self { fields, rows }
    }

    /// Offers one row; dropped unless every value is present.
    pub fn observe(&mut self, row: &[Option<f64>]) {
        if row.len() != self.fields.len() {
            return;
        }
        let complete: Option<Vec<f64>> = row.iter().copied().collect();
        if let Some(values) = complete {
            self.rows.update(values);
        }
    }

    /// Whether no complete row was seen.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Computes the correlation block, containing failures inside it.
    pub fn finish(self) -> CorrelationBlock {
        match pearson_matrix(self.rows.sample(), self.fields.len()) {
            Ok(matrix) => CorrelationBlock::Matrix {
                fields: self.fields,
                matrix,
            },
            Err(e) => {
                tracing::warn!("Correlation computation failed: {}", e);
                CorrelationBlock::Error {
                    message: e.to_string(),
                }
            }
        }
    }
}

/// Pearson correlation matrix of `rows` (observations) by `width` columns.
///
/// Columns with zero variance correlate as NaN, including with themselves.
pub fn pearson_matrix(rows: &[Vec<f64>], width: usize) -> Result<Vec<Vec<f64>>, StatsError> {
    let n = rows.len();
    if n < 2 {
        return Err(StatsError::InsufficientData {
            required: 2,
            actual: n,
        });
    }
    if rows.iter().flatten().any(|v| !v.is_finite()) {
        return Err(StatsError::NonFinite);
    }

    let means: Vec<f64> = (0..width)
        .map(|j| rows.iter().map(|row| row[j]).sum::<f64>() / n as f64)
        .collect();

    let mut covariance = vec![vec![0.0; width]; width];
    for row in rows {
        for i in 0..width {
            let di = row[i] - means[i];
            for j in i..width {
                covariance[i][j] += di * (row[j] - means[j]);
            }
        }
    }

    let mut matrix = vec![vec![f64::NAN; width]; width];
    for i in 0..width {
        for j in i..width {
            let denominator = (covariance[i][i] * covariance[j][j]).sqrt();
            let r = if denominator > 0.0 {
                (covariance[i][j] / denominator).clamp(-1.0, 1.0)
            } else {
                f64::NAN
            };
            matrix[i][j] = r;
            matrix[j][i] = r;
        }
    }
    Ok(matrix)
}
