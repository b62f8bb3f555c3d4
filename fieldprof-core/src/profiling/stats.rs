//! Pure statistics over in-memory samples.
//!
//! All functions operate on finite values. Functions taking `sorted` expect
//! the slice in non-decreasing order (see [`sorted_finite`]).

use std::collections::HashMap;
use std::f64::consts::{FRAC_1_SQRT_2, PI};
use std::hash::Hash;
use thiserror::Error;

use super::models::Histogram;

/// Upper bound on histogram bins so pathological spreads cannot exhaust memory.
pub const MAX_HISTOGRAM_BINS: usize = 10_000;

/// Errors raised by sample statistics.
#[derive(Debug, Error, PartialEq)]
pub enum StatsError {
    #[error("sample is empty")]
    EmptySample,
    #[error("at least {required} values needed, got {actual}")]
    InsufficientData { required: usize, actual: usize },
    #[error("all values are identical")]
    ZeroRange,
    #[error("sample contains non-finite values")]
    NonFinite,
}

/// Returns the finite values of `values`, sorted ascending.
pub fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_unstable_by(f64::total_cmp);
    sorted
}

/// Percentile `p` (0-100) with linear interpolation between closest ranks
/// (Hyndman-Fan type 7). NaN for an empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return sorted[0];
    }
    let h = (n - 1) as f64 * (p / 100.0).clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = h - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

/// Median of a sorted slice.
pub fn median(sorted: &[f64]) -> f64 {
    percentile(sorted, 50.0)
}

// -0.0 and 0.0 compare equal and must count as one value.
fn value_key(value: f64) -> u64 {
    if value == 0.0 { 0 } else { value.to_bits() }
}

/// Every most frequent value, in first-seen order.
pub fn multimode(values: &[f64]) -> Vec<f64> {
    let mut counts: HashMap<u64, (usize, u64)> = HashMap::new();
    let mut order: Vec<f64> = Vec::new();
    for &value in values {
        let entry = counts.entry(value_key(value)).or_insert_with(|| {
            order.push(value);
            (order.len() - 1, 0)
        });
        entry.1 += 1;
    }
    let best = counts.values().map(|(_, count)| *count).max().unwrap_or(0);
    let mut modes: Vec<(usize, f64)> = counts
        .values()
        .filter(|(_, count)| *count == best)
        .map(|(position, _)| (*position, order[*position]))
        .collect();
    modes.sort_unstable_by_key(|(position, _)| *position);
    modes.into_iter().map(|(_, value)| value).collect()
}

/// Frequency of every distinct item, most frequent first. Ties keep the
/// order in which items were first seen.
pub fn frequencies<K, I>(items: I) -> Vec<(K, u64)>
where
    K: Hash + Eq + Clone,
    I: IntoIterator<Item = K>,
{
    let mut positions: HashMap<K, usize> = HashMap::new();
    let mut counts: Vec<(K, u64)> = Vec::new();
    for item in items {
        match positions.get(&item) {
            Some(&position) => counts[position].1 += 1,
            None => {
                positions.insert(item.clone(), counts.len());
                counts.push((item, 1));
            }
        }
    }
    // Stable sort keeps first-seen order among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// The `k` most frequent items, see [`frequencies`].
pub fn top_k<K, I>(items: I, k: usize) -> Vec<(K, u64)>
where
    K: Hash + Eq + Clone,
    I: IntoIterator<Item = K>,
{
    let mut counts = frequencies(items);
    counts.truncate(k);
    counts
}

/// Number of distinct values.
pub fn distinct_count(values: &[f64]) -> usize {
    let mut keys: Vec<u64> = values.iter().map(|v| value_key(*v)).collect();
    keys.sort_unstable();
    keys.dedup();
    keys.len()
}

fn central_moments(values: &[f64]) -> (f64, f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for v in values {
        let d = v - mean;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    (m2 / n, m3 / n, m4 / n)
}

/// Biased sample skewness `g1 = m3 / m2^1.5`; NaN for empty or constant samples.
pub fn skewness(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let (m2, m3, _) = central_moments(values);
    if m2 == 0.0 {
        return f64::NAN;
    }
    m3 / m2.powf(1.5)
}

/// Biased excess kurtosis (Fisher, normal = 0); NaN for empty or constant samples.
pub fn kurtosis(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let (m2, _, m4) = central_moments(values);
    if m2 == 0.0 {
        return f64::NAN;
    }
    m4 / (m2 * m2) - 3.0
}

/// Freedman-Diaconis bin width `2 * IQR / cbrt(n)`.
fn freedman_diaconis_width(sorted: &[f64]) -> f64 {
    let iqr = percentile(sorted, 75.0) - percentile(sorted, 25.0);
    2.0 * iqr / (sorted.len() as f64).cbrt()
}

/// Bin count suggested by the Freedman-Diaconis rule, `None` when the IQR
/// is zero or the sample is empty.
pub fn freedman_diaconis_bins(sorted: &[f64]) -> Option<usize> {
    let (first, last) = (sorted.first()?, sorted.last()?);
    let width = freedman_diaconis_width(sorted);
    if width <= 0.0 || !width.is_finite() {
        return None;
    }
    let bins = ((last - first) / width).ceil() as usize;
    Some(bins.clamp(1, MAX_HISTOGRAM_BINS))
}

/// Automatic bin count: the smaller of the Sturges and Freedman-Diaconis
/// widths, Sturges alone when the IQR is zero.
pub fn auto_bin_count(sorted: &[f64]) -> usize {
    let (Some(first), Some(last)) = (sorted.first(), sorted.last()) else {
        return 1;
    };
    let range = last - first;
    if range <= 0.0 {
        return 1;
    }
    let n = sorted.len() as f64;
    let sturges = range / (n.log2() + 1.0);
    let fd = freedman_diaconis_width(sorted);
    let width = if fd > 0.0 { fd.min(sturges) } else { sturges };
    let bins = (range / width).ceil() as usize;
    bins.clamp(1, MAX_HISTOGRAM_BINS)
}

/// Equal-width histogram of a sorted sample. The last bin is closed on the
/// right. A constant sample yields one bin spanning `value ± 0.5`.
pub fn histogram(sorted: &[f64], bins: usize) -> Result<Histogram, StatsError> {
    let (Some(&first), Some(&last)) = (sorted.first(), sorted.last()) else {
        return Err(StatsError::EmptySample);
    };
    if !first.is_finite() || !last.is_finite() {
        return Err(StatsError::NonFinite);
    }
    let (low, high) = if first == last {
        (first - 0.5, last + 0.5)
    } else {
        (first, last)
    };
    let bins = bins.clamp(1, MAX_HISTOGRAM_BINS);
    let width = (high - low) / bins as f64;
    let edges: Vec<f64> = (0..=bins)
        .map(|i| if i == bins { high } else { low + width * i as f64 })
        .collect();

    let mut counts = vec![0u64; bins];
    for &value in sorted {
        let index = (((value - low) / (high - low)) * bins as f64).floor() as usize;
        counts[index.min(bins - 1)] += 1;
    }
    Ok(Histogram { counts, edges })
}

// ---------------------------------------------------------------------------
// Normal distribution helpers
// ---------------------------------------------------------------------------

/// Inverse of the standard normal CDF (Acklam's rational approximation,
/// relative error below 1.2e-9).
pub fn normal_ppf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

/// Complementary error function (Chebyshev fit, fractional error below 1.2e-7).
pub fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -z * z - 1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98
                                + t * (1.488_515_87
                                    + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let ans = t * poly.exp();
    if x >= 0.0 { ans } else { 2.0 - ans }
}

/// Upper tail probability `P(X > x)` of a normal distribution.
pub fn normal_sf(x: f64, mean: f64, std_dev: f64) -> f64 {
    0.5 * erfc((x - mean) / std_dev * FRAC_1_SQRT_2)
}

// ---------------------------------------------------------------------------
// Shapiro-Wilk
// ---------------------------------------------------------------------------

/// Largest sample the normality test runs on.
pub const SHAPIRO_MAX_N: usize = 5000;

const C1: [f64; 6] = [0.0, 0.221_157, -0.147_981, -2.071_19, 4.434_685, -2.706_056];
const C2: [f64; 6] = [0.0, 0.042_981, -0.293_762, -1.752_461, 5.682_633, -3.582_633];
const C3: [f64; 4] = [0.544, -0.399_78, 0.025_054, -6.714e-4];
const C4: [f64; 4] = [1.3822, -0.778_57, 0.062_767, -0.002_032_2];
const C5: [f64; 4] = [-1.5861, -0.310_82, -0.083_751, 0.003_891_5];
const C6: [f64; 3] = [-0.4803, -0.082_676, 0.003_030_2];
const G: [f64; 2] = [-2.273, 0.459];

fn poly(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Shapiro-Wilk test statistic and p-value (Royston 1995, algorithm AS R94).
///
/// `sorted` must hold between 3 and 5000 finite values in ascending order.
pub fn shapiro_wilk(sorted: &[f64]) -> Result<(f64, f64), StatsError> {
    let n = sorted.len();
    if n < 3 {
        return Err(StatsError::InsufficientData {
            required: 3,
            actual: n,
        });
    }
    if sorted.iter().any(|v| !v.is_finite()) {
        return Err(StatsError::NonFinite);
    }
    let range = sorted[n - 1] - sorted[0];
    if range <= 0.0 {
        return Err(StatsError::ZeroRange);
    }

    let half = n / 2;
    let an = n as f64;
    let coefficients = shapiro_coefficients(n, half);

    let mean = sorted.iter().sum::<f64>() / an;
    let ssq: f64 = sorted.iter().map(|x| (x - mean).powi(2)).sum();
    let numerator: f64 = (0..half)
        .map(|i| coefficients[i] * (sorted[n - 1 - i] - sorted[i]))
        .sum();
    let w = (numerator * numerator / ssq).min(1.0);

    if n == 3 {
        let p = 6.0 / PI * (w.sqrt().asin() - PI / 3.0);
        return Ok((w, p.clamp(0.0, 1.0)));
    }

    let mut w1 = (1.0 - w).ln();
    let (m, s) = if n <= 11 {
        let gamma = poly(&G, an);
        if w1 >= gamma {
            return Ok((w, 1e-99));
        }
        w1 = -(gamma - w1).ln();
        (poly(&C3, an), poly(&C4, an).exp())
    } else {
        let xx = an.ln();
        (poly(&C5, xx), poly(&C6, xx).exp())
    };
    Ok((w, normal_sf(w1, m, s).clamp(0.0, 1.0)))
}

fn shapiro_coefficients(n: usize, half: usize) -> Vec<f64> {
    if n == 3 {
        return vec![FRAC_1_SQRT_2];
    }
    let an = n as f64;
    let m: Vec<f64> = (1..=half)
        .map(|i| normal_ppf((i as f64 - 0.375) / (an + 0.25)))
        .collect();
    let summ2 = 2.0 * m.iter().map(|v| v * v).sum::<f64>();
    let ssumm2 = summ2.sqrt();
    let rsn = 1.0 / an.sqrt();

    let mut a = vec![0.0; half];
    let a1 = poly(&C1, rsn) - m[0] / ssumm2;
    a[0] = a1;
    let (first, fac) = if n > 5 {
        let a2 = -m[1] / ssumm2 + poly(&C2, rsn);
        a[1] = a2;
        let fac = ((summ2 - 2.0 * m[0].powi(2) - 2.0 * m[1].powi(2))
            / (1.0 - 2.0 * a1.powi(2) - 2.0 * a2.powi(2)))
        .sqrt();
        (2, fac)
    } else {
        let fac = ((summ2 - 2.0 * m[0].powi(2)) / (1.0 - 2.0 * a1.powi(2))).sqrt();
        (1, fac)
    };
    for (slot, mi) in a.iter_mut().zip(&m).skip(first) {
        *slot = -mi / fac;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_percentile_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0, 100.0];
        assert!((percentile(&sorted, 25.0) - 2.25).abs() < 1e-12);
        assert!((percentile(&sorted, 75.0) - 4.75).abs() < 1e-12);
        assert!((median(&sorted) - 3.5).abs() < 1e-12);
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 100.0), 100.0);
        assert!(percentile(&[], 50.0).is_nan());
        assert_eq!(percentile(&[4.0], 99.0), 4.0);
    }

    #[test]
    fn test_multimode_first_seen_order() {
        assert_eq!(multimode(&[3.0, 1.0, 1.0, 3.0, 2.0]), vec![3.0, 1.0]);
        assert_eq!(multimode(&[5.0, 5.0, 2.0]), vec![5.0]);
        assert_eq!(multimode(&[0.0, -0.0]), vec![0.0]);
        assert!(multimode(&[]).is_empty());
    }

    #[test]
    fn test_top_k_ties_keep_first_seen_order() {
        let values = ["", "", "abc", "abc", "xyz"];
        let top = top_k(values.iter().copied(), 2);
        assert_eq!(top, vec![("", 2), ("abc", 2)]);

        let top = top_k(["b", "a", "a", "b", "c"], 3);
        assert_eq!(top, vec![("b", 2), ("a", 2), ("c", 1)]);
        assert!(top_k(Vec::<u8>::new(), 5).is_empty());
    }

    #[test]
    fn test_distinct_count() {
        assert_eq!(distinct_count(&[1.0, 1.0, 2.0, 3.5, 3.5]), 3);
        assert_eq!(distinct_count(&[]), 0);
    }

    #[test]
    fn test_skewness_and_kurtosis() {
        let symmetric = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!(skewness(&symmetric).abs() < 1e-12);
        assert!((kurtosis(&symmetric) + 1.3).abs() < 1e-12);

        assert!(skewness(&[1.0, 2.0, 3.0, 4.0, 100.0]) > 1.0);
        assert!(skewness(&[2.0, 2.0, 2.0]).is_nan());
        assert!(kurtosis(&[]).is_nan());
    }

    #[test]
    fn test_histogram_counts_every_value() {
        let sorted = sorted_finite(&[1.0, 2.0, 2.5, 3.0, 4.0, 5.0, 100.0]);
        let bins = auto_bin_count(&sorted);
        let hist = histogram(&sorted, bins).unwrap();
        assert_eq!(hist.counts.len(), bins);
        assert_eq!(hist.edges.len(), bins + 1);
        assert_eq!(hist.counts.iter().sum::<u64>(), 7);
        assert_eq!(hist.edges[0], 1.0);
        assert_eq!(hist.edges[bins], 100.0);
        // Maximum lands in the closed last bin
        assert!(*hist.counts.last().unwrap() >= 1);
    }

    #[test]
    fn test_histogram_constant_sample() {
        let hist = histogram(&[7.0, 7.0, 7.0], auto_bin_count(&[7.0, 7.0, 7.0])).unwrap();
        assert_eq!(hist.counts, vec![3]);
        assert_eq!(hist.edges, vec![6.5, 7.5]);
        assert_eq!(histogram(&[], 3), Err(StatsError::EmptySample));
    }

    #[test]
    fn test_freedman_diaconis_bins() {
        let sorted: Vec<f64> = (1..=8).map(f64::from).collect();
        // IQR = 3.5, width = 2 * 3.5 / 2 = 3.5, range 7
        assert_eq!(freedman_diaconis_bins(&sorted), Some(2));
        assert_eq!(freedman_diaconis_bins(&[1.0, 1.0, 1.0, 1.0]), None);
        assert_eq!(freedman_diaconis_bins(&[]), None);
    }

    #[test]
    fn test_normal_ppf_and_sf() {
        assert!(normal_ppf(0.5).abs() < 1e-9);
        assert!((normal_ppf(0.975) - 1.959_963_984_540_054).abs() < 1e-8);
        assert!((normal_ppf(0.001) + 3.090_232_306_167_813).abs() < 1e-8);
        assert!((normal_sf(1.959_963_984_540_054, 0.0, 1.0) - 0.025).abs() < 1e-7);
        assert!((normal_sf(0.0, 0.0, 1.0) - 0.5).abs() < 1e-7);
    }

    #[test]
    fn test_shapiro_three_values() {
        // Equally spaced triple is perfectly normal-shaped: W = 1, p = 1
        let (w, p) = shapiro_wilk(&[1.0, 2.0, 3.0]).unwrap();
        assert!((w - 1.0).abs() < 1e-9);
        assert!((p - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_shapiro_small_sample_reference() {
        let sorted: Vec<f64> = (1..=10).map(f64::from).collect();
        let (w, p) = shapiro_wilk(&sorted).unwrap();
        assert!((w - 0.9702).abs() < 0.002, "w = {}", w);
        assert!(p > 0.8, "p = {}", p);
    }

    #[test]
    fn test_shapiro_detects_normal_and_skewed() {
        let n = 200;
        let normal: Vec<f64> = (1..=n)
            .map(|i| normal_ppf((f64::from(i) - 0.5) / f64::from(n)))
            .collect();
        let (w, p) = shapiro_wilk(&normal).unwrap();
        assert!(w > 0.99);
        assert!(p > 0.5, "normal p = {}", p);

        let skewed: Vec<f64> = (1..=n)
            .map(|i| -(1.0 - (f64::from(i) - 0.5) / f64::from(n)).ln())
            .collect();
        let (_, p) = shapiro_wilk(&skewed).unwrap();
        assert!(p < 0.05, "skewed p = {}", p);
    }

    #[test]
    fn test_shapiro_rejects_degenerate_input() {
        assert_eq!(
            shapiro_wilk(&[1.0, 2.0]),
            Err(StatsError::InsufficientData {
                required: 3,
                actual: 2
            })
        );
        assert_eq!(shapiro_wilk(&[4.0, 4.0, 4.0, 4.0]), Err(StatsError::ZeroRange));
    }

    proptest! {
        #[test]
        fn prop_percentile_is_monotone_and_bounded(
            mut values in proptest::collection::vec(-1e6f64..1e6, 1..300),
            a in 0.0f64..100.0,
            b in 0.0f64..100.0,
        ) {
            values.sort_unstable_by(f64::total_cmp);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let p_lo = percentile(&values, lo);
            let p_hi = percentile(&values, hi);
            let slack = 1e-6;
            prop_assert!(p_lo <= p_hi + slack);
            prop_assert!(p_lo >= values[0] - slack);
            prop_assert!(p_hi <= values[values.len() - 1] + slack);
        }
    }
}
