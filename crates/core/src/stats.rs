//! Shared statistics: moments, rank and linear correlation, Student-t tests
//! and quantiles.
//!
//! Every function here is total. Degenerate inputs (too few points, zero
//! variance) return neutral values instead of NaN so that callers can apply
//! their own minimum-sample rules.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Variances and standard errors below this are treated as zero.
pub const EPSILON: f64 = 1e-12;

/// Arithmetic mean, `0.0` for an empty slice.
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n - 1 denominator), `0.0` with fewer than two values.
#[must_use]
pub fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

/// Sample standard deviation.
#[must_use]
pub fn std_dev(values: &[f64]) -> f64 {
    sample_variance(values).sqrt()
}

/// Median, `0.0` for an empty slice.
#[must_use]
pub fn median(values: &[f64]) -> f64 {
    quantile(values, 0.5).unwrap_or(0.0)
}

/// Quantile with linear interpolation between closest ranks.
///
/// Returns `None` for an empty slice or `q` outside [0, 1].
#[must_use]
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let weight = pos - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Pearson correlation coefficient.
///
/// Returns `0.0` for mismatched lengths, fewer than two pairs or zero
/// variance on either side.
#[must_use]
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 {
        return 0.0;
    }

    let mean_x = mean(x);
    let mean_y = mean(y);

    let mut covariance = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;

    for (xi, yi) in x.iter().zip(y.iter()) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        covariance += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x < EPSILON || var_y < EPSILON {
        return 0.0;
    }

    (covariance / (var_x * var_y).sqrt()).clamp(-1.0, 1.0)
}

/// Returns true if the slice has (numerically) zero variance.
#[must_use]
pub fn is_constant(values: &[f64]) -> bool {
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() < EPSILON
}

/// 1-based ranks with ties assigned their average rank.
#[must_use]
pub fn ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut indexed: Vec<(usize, f64)> = values.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && (indexed[j].1 - indexed[i].1).abs() < f64::EPSILON {
            j += 1;
        }

        // positions i..j share ranks (i+1)..=j
        let avg_rank = (i + 1 + j) as f64 / 2.0;
        for item in &indexed[i..j] {
            ranks[item.0] = avg_rank;
        }
        i = j;
    }

    ranks
}

/// Spearman rank correlation: Pearson on tie-averaged ranks.
#[must_use]
pub fn spearman(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 {
        return 0.0;
    }
    pearson(&ranks(x), &ranks(y))
}

/// Two-tailed p-value of a Student-t statistic.
///
/// Infinite statistics map to `0.0`; NaN or non-positive degrees of freedom
/// map to `1.0`.
#[must_use]
pub fn two_tailed_p_value(t: f64, degrees_of_freedom: f64) -> f64 {
    if t.is_nan() || degrees_of_freedom.is_nan() || degrees_of_freedom <= 0.0 {
        return 1.0;
    }
    if t.is_infinite() {
        return 0.0;
    }
    match StudentsT::new(0.0, 1.0, degrees_of_freedom) {
        Ok(dist) => (2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0),
        Err(_) => 1.0,
    }
}

/// Two-tailed p-value for a correlation coefficient using
/// `t = r * sqrt(n - 2) / sqrt(1 - r^2)` with `n - 2` degrees of freedom.
///
/// With `n <= 2` there are no degrees of freedom and the result is `1.0`.
/// A perfect correlation returns `0.0`.
#[must_use]
pub fn correlation_p_value(r: f64, n: usize) -> f64 {
    if n < 3 || r.is_nan() {
        return 1.0;
    }
    let denom = 1.0 - r * r;
    if denom < EPSILON {
        return 0.0;
    }
    let df = (n - 2) as f64;
    let t = r * (df / denom).sqrt();
    two_tailed_p_value(t, df)
}

/// Result of a Student-t test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TTest {
    /// t statistic
    pub t_statistic: f64,
    /// Two-tailed p-value
    pub p_value: f64,
    /// Degrees of freedom (Welch-Satterthwaite for two samples)
    pub degrees_of_freedom: f64,
}

impl TTest {
    /// The neutral result used for degenerate samples.
    #[must_use]
    pub const fn degenerate() -> Self {
        Self {
            t_statistic: 0.0,
            p_value: 1.0,
            degrees_of_freedom: 0.0,
        }
    }

    /// Returns true if the p-value is below `alpha`.
    #[must_use]
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

/// One-sample t-test of `values` against the hypothesised mean `mu`.
///
/// Degenerate with fewer than two values or zero variance.
#[must_use]
pub fn one_sample_t_test(values: &[f64], mu: f64) -> TTest {
    if values.len() < 2 {
        return TTest::degenerate();
    }
    let n = values.len() as f64;
    let se = std_dev(values) / n.sqrt();
    if se < EPSILON {
        return TTest::degenerate();
    }
    let t = (mean(values) - mu) / se;
    let df = n - 1.0;
    TTest {
        t_statistic: t,
        p_value: two_tailed_p_value(t, df),
        degrees_of_freedom: df,
    }
}

/// Welch's unequal-variance two-sample t-test of `a` against `b`.
///
/// A positive statistic means `mean(a) > mean(b)`. Degenerate with fewer
/// than two values in either sample or a zero pooled standard error.
#[must_use]
pub fn welch_t_test(a: &[f64], b: &[f64]) -> TTest {
    if a.len() < 2 || b.len() < 2 {
        return TTest::degenerate();
    }
    let na = a.len() as f64;
    let nb = b.len() as f64;
    let va = sample_variance(a) / na;
    let vb = sample_variance(b) / nb;
    let se2 = va + vb;
    if se2.sqrt() < EPSILON {
        return TTest::degenerate();
    }

    let t = (mean(a) - mean(b)) / se2.sqrt();
    let df_denom = va * va / (na - 1.0) + vb * vb / (nb - 1.0);
    let df = if df_denom < EPSILON * EPSILON {
        na + nb - 2.0
    } else {
        se2 * se2 / df_denom
    };

    TTest {
        t_statistic: t,
        p_value: two_tailed_p_value(t, df),
        degrees_of_freedom: df,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moments_of_small_sample() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&values) - 5.0).abs() < 1e-12);
        assert!((sample_variance(&values) - 32.0 / 7.0).abs() < 1e-12);
        assert!((median(&values) - 4.5).abs() < 1e-12);
    }

    #[test]
    fn moments_of_degenerate_samples() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(sample_variance(&[3.0]), 0.0);
        assert!(quantile(&[], 0.5).is_none());
        assert!(quantile(&[1.0], 1.5).is_none());
    }

    #[test]
    fn quantile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let q90 = quantile(&values, 0.9).unwrap();
        assert!((q90 - 9.1).abs() < 1e-12, "q90={q90}");
        assert!((quantile(&values, 0.0).unwrap() - 1.0).abs() < 1e-12);
        assert!((quantile(&values, 1.0).unwrap() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_perfect_and_inverse() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 4.0, 6.0, 8.0, 10.0];
        let z = [5.0, 4.0, 3.0, 2.0, 1.0];
        assert!((pearson(&x, &y) - 1.0).abs() < 1e-12);
        assert!((pearson(&x, &z) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_constant_side_is_zero() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let c = [0.5, 0.5, 0.5, 0.5];
        assert_eq!(pearson(&x, &c), 0.0);
        assert!(is_constant(&c));
        assert!(!is_constant(&x));
    }

    #[test]
    fn ranks_average_ties() {
        let r = ranks(&[3.0, 1.0, 4.0, 1.0, 5.0]);
        assert!((r[0] - 3.0).abs() < f64::EPSILON, "rank[0]={}", r[0]);
        assert!((r[1] - 1.5).abs() < f64::EPSILON, "rank[1]={}", r[1]);
        assert!((r[3] - 1.5).abs() < f64::EPSILON, "rank[3]={}", r[3]);
        assert!((r[4] - 5.0).abs() < f64::EPSILON, "rank[4]={}", r[4]);
    }

    #[test]
    fn spearman_is_monotonic_invariant() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.0, 4.0, 9.0, 16.0, 100.0];
        assert!((spearman(&x, &y) - 1.0).abs() < 1e-12);
        assert!(pearson(&x, &y) < 1.0);
    }

    #[test]
    fn correlation_p_value_edges() {
        assert_eq!(correlation_p_value(0.9, 2), 1.0);
        assert_eq!(correlation_p_value(1.0, 10), 0.0);
        assert!((correlation_p_value(0.0, 30) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn correlation_p_value_matches_reference() {
        // r = 0.5, n = 20 -> t = 2.4495, df = 18, p ~ 0.0248
        let p = correlation_p_value(0.5, 20);
        assert!((p - 0.0248).abs() < 1e-3, "p={p}");
    }

    #[test]
    fn welch_detects_shifted_means() {
        let a = [10.1, 10.3, 9.9, 10.2, 10.0, 10.4];
        let b = [8.0, 8.2, 7.9, 8.1, 8.3, 7.8];
        let test = welch_t_test(&a, &b);
        assert!(test.t_statistic > 0.0);
        assert!(test.p_value < 0.001, "p={}", test.p_value);
        assert!(test.degrees_of_freedom > 0.0);
    }

    #[test]
    fn welch_degenerate_cases() {
        assert_eq!(welch_t_test(&[1.0], &[1.0, 2.0]), TTest::degenerate());
        assert_eq!(welch_t_test(&[1.0, 1.0], &[1.0, 1.0]), TTest::degenerate());
    }

    #[test]
    fn one_sample_against_zero() {
        let test = one_sample_t_test(&[0.9, 1.1, 1.0, 0.95, 1.05], 0.0);
        assert!(test.is_significant(0.05));
        assert_eq!(one_sample_t_test(&[2.0, 2.0, 2.0], 0.0), TTest::degenerate());
    }

    #[test]
    fn p_value_guards() {
        assert_eq!(two_tailed_p_value(f64::NAN, 5.0), 1.0);
        assert_eq!(two_tailed_p_value(2.0, 0.0), 1.0);
        assert_eq!(two_tailed_p_value(f64::INFINITY, 5.0), 0.0);
    }
}
