//! Descriptive statistics helpers shared by analyzers and the advisory layer.

use statrs::statistics::Statistics;

pub fn mean(values: &[f64]) -> f64 {
    values.iter().mean()
}

/// Population standard deviation (divides by n).
pub fn population_std(values: &[f64]) -> f64 {
    values.iter().population_std_dev()
}

pub fn population_variance(values: &[f64]) -> f64 {
    values.iter().population_variance()
}

pub fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

/// Quantile by linear interpolation between closest ranks (Hyndman-Fan
/// type 7, the common spreadsheet/NumPy default). `q` in [0, 1].
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    quantile_sorted(&sorted, q)
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let q = q.clamp(0.0, 1.0);
    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    let frac = h - lo as f64;
    (sorted[hi] - sorted[lo]).mul_add(frac, sorted[lo])
}

pub fn median(values: &[f64]) -> f64 {
    quantile(values, 0.5)
}

/// Median absolute deviation about the median (unscaled).
pub fn mad(values: &[f64]) -> f64 {
    let m = median(values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - m).abs()).collect();
    median(&deviations)
}

/// Lag-1 autocorrelation of a sequence about its mean.
pub fn lag1_autocorrelation(values: &[f64]) -> f64 {
    if values.len() < 3 {
        return 0.0;
    }
    let m = mean(values);
    let denom: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    if denom <= f64::MIN_POSITIVE {
        return 0.0;
    }
    let num: f64 = values
        .windows(2)
        .map(|w| (w[0] - m) * (w[1] - m))
        .sum();
    num / denom
}

/// Number of sign changes of `values - mean(values)`, ignoring exact zeros.
pub fn mean_crossings(values: &[f64]) -> usize {
    let m = mean(values);
    let signs: Vec<bool> = values
        .iter()
        .filter(|v| (**v - m).abs() > f64::EPSILON * m.abs().max(1.0))
        .map(|v| *v > m)
        .collect();
    signs.windows(2).filter(|w| w[0] != w[1]).count()
}

/// Coefficient of determination of `fitted` against `observed`.
///
/// Returns 1.0 for a perfect fit of a constant series and 0.0 when the
/// observed variance vanishes but residuals do not.
pub fn r_squared(observed: &[f64], fitted: &[f64]) -> f64 {
    let m = mean(observed);
    let ss_tot: f64 = observed.iter().map(|y| (y - m).powi(2)).sum();
    let ss_res: f64 = observed
        .iter()
        .zip(fitted)
        .map(|(y, f)| (y - f).powi(2))
        .sum();
    if ss_tot <= f64::MIN_POSITIVE {
        return if ss_res <= f64::MIN_POSITIVE { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_population_std_divides_by_n() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&v), 5.0);
        assert_relative_eq!(population_std(&v), 2.0);
    }

    #[test]
    fn test_quantile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(quantile(&v, 0.25), 1.75);
        assert_relative_eq!(quantile(&v, 0.5), 2.5);
        assert_relative_eq!(quantile(&v, 0.75), 3.25);
        assert_relative_eq!(quantile(&[4.0, 1.0, 3.0, 2.0], 1.0), 4.0);
        assert!(quantile(&[], 0.5).is_nan());
    }

    #[test]
    fn test_mad() {
        let v = [1.0, 1.1, 0.9, 1.0, 10.2];
        assert_relative_eq!(median(&v), 1.0);
        assert_relative_eq!(mad(&v), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_autocorrelation_of_smooth_vs_alternating() {
        let smooth: Vec<f64> = (0..40).map(|i| (f64::from(i) * 0.3).sin()).collect();
        assert!(lag1_autocorrelation(&smooth) > 0.8);
        let alternating: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert!(lag1_autocorrelation(&alternating) < -0.9);
        assert_eq!(mean_crossings(&alternating), 39);
    }

    #[test]
    fn test_r_squared_bounds() {
        let y = [1.0, 2.0, 3.0];
        assert_relative_eq!(r_squared(&y, &y), 1.0);
        assert_relative_eq!(r_squared(&y, &[2.0, 2.0, 2.0]), 0.0);
        assert_relative_eq!(r_squared(&[5.0, 5.0], &[5.0, 5.0]), 1.0);
    }
}
