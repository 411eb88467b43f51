//! Statistical utility functions.

use statrs::distribution::{ContinuousCDF, Normal};

/// Quantile function of the standard normal distribution.
///
/// # Arguments
/// * `p` - Probability value (0.0 to 1.0)
///
/// # Returns
/// The z-score corresponding to the given probability.
///
/// # Example
/// ```
/// use retail_pulse::utils::quantile_normal;
///
/// // 95% confidence level -> z ≈ 1.96
/// let z = quantile_normal(0.975);
/// assert!((z - 1.96).abs() < 0.01);
/// ```
pub fn quantile_normal(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    match Normal::new(0.0, 1.0) {
        Ok(normal) => normal.inverse_cdf(p),
        Err(_) => f64::NAN,
    }
}

/// Two-sided z-score for a central interval of the given width.
///
/// `interval_width = 0.8` gives `z ≈ 1.2816`.
pub fn interval_z(interval_width: f64) -> f64 {
    quantile_normal(0.5 + interval_width / 2.0)
}

/// Calculate the mean of a slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Calculate the variance of a slice (sample variance with n-1 denominator).
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|x| (x - m).powi(2)).sum();
    sum_sq / (values.len() - 1) as f64
}

/// Calculate the standard deviation of a slice.
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Calculate the median of a slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Percentile with linear interpolation between closest ranks.
///
/// `q` is in `[0, 100]`; the rank of `q` is `q / 100 * (n - 1)` over the
/// sorted values.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn quantile_normal_known_values() {
        assert_relative_eq!(quantile_normal(0.5), 0.0, epsilon = 1e-8);
        assert_relative_eq!(quantile_normal(0.975), 1.959964, epsilon = 1e-5);
        assert_relative_eq!(quantile_normal(0.025), -1.959964, epsilon = 1e-5);
        assert_relative_eq!(quantile_normal(0.995), 2.575829, epsilon = 1e-5);
    }

    #[test]
    fn quantile_normal_boundary_values() {
        assert_eq!(quantile_normal(0.0), f64::NEG_INFINITY);
        assert_eq!(quantile_normal(1.0), f64::INFINITY);
    }

    #[test]
    fn interval_z_for_default_width() {
        assert_relative_eq!(interval_z(0.8), 1.281552, epsilon = 1e-5);
        assert_relative_eq!(interval_z(0.95), 1.959964, epsilon = 1e-5);
    }

    #[test]
    fn mean_and_variance() {
        assert_relative_eq!(mean(&[1.0, 2.0, 3.0, 4.0, 5.0]), 3.0, epsilon = 1e-10);
        assert!(mean(&[]).is_nan());
        // Sample variance of [1, 2, 3, 4, 5] = 2.5
        assert_relative_eq!(variance(&[1.0, 2.0, 3.0, 4.0, 5.0]), 2.5, epsilon = 1e-10);
        assert!(variance(&[1.0]).is_nan());
        assert_relative_eq!(
            std_dev(&[1.0, 2.0, 3.0, 4.0, 5.0]),
            2.5_f64.sqrt(),
            epsilon = 1e-10
        );
    }

    #[test]
    fn median_calculates_correctly() {
        assert_relative_eq!(median(&[1.0, 2.0, 3.0, 4.0, 5.0]), 3.0, epsilon = 1e-10);
        assert_relative_eq!(median(&[1.0, 2.0, 3.0, 4.0]), 2.5, epsilon = 1e-10);
        assert_relative_eq!(median(&[5.0, 1.0, 3.0, 2.0, 4.0]), 3.0, epsilon = 1e-10);
        assert!(median(&[]).is_nan());
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let values = [4.0, 1.0, 3.0, 2.0, 5.0];
        assert_relative_eq!(percentile(&values, 0.0), 1.0);
        assert_relative_eq!(percentile(&values, 100.0), 5.0);
        assert_relative_eq!(percentile(&values, 50.0), 3.0);
        // rank 0.95 * 4 = 3.8 -> 4 + 0.8 * (5 - 4)
        assert_relative_eq!(percentile(&values, 95.0), 4.8, epsilon = 1e-12);
        assert!(percentile(&[], 50.0).is_nan());
    }
}
