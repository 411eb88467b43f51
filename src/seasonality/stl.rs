//! STL (Seasonal-Trend decomposition using LOESS) implementation.
//!
//! STL decomposes a series into three additive components:
//! - Trend: the slowly varying level
//! - Seasonal: the repeating pattern of length `period`
//! - Remainder: what is left after removing trend and seasonal
//!
//! With robust fitting enabled, outer iterations re-weight observations with
//! bisquare weights of the remainder so single outliers do not leak into the
//! trend or seasonal estimates.

use crate::error::{PipelineError, Result};
use crate::utils::stats::median;

/// Result of STL decomposition.
#[derive(Debug, Clone)]
pub struct STLResult {
    /// Trend component.
    pub trend: Vec<f64>,
    /// Seasonal component.
    pub seasonal: Vec<f64>,
    /// Remainder component.
    pub remainder: Vec<f64>,
    /// Final robustness weights (all 1.0 when not robust).
    pub weights: Vec<f64>,
}

/// STL decomposition configuration and algorithm.
#[derive(Debug, Clone)]
pub struct STL {
    /// Seasonal period.
    period: usize,
    /// Seasonal LOESS span (ns).
    seasonal_span: usize,
    /// Trend LOESS span (nt).
    trend_span: usize,
    /// Low-pass LOESS span (nl).
    low_pass_span: usize,
    inner_iterations: usize,
    outer_iterations: usize,
}

impl STL {
    /// Create a non-robust decomposer for the given period.
    pub fn new(period: usize) -> Self {
        let period = period.max(2);
        let seasonal_span = 7;
        let nt = (1.5 * period as f64 / (1.0 - 1.5 / seasonal_span as f64)).ceil() as usize;

        Self {
            period,
            seasonal_span,
            trend_span: make_odd(nt),
            low_pass_span: make_odd(period),
            inner_iterations: 5,
            outer_iterations: 0,
        }
    }

    /// Enable robust fitting (2 inner, 15 outer iterations).
    pub fn robust(mut self) -> Self {
        self.inner_iterations = 2;
        self.outer_iterations = 15;
        self
    }

    /// Decompose `series`.
    ///
    /// # Errors
    /// - [`PipelineError::InsufficientData`] with fewer than two full periods
    /// - [`PipelineError::ComputationError`] for non-finite or constant input
    pub fn decompose(&self, series: &[f64]) -> Result<STLResult> {
        let n = series.len();
        if n < 2 * self.period {
            return Err(PipelineError::InsufficientData {
                needed: 2 * self.period,
                got: n,
            });
        }
        if series.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::ComputationError(
                "series contains non-finite values".to_string(),
            ));
        }
        let first = series[0];
        if series.iter().all(|&v| (v - first).abs() < 1e-12) {
            return Err(PipelineError::ComputationError(
                "series is constant".to_string(),
            ));
        }

        let mut seasonal = vec![0.0; n];
        let mut trend = vec![0.0; n];
        let mut weights = vec![1.0; n];

        for outer in 0..=self.outer_iterations {
            for _ in 0..self.inner_iterations {
                let detrended: Vec<f64> =
                    series.iter().zip(trend.iter()).map(|(y, t)| y - t).collect();

                let cycle = self.smooth_cycle_subseries(&detrended, &weights);
                let low_pass = self.low_pass_filter(&cycle);
                for i in 0..n {
                    seasonal[i] = cycle[i] - low_pass[i];
                }

                let deseasonalized: Vec<f64> = series
                    .iter()
                    .zip(seasonal.iter())
                    .map(|(y, s)| y - s)
                    .collect();
                trend = loess(&deseasonalized, self.trend_span, &weights);
            }

            if outer < self.outer_iterations {
                let remainder = remainder_of(series, &trend, &seasonal);
                weights = robustness_weights(&remainder);
            }
        }

        let remainder = remainder_of(series, &trend, &seasonal);
        if remainder.iter().any(|r| !r.is_finite()) {
            return Err(PipelineError::ComputationError(
                "decomposition did not converge".to_string(),
            ));
        }

        Ok(STLResult {
            trend,
            seasonal,
            remainder,
            weights,
        })
    }

    /// Smooth each cycle-subseries (all Mondays, all Tuesdays, ...).
    fn smooth_cycle_subseries(&self, detrended: &[f64], weights: &[f64]) -> Vec<f64> {
        let n = detrended.len();
        let mut result = vec![0.0; n];

        for position in 0..self.period {
            let indices: Vec<usize> = (position..n).step_by(self.period).collect();
            let values: Vec<f64> = indices.iter().map(|&i| detrended[i]).collect();
            let sub_weights: Vec<f64> = indices.iter().map(|&i| weights[i]).collect();

            let smoothed = loess(&values, self.seasonal_span, &sub_weights);
            for (&idx, value) in indices.iter().zip(smoothed) {
                result[idx] = value;
            }
        }

        result
    }

    /// Low-pass filter: MA(period), MA(period), MA(3), then LOESS.
    fn low_pass_filter(&self, series: &[f64]) -> Vec<f64> {
        let ma1 = moving_average(series, self.period);
        let ma2 = moving_average(&ma1, self.period);
        let ma3 = moving_average(&ma2, 3);
        loess(&ma3, self.low_pass_span, &vec![1.0; series.len()])
    }
}

impl Default for STL {
    fn default() -> Self {
        Self::new(7)
    }
}

fn make_odd(n: usize) -> usize {
    if n % 2 == 0 {
        n + 1
    } else {
        n
    }
}

fn remainder_of(series: &[f64], trend: &[f64], seasonal: &[f64]) -> Vec<f64> {
    series
        .iter()
        .zip(seasonal.iter())
        .zip(trend.iter())
        .map(|((y, s), t)| y - s - t)
        .collect()
}

/// Centered moving average; windows shrink at the edges.
fn moving_average(series: &[f64], window: usize) -> Vec<f64> {
    let n = series.len();
    let half = window / 2;
    (0..n)
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half + 1).min(n);
            series[start..end].iter().sum::<f64>() / (end - start) as f64
        })
        .collect()
}

/// Locally weighted linear regression with tricube kernel.
///
/// Each point is fitted from its `span` nearest neighbours; `weights`
/// multiplies the kernel (robustness weights). Falls back to the weighted mean
/// when the local design is singular, and to the raw value when every
/// neighbour has zero weight.
fn loess(values: &[f64], span: usize, weights: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }

    let q = span.min(n);
    let mut result = vec![0.0; n];

    for i in 0..n {
        let start = i.saturating_sub(q / 2).min(n - q);
        let end = start + q;

        let mut bandwidth = (i - start).max(end - 1 - i) as f64;
        if span > n {
            bandwidth += (span - n) as f64 / 2.0;
        }
        let bandwidth = bandwidth.max(1.0) * 1.000_001;

        let (mut sw, mut swx, mut swxx, mut swy, mut swxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for j in start..end {
            let x = j as f64 - i as f64;
            let u = x.abs() / bandwidth;
            let kernel = if u < 1.0 {
                (1.0 - u.powi(3)).powi(3)
            } else {
                0.0
            };
            let w = kernel * weights[j];
            sw += w;
            swx += w * x;
            swxx += w * x * x;
            swy += w * values[j];
            swxy += w * x * values[j];
        }

        result[i] = if sw <= 1e-12 {
            values[i]
        } else {
            let mean_x = swx / sw;
            let mean_y = swy / sw;
            let var_x = swxx / sw - mean_x * mean_x;
            if var_x.abs() < 1e-10 {
                mean_y
            } else {
                let slope = (swxy / sw - mean_x * mean_y) / var_x;
                // fitted value at x = 0 (the point itself)
                mean_y - slope * mean_x
            }
        };
    }

    result
}

/// Bisquare weights with scale `6 * median(|remainder|)`.
fn robustness_weights(remainder: &[f64]) -> Vec<f64> {
    let abs: Vec<f64> = remainder.iter().map(|r| r.abs()).collect();
    if abs.is_empty() {
        return Vec::new();
    }
    let h = 6.0 * median(&abs);
    let max_abs = abs.iter().fold(0.0_f64, |acc, v| acc.max(*v));

    // Most points fit exactly: keep only the near-exact ones.
    if h <= 1e-10 * (1.0 + max_abs) {
        let tol = 1e-8 * (1.0 + max_abs);
        return remainder
            .iter()
            .map(|r| if r.abs() <= tol { 1.0 } else { 0.0 })
            .collect();
    }

    remainder
        .iter()
        .map(|r| {
            let u = r.abs() / h;
            if u < 1.0 {
                (1.0 - u * u).powi(2)
            } else {
                0.0
            }
        })
        .collect()
}
