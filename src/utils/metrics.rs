//! Accuracy metrics for forecast evaluation.
//!
//! Percentage-style metrics (MAPE, SMAPE) are reported as fractions, so
//! `0.12` means 12%.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// Truth values with magnitude below this are skipped by MAPE.
pub const MAPE_ZERO_TOLERANCE: f64 = 1e-8;

/// Accuracy metrics for evaluating forecast performance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error (None if every actual is ~0)
    pub mape: Option<f64>,
    /// Symmetric Mean Absolute Percentage Error
    pub smape: f64,
}

/// Calculate accuracy metrics between actual and predicted values.
///
/// # Errors
/// [`PipelineError::EmptyData`] for empty input and
/// [`PipelineError::DimensionMismatch`] for slices of different length.
pub fn calculate_metrics(actual: &[f64], predicted: &[f64]) -> Result<AccuracyMetrics> {
    check_lengths(actual, predicted.len())?;

    let mse = mse(actual, predicted);
    Ok(AccuracyMetrics {
        mae: mae(actual, predicted),
        mse,
        rmse: mse.sqrt(),
        mape: mape(actual, predicted),
        smape: smape(actual, predicted),
    })
}

fn check_lengths(actual: &[f64], other: usize) -> Result<()> {
    if actual.is_empty() || other == 0 {
        return Err(PipelineError::EmptyData);
    }
    if actual.len() != other {
        return Err(PipelineError::DimensionMismatch {
            expected: actual.len(),
            got: other,
        });
    }
    Ok(())
}

/// Calculate MAE between two slices.
pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / actual.len() as f64
}

/// Calculate MSE between two slices.
pub fn mse(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64
}

/// Calculate RMSE between two slices.
pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    mse(actual, predicted).sqrt()
}

/// Calculate MAPE, skipping actual values that are ~0.
///
/// Returns `None` when no actual value is usable.
pub fn mape(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    if actual.len() != predicted.len() {
        return None;
    }
    let (sum, count) = actual
        .iter()
        .zip(predicted)
        .filter(|(a, _)| a.abs() >= MAPE_ZERO_TOLERANCE)
        .fold((0.0, 0usize), |(sum, count), (a, p)| {
            (sum + ((a - p) / a).abs(), count + 1)
        });
    (count > 0).then(|| sum / count as f64)
}

/// Calculate SMAPE between two slices.
pub fn smape(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }
    let n = actual.len() as f64;
    actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| {
            let denom = a.abs() + p.abs();
            if denom == 0.0 {
                0.0
            } else {
                2.0 * (a - p).abs() / denom
            }
        })
        .sum::<f64>()
        / n
}

/// Fraction of actual values inside `[lower, upper]`, in `[0, 1]`.
///
/// # Errors
/// Same as [`calculate_metrics`].
pub fn coverage(actual: &[f64], lower: &[f64], upper: &[f64]) -> Result<f64> {
    check_lengths(actual, lower.len())?;
    check_lengths(actual, upper.len())?;

    let inside = actual
        .iter()
        .zip(lower.iter().zip(upper))
        .filter(|(a, (lo, hi))| **a >= **lo && **a <= **hi)
        .count();
    Ok(inside as f64 / actual.len() as f64)
}
