//! Penalized least squares for additive regression models.

use crate::error::{PipelineError, Result};

/// Fitted coefficients of a penalized linear model.
#[derive(Debug, Clone, PartialEq)]
pub struct RidgeFit {
    /// One coefficient per design column, in column order.
    pub coefficients: Vec<f64>,
}

impl RidgeFit {
    /// Contribution of the columns in `range` to one design row.
    pub fn partial_row(&self, row: &[f64], range: std::ops::Range<usize>) -> f64 {
        range
            .filter(|&j| j < row.len() && j < self.coefficients.len())
            .map(|j| self.coefficients[j] * row[j])
            .sum()
    }
}

/// Fit `y ≈ X β` minimizing `||y - Xβ||² + Σ_j penalty_j β_j²`.
///
/// # Arguments
/// * `rows` - Design matrix, one row per observation
/// * `y` - Targets, one per row
/// * `penalties` - Ridge penalty per column (0 leaves the column unpenalized)
///
/// # Errors
/// - [`PipelineError::InsufficientData`] for an empty design
/// - [`PipelineError::DimensionMismatch`] for ragged rows or mismatched lengths
/// - [`PipelineError::ComputationError`] if the normal equations are singular
pub fn ridge_fit(rows: &[Vec<f64>], y: &[f64], penalties: &[f64]) -> Result<RidgeFit> {
    let n = rows.len();
    if n == 0 {
        return Err(PipelineError::InsufficientData { needed: 1, got: 0 });
    }
    if y.len() != n {
        return Err(PipelineError::DimensionMismatch {
            expected: n,
            got: y.len(),
        });
    }

    let k = penalties.len();
    if let Some(bad) = rows.iter().find(|r| r.len() != k) {
        return Err(PipelineError::DimensionMismatch {
            expected: k,
            got: bad.len(),
        });
    }

    // X'X + diag(penalty), X'y
    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, &y_obs) in rows.iter().zip(y) {
        for i in 0..k {
            let xi = row[i];
            if xi == 0.0 {
                continue;
            }
            xty[i] += xi * y_obs;
            for j in 0..=i {
                xtx[i][j] += xi * row[j];
            }
        }
    }
    for i in 0..k {
        for j in 0..i {
            xtx[j][i] = xtx[i][j];
        }
        // Small jitter keeps all-zero columns positive definite.
        xtx[i][i] += penalties[i] + 1e-8;
    }

    let coefficients = solve_symmetric(&xtx, &xty).ok_or_else(|| {
        PipelineError::ComputationError(
            "least squares failed: normal equations not positive definite".into(),
        )
    })?;

    Ok(RidgeFit { coefficients })
}

/// Solve symmetric positive definite system using Cholesky decomposition.
///
/// Solves A @ x = b where A is symmetric positive definite.
pub fn solve_symmetric(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    if n == 0 || a.len() != n {
        return None;
    }

    // Cholesky decomposition A = L @ L'
    let mut l = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }

            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }

    // Forward substitution: L @ y = b
    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i][j] * y[j];
        }
        y[i] = sum / l[i][i];
    }

    // Backward substitution: L' @ x = y
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum -= l[j][i] * x[j];
        }
        x[i] = sum / l[i][i];
    }

    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn unpenalized_fit_recovers_line() {
        // y = 2 + 3x
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![1.0, i as f64]).collect();
        let y: Vec<f64> = (0..10).map(|i| 2.0 + 3.0 * i as f64).collect();

        let fit = ridge_fit(&rows, &y, &[0.0, 0.0]).unwrap();

        assert_relative_eq!(fit.coefficients[0], 2.0, epsilon = 1e-6);
        assert_relative_eq!(fit.coefficients[1], 3.0, epsilon = 1e-6);
        assert_relative_eq!(fit.partial_row(&[1.0, 20.0], 0..2), 62.0, epsilon = 1e-5);
        assert_relative_eq!(fit.partial_row(&[1.0, 20.0], 1..2), 60.0, epsilon = 1e-5);
    }

    #[test]
    fn penalty_shrinks_coefficients() {
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![1.0, (i as f64 * 0.7).sin()]).collect();
        let y: Vec<f64> = rows.iter().map(|r| 5.0 + 4.0 * r[1]).collect();

        let loose = ridge_fit(&rows, &y, &[0.0, 0.0]).unwrap();
        let tight = ridge_fit(&rows, &y, &[0.0, 100.0]).unwrap();

        assert!(tight.coefficients[1].abs() < loose.coefficients[1].abs());
    }

    #[test]
    fn all_zero_column_is_tolerated() {
        let rows: Vec<Vec<f64>> = (0..5).map(|i| vec![1.0, i as f64, 0.0]).collect();
        let y = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let fit = ridge_fit(&rows, &y, &[0.0, 0.0, 0.0]).unwrap();
        assert_relative_eq!(fit.coefficients[2], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn dimension_errors() {
        assert!(matches!(
            ridge_fit(&[], &[], &[0.0]),
            Err(PipelineError::InsufficientData { .. })
        ));
        assert!(matches!(
            ridge_fit(&[vec![1.0]], &[1.0, 2.0], &[0.0]),
            Err(PipelineError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            ridge_fit(&[vec![1.0, 2.0]], &[1.0], &[0.0]),
            Err(PipelineError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn solve_symmetric_rejects_indefinite() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 1.0]];
        assert!(solve_symmetric(&a, &[1.0, 1.0]).is_none());

        let a = vec![vec![4.0, 1.0], vec![1.0, 3.0]];
        let x = solve_symmetric(&a, &[1.0, 2.0]).unwrap();
        assert_relative_eq!(4.0 * x[0] + x[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(x[0] + 3.0 * x[1], 2.0, epsilon = 1e-12);
    }
}
