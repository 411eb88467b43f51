//! Direction classification and ranking of labelled anomalies.

use super::outlier::ScoredPoint;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Direction of an anomaly relative to the expected level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Observed value above expectation (positive residual).
    Spike,
    /// Observed value below expectation (negative residual).
    Drop,
}

impl Direction {
    /// Direction implied by the sign of a residual.
    ///
    /// Returns `None` for an absent or exactly-zero residual.
    pub fn from_residual(residual: Option<f64>) -> Option<Self> {
        match residual {
            Some(r) if r > 0.0 => Some(Direction::Spike),
            Some(r) if r < 0.0 => Some(Direction::Drop),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Spike => write!(f, "Spike"),
            Direction::Drop => write!(f, "Drop"),
        }
    }
}

/// An anomalous point with its direction, if one can be derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedAnomaly {
    pub point: ScoredPoint,
    pub direction: Option<Direction>,
}

impl ClassifiedAnomaly {
    pub fn is_classified(&self) -> bool {
        self.direction.is_some()
    }
}

/// Classify every labelled anomaly by the sign of its residual.
///
/// Points not labelled anomalous are dropped; input order is preserved.
pub fn classify_anomalies(points: &[ScoredPoint]) -> Vec<ClassifiedAnomaly> {
    points
        .iter()
        .filter(|p| p.is_anomaly)
        .map(|p| ClassifiedAnomaly {
            point: *p,
            direction: Direction::from_residual(p.residual),
        })
        .collect()
}

/// The `n` highest-scoring anomalies.
///
/// Sorted by descending score; equal scores put the most recent date first.
pub fn top_anomalies(anomalies: &[ClassifiedAnomaly], n: usize) -> Vec<ClassifiedAnomaly> {
    let mut ranked = anomalies.to_vec();
    ranked.sort_by(|a, b| {
        b.point
            .anomaly_score
            .partial_cmp(&a.point.anomaly_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.point.date.cmp(&a.point.date))
    });
    ranked.truncate(n);
    ranked
}
