//! Outlier scoring of decomposed daily sales.
//!
//! Fits an [`IsolationForest`] on per-point features and labels the points
//! whose score falls above the contamination quantile.

use super::isolation_forest::IsolationForest;
use crate::error::{PipelineError, Result};
use crate::seasonality::{DecomposedPoint, Decomposition};
use crate::utils::stats::percentile;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Features fed to the outlier model, chosen once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureSet {
    /// `[value]`, used when decomposition failed.
    ValueOnly,
    /// `[value, residual]`.
    ValueAndResidual,
}

impl FeatureSet {
    /// Pick the feature set supported by a decomposition.
    pub fn for_decomposition(decomposition: &Decomposition) -> Self {
        if decomposition.has_residuals() {
            FeatureSet::ValueAndResidual
        } else {
            FeatureSet::ValueOnly
        }
    }

    /// Number of columns in the feature matrix.
    pub fn width(&self) -> usize {
        match self {
            FeatureSet::ValueOnly => 1,
            FeatureSet::ValueAndResidual => 2,
        }
    }

    /// Feature row of one point.
    ///
    /// # Errors
    /// [`PipelineError::ModelFit`] if the set needs a residual the point lacks.
    pub fn row(&self, point: &DecomposedPoint) -> Result<Vec<f64>> {
        match self {
            FeatureSet::ValueOnly => Ok(vec![point.value]),
            FeatureSet::ValueAndResidual => match point.residual {
                Some(residual) => Ok(vec![point.value, residual]),
                None => Err(PipelineError::ModelFit(format!(
                    "residual missing for {}",
                    point.date
                ))),
            },
        }
    }
}

/// Configuration for outlier scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    /// Expected fraction of anomalous points, in `(0, 0.5]`.
    pub contamination: f64,
    /// Random seed; identical seed and input reproduce identical scores.
    pub seed: u64,
    /// Number of isolation trees.
    pub n_estimators: usize,
    /// Sub-sample size per tree.
    pub max_samples: usize,
    /// Minimum number of points required to fit.
    pub min_points: usize,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            contamination: 0.05,
            seed: 42,
            n_estimators: 100,
            max_samples: 256,
            min_points: 10,
        }
    }
}

impl OutlierConfig {
    /// Set the contamination rate.
    pub fn with_contamination(mut self, contamination: f64) -> Self {
        self.contamination = contamination;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the number of trees.
    pub fn with_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    /// Set the minimum number of points.
    pub fn with_min_points(mut self, min_points: usize) -> Self {
        self.min_points = min_points;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(PipelineError::InvalidParameter(format!(
                "contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        if self.n_estimators == 0 || self.max_samples < 2 {
            return Err(PipelineError::InvalidParameter(
                "isolation forest needs at least one tree and two samples per tree".to_string(),
            ));
        }
        Ok(())
    }
}

/// A decomposed point with its outlier score and label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub date: NaiveDate,
    pub value: f64,
    pub residual: Option<f64>,
    /// Isolation score; higher is more anomalous.
    pub anomaly_score: f64,
    pub is_anomaly: bool,
}

/// Result of outlier scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierScores {
    pub points: Vec<ScoredPoint>,
    /// Score above which points are labelled anomalous.
    pub threshold: f64,
    pub feature_set: FeatureSet,
}

impl OutlierScores {
    /// Number of labelled anomalies.
    pub fn anomaly_count(&self) -> usize {
        self.points.iter().filter(|p| p.is_anomaly).count()
    }

    /// Fraction of points labelled anomalous.
    pub fn anomaly_fraction(&self) -> f64 {
        if self.points.is_empty() {
            0.0
        } else {
            self.anomaly_count() as f64 / self.points.len() as f64
        }
    }
}

/// Score every point of a decomposition.
///
/// The model is fitted on the whole series and scores the same points: this is
/// a descriptive question ("which observed days look unusual"), not a
/// prediction. Output has the same length and order as the input.
///
/// # Errors
/// - [`PipelineError::InvalidParameter`] for an invalid `config`
/// - [`PipelineError::ModelFit`] with fewer than `config.min_points` points or
///   non-finite features
pub fn score_outliers(decomposition: &Decomposition, config: &OutlierConfig) -> Result<OutlierScores> {
    config.validate()?;

    let n = decomposition.len();
    if n < config.min_points.max(2) {
        return Err(PipelineError::ModelFit(format!(
            "need at least {} points to fit the outlier model, got {}",
            config.min_points.max(2),
            n
        )));
    }

    let feature_set = FeatureSet::for_decomposition(decomposition);
    let features = decomposition
        .points
        .iter()
        .map(|p| feature_set.row(p))
        .collect::<Result<Vec<_>>>()?;

    let mut forest = IsolationForest::new(config.n_estimators, config.max_samples, config.seed);
    forest.fit(&features)?;
    let scores = forest.score_samples(&features)?;

    let threshold = percentile(&scores, 100.0 * (1.0 - config.contamination));
    let points: Vec<ScoredPoint> = decomposition
        .points
        .iter()
        .zip(scores.iter())
        .map(|(p, &score)| ScoredPoint {
            date: p.date,
            value: p.value,
            residual: p.residual,
            anomaly_score: score,
            is_anomaly: score > threshold,
        })
        .collect();

    let result = OutlierScores {
        points,
        threshold,
        feature_set,
    };
    log::debug!(
        "scored {} points with {:?}: {} anomalies above {:.4}",
        n,
        feature_set,
        result.anomaly_count(),
        threshold
    );
    Ok(result)
}
