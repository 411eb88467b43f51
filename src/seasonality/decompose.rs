//! Weekly decomposition of a daily sales grid into trend, seasonal and residual.

use super::stl::STL;
use crate::core::{DailySeries, TimePoint};
use crate::error::{PipelineError, Result};
use crate::utils::stats::std_dev;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration of the decomposer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompositionConfig {
    /// Seasonal period in days.
    pub period: usize,
    /// Use robust (outlier re-weighting) fitting.
    pub robust: bool,
    /// Residuals beyond `sigma_multiplier` standard deviations exceed bounds.
    pub sigma_multiplier: f64,
}

impl Default for DecompositionConfig {
    fn default() -> Self {
        Self {
            period: 7,
            robust: true,
            sigma_multiplier: 3.0,
        }
    }
}

impl DecompositionConfig {
    /// Set the seasonal period.
    pub fn with_period(mut self, period: usize) -> Self {
        self.period = period;
        self
    }

    /// Enable or disable robust fitting.
    pub fn with_robust(mut self, robust: bool) -> Self {
        self.robust = robust;
        self
    }

    /// Set the bounds-exceedance multiplier.
    pub fn with_sigma_multiplier(mut self, sigma: f64) -> Self {
        self.sigma_multiplier = sigma;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.period < 2 {
            return Err(PipelineError::InvalidParameter(format!(
                "seasonal period must be at least 2, got {}",
                self.period
            )));
        }
        if !(self.sigma_multiplier.is_finite() && self.sigma_multiplier > 0.0) {
            return Err(PipelineError::InvalidParameter(format!(
                "sigma multiplier must be positive, got {}",
                self.sigma_multiplier
            )));
        }
        Ok(())
    }
}

/// Non-fatal notice that decomposition failed and residuals are absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecompositionWarning {
    pub reason: String,
}

impl fmt::Display for DecompositionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seasonal decomposition failed: {}", self.reason)
    }
}

/// A grid point with its decomposition components.
///
/// Components are `None` for every point when decomposition failed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecomposedPoint {
    pub date: NaiveDate,
    pub value: f64,
    pub trend: Option<f64>,
    pub seasonal: Option<f64>,
    /// Observed minus trend minus seasonal.
    pub residual: Option<f64>,
    /// `|residual|` above the decomposition threshold. Informational only.
    pub exceeds_bounds: bool,
}

impl DecomposedPoint {
    pub fn time_point(&self) -> TimePoint {
        TimePoint::new(self.date, self.value)
    }
}

/// Decomposed series plus the summary of how decomposition went.
#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    pub points: Vec<DecomposedPoint>,
    /// `sigma_multiplier * std(residual)`, when residuals exist.
    pub threshold: Option<f64>,
    pub warning: Option<DecompositionWarning>,
}

impl Decomposition {
    /// Whether residuals are present (decomposition succeeded).
    pub fn has_residuals(&self) -> bool {
        self.warning.is_none()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Residuals in date order, when decomposition succeeded.
    pub fn residuals(&self) -> Option<Vec<f64>> {
        self.points.iter().map(|p| p.residual).collect()
    }

    /// Points whose residual exceeds the decomposition threshold.
    pub fn bounds_exceedances(&self) -> impl Iterator<Item = &DecomposedPoint> {
        self.points.iter().filter(|p| p.exceeds_bounds)
    }
}

/// Decompose a daily grid with weekly (or configured) seasonality.
///
/// Never fails on the data itself: when STL cannot decompose the series the
/// result carries a [`DecompositionWarning`], all residuals are absent and
/// downstream scoring falls back to raw values.
///
/// # Errors
/// [`PipelineError::InvalidParameter`] if `config` is invalid.
pub fn decompose_series(series: &DailySeries, config: &DecompositionConfig) -> Result<Decomposition> {
    config.validate()?;

    let mut stl = STL::new(config.period);
    if config.robust {
        stl = stl.robust();
    }

    match stl.decompose(series.values()) {
        Ok(result) => {
            let threshold = config.sigma_multiplier * std_dev(&result.remainder);
            let points = series
                .points()
                .enumerate()
                .map(|(i, p)| DecomposedPoint {
                    date: p.date,
                    value: p.value,
                    trend: Some(result.trend[i]),
                    seasonal: Some(result.seasonal[i]),
                    residual: Some(result.remainder[i]),
                    exceeds_bounds: result.remainder[i].abs() > threshold,
                })
                .collect();

            Ok(Decomposition {
                points,
                threshold: Some(threshold),
                warning: None,
            })
        }
        Err(err) => {
            let warning = DecompositionWarning {
                reason: err.to_string(),
            };
            log::warn!("{}; scoring will use raw values only", warning);

            let points = series
                .points()
                .map(|p| DecomposedPoint {
                    date: p.date,
                    value: p.value,
                    trend: None,
                    seasonal: None,
                    residual: None,
                    exceeds_bounds: false,
                })
                .collect();

            Ok(Decomposition {
                points,
                threshold: None,
                warning: Some(warning),
            })
        }
    }
}
