//! Additive regression forecaster: piecewise-linear trend plus Fourier seasonality.
//!
//! The model is
//!
//! ```text
//! y(t) = k + m·t + Σ_j δ_j·max(0, t - s_j) + Σ_k [a_k sin(2πkd/P) + b_k cos(2πkd/P)]
//! ```
//!
//! with `t` the time since the first observation scaled to `[0, 1]` over the
//! history, `s_j` the changepoints placed evenly over the first part of the
//! history and `d` the absolute day number. Yearly (`P = 365.25`) and weekly
//! (`P = 7`) terms are enabled when the history is long enough to identify
//! them. Coefficients are fitted by penalized least squares on targets scaled
//! by their largest magnitude; changepoint deltas and Fourier terms carry ridge
//! penalties, the base level and slope do not.
//!
//! The uncertainty band is symmetric, `point ± z·σ`, where `σ` is the standard
//! deviation of in-sample residuals and `z` the normal quantile for the
//! configured interval width. Out-of-sample rows widen by
//! `sqrt(1 + steps_ahead / n_train)`.

use super::Forecaster;
use crate::core::{DailySeries, SeriesForecast};
use crate::error::{PipelineError, Result};
use crate::utils::ols::{ridge_fit, RidgeFit};
use crate::utils::stats::{interval_z, std_dev};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const YEAR_DAYS: f64 = 365.25;
const WEEK_DAYS: f64 = 7.0;

/// Minimum span, in days, to enable yearly seasonality.
pub const YEARLY_MIN_SPAN_DAYS: i64 = 730;
/// Minimum span, in days, to enable weekly seasonality.
pub const WEEKLY_MIN_SPAN_DAYS: i64 = 14;

/// Configuration for the additive forecaster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Days to forecast past the last historical date.
    pub horizon: usize,
    /// Central probability mass of the uncertainty band, in `(0, 1)`.
    pub interval_width: f64,
    /// Minimum number of finite observations required to fit.
    pub min_observations: usize,
    /// Number of potential trend changepoints.
    pub n_changepoints: usize,
    /// Fraction of the history in which changepoints are placed.
    pub changepoint_range: f64,
    /// Ridge penalty on changepoint slope adjustments.
    pub changepoint_penalty: f64,
    /// Fourier order of yearly seasonality.
    pub yearly_order: usize,
    /// Fourier order of weekly seasonality.
    pub weekly_order: usize,
    /// Ridge penalty on Fourier coefficients.
    pub seasonality_penalty: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon: 365,
            interval_width: 0.8,
            min_observations: 14,
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_penalty: 10.0,
            yearly_order: 10,
            weekly_order: 3,
            seasonality_penalty: 0.01,
        }
    }
}

impl ForecastConfig {
    /// Set the forecast horizon in days.
    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }

    /// Set the uncertainty interval width.
    pub fn with_interval_width(mut self, width: f64) -> Self {
        self.interval_width = width;
        self
    }

    /// Set the minimum number of observations.
    pub fn with_min_observations(mut self, min: usize) -> Self {
        self.min_observations = min;
        self
    }

    /// Set the number of potential changepoints.
    pub fn with_changepoints(mut self, n: usize) -> Self {
        self.n_changepoints = n;
        self
    }

    /// Set the changepoint penalty.
    pub fn with_changepoint_penalty(mut self, penalty: f64) -> Self {
        self.changepoint_penalty = penalty;
        self
    }

    /// Set the yearly Fourier order (0 disables yearly seasonality).
    pub fn with_yearly_order(mut self, order: usize) -> Self {
        self.yearly_order = order;
        self
    }

    /// Set the weekly Fourier order (0 disables weekly seasonality).
    pub fn with_weekly_order(mut self, order: usize) -> Self {
        self.weekly_order = order;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            return Err(PipelineError::InvalidParameter(format!(
                "interval width must be in (0, 1), got {}",
                self.interval_width
            )));
        }
        if !(self.changepoint_range > 0.0 && self.changepoint_range <= 1.0) {
            return Err(PipelineError::InvalidParameter(format!(
                "changepoint range must be in (0, 1], got {}",
                self.changepoint_range
            )));
        }
        if !(self.changepoint_penalty >= 0.0 && self.seasonality_penalty >= 0.0) {
            return Err(PipelineError::InvalidParameter(
                "penalties must be non-negative".to_string(),
            ));
        }
        if self.min_observations < 2 {
            return Err(PipelineError::InvalidParameter(format!(
                "minimum observations must be at least 2, got {}",
                self.min_observations
            )));
        }
        Ok(())
    }
}

/// Regressor layout derived from the training history.
#[derive(Debug, Clone)]
struct Basis {
    start: NaiveDate,
    t_scale: f64,
    changepoints: Vec<f64>,
    yearly_order: usize,
    weekly_order: usize,
}

impl Basis {
    fn trend_columns(&self) -> usize {
        2 + self.changepoints.len()
    }

    fn width(&self) -> usize {
        self.trend_columns() + 2 * (self.yearly_order + self.weekly_order)
    }

    fn row(&self, date: NaiveDate) -> Vec<f64> {
        let t = (date - self.start).num_days() as f64 / self.t_scale;
        let day = date.num_days_from_ce() as f64;

        let mut row = Vec::with_capacity(self.width());
        row.push(1.0);
        row.push(t);
        row.extend(self.changepoints.iter().map(|&s| (t - s).max(0.0)));
        push_fourier(&mut row, day, YEAR_DAYS, self.yearly_order);
        push_fourier(&mut row, day, WEEK_DAYS, self.weekly_order);
        row
    }

    fn penalties(&self, config: &ForecastConfig) -> Vec<f64> {
        let mut penalties = vec![0.0, 0.0];
        penalties.extend(std::iter::repeat(config.changepoint_penalty).take(self.changepoints.len()));
        penalties.extend(
            std::iter::repeat(config.seasonality_penalty)
                .take(2 * (self.yearly_order + self.weekly_order)),
        );
        penalties
    }
}

fn push_fourier(row: &mut Vec<f64>, day: f64, period: f64, order: usize) {
    for k in 1..=order {
        let x = 2.0 * PI * k as f64 * day / period;
        row.push(x.sin());
        row.push(x.cos());
    }
}

/// Changepoint locations in scaled time, evenly spaced over the first
/// `range` fraction of the observations (the first observation excluded).
fn place_changepoints(t: &[f64], n_changepoints: usize, range: f64) -> Vec<f64> {
    let hist_size = (t.len() as f64 * range).floor() as usize;
    let n = n_changepoints.min(hist_size.saturating_sub(1));
    if n == 0 {
        return Vec::new();
    }
    let step = (hist_size - 1) as f64 / n as f64;
    let mut points: Vec<f64> = (1..=n)
        .map(|j| t[(j as f64 * step).round() as usize])
        .collect();
    points.dedup();
    points
}

#[derive(Debug, Clone)]
struct FittedState {
    basis: Basis,
    coefficients: RidgeFit,
    y_scale: f64,
    sigma: f64,
    n_train: usize,
    dates: Vec<NaiveDate>,
}

impl FittedState {
    /// (trend, seasonal) in original units.
    fn components(&self, date: NaiveDate) -> (f64, f64) {
        let row = self.basis.row(date);
        let split = self.basis.trend_columns();
        let trend = self.coefficients.partial_row(&row, 0..split) * self.y_scale;
        let seasonal = self.coefficients.partial_row(&row, split..row.len()) * self.y_scale;
        (trend, seasonal)
    }
}

/// Additive trend + seasonality forecaster.
///
/// # Example
/// ```
/// use retail_pulse::core::DailySeries;
/// use retail_pulse::models::{AdditiveModel, ForecastConfig, Forecaster};
/// use chrono::{Duration, NaiveDate};
///
/// let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
/// let dates: Vec<_> = (0..60).map(|i| start + Duration::days(i)).collect();
/// let values: Vec<f64> = (0..60).map(|i| 20.0 + (i % 7) as f64).collect();
/// let series = DailySeries::new(dates, values).unwrap();
///
/// let mut model = AdditiveModel::new(ForecastConfig::default());
/// model.fit(&series).unwrap();
/// let forecast = model.predict(30).unwrap();
///
/// assert_eq!(forecast.len(), 90);
/// assert_eq!(forecast.horizon(), 30);
/// ```
#[derive(Debug, Clone)]
pub struct AdditiveModel {
    config: ForecastConfig,
    state: Option<FittedState>,
    fitted: Option<Vec<f64>>,
    residuals: Option<Vec<f64>>,
}

impl Default for AdditiveModel {
    fn default() -> Self {
        Self::new(ForecastConfig::default())
    }
}

impl AdditiveModel {
    pub fn new(config: ForecastConfig) -> Self {
        Self {
            config,
            state: None,
            fitted: None,
            residuals: None,
        }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Active `(yearly, weekly)` Fourier orders after fitting.
    pub fn seasonality_orders(&self) -> Option<(usize, usize)> {
        self.state
            .as_ref()
            .map(|s| (s.basis.yearly_order, s.basis.weekly_order))
    }

    /// Standard deviation of in-sample residuals.
    pub fn residual_sigma(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.sigma)
    }

    /// Fit and project `config.horizon` days in one step.
    pub fn fit_predict(config: &ForecastConfig, series: &DailySeries) -> Result<SeriesForecast> {
        let mut model = Self::new(config.clone());
        model.fit(series)?;
        model.predict(config.horizon)
    }
}

impl Forecaster for AdditiveModel {
    fn fit(&mut self, series: &DailySeries) -> Result<()> {
        self.config.validate()?;

        let observed: Vec<(NaiveDate, f64)> = series
            .points()
            .filter(|p| p.value.is_finite())
            .map(|p| (p.date, p.value))
            .collect();
        if observed.len() < self.config.min_observations {
            return Err(PipelineError::Fit(format!(
                "need at least {} observations, got {}",
                self.config.min_observations,
                observed.len()
            )));
        }

        let (first, last) = match (observed.first(), observed.last()) {
            (Some(f), Some(l)) => (f.0, l.0),
            _ => return Err(PipelineError::Fit("series has no observations".to_string())),
        };
        let span = (last - first).num_days();
        let t_scale = span.max(1) as f64;

        let t: Vec<f64> = observed
            .iter()
            .map(|(d, _)| (*d - first).num_days() as f64 / t_scale)
            .collect();
        let basis = Basis {
            start: first,
            t_scale,
            changepoints: place_changepoints(
                &t,
                self.config.n_changepoints,
                self.config.changepoint_range,
            ),
            yearly_order: if span >= YEARLY_MIN_SPAN_DAYS {
                self.config.yearly_order
            } else {
                0
            },
            weekly_order: if span >= WEEKLY_MIN_SPAN_DAYS {
                self.config.weekly_order
            } else {
                0
            },
        };

        let y_scale = observed
            .iter()
            .fold(0.0_f64, |acc, (_, v)| acc.max(v.abs()));
        let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };

        let rows: Vec<Vec<f64>> = observed.iter().map(|(d, _)| basis.row(*d)).collect();
        let y: Vec<f64> = observed.iter().map(|(_, v)| v / y_scale).collect();
        let coefficients = ridge_fit(&rows, &y, &basis.penalties(&self.config))
            .map_err(|e| PipelineError::Fit(e.to_string()))?;

        let mut state = FittedState {
            basis,
            coefficients,
            y_scale,
            sigma: 0.0,
            n_train: observed.len(),
            dates: series.dates().to_vec(),
        };

        let fitted: Vec<f64> = state
            .dates
            .iter()
            .map(|&d| {
                let (trend, seasonal) = state.components(d);
                trend + seasonal
            })
            .collect();
        let residuals: Vec<f64> = series
            .values()
            .iter()
            .zip(&fitted)
            .map(|(y, f)| y - f)
            .collect();
        let finite: Vec<f64> = residuals.iter().copied().filter(|r| r.is_finite()).collect();
        let sigma = std_dev(&finite);
        if fitted.iter().any(|f| !f.is_finite()) {
            return Err(PipelineError::Fit("fitted values are not finite".to_string()));
        }
        state.sigma = if sigma.is_finite() { sigma } else { 0.0 };

        self.state = Some(state);
        self.fitted = Some(fitted);
        self.residuals = Some(residuals);
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<SeriesForecast> {
        let state = self.state.as_ref().ok_or_else(|| {
            PipelineError::Fit("model must be fitted before predicting".to_string())
        })?;
        let last = state
            .dates
            .last()
            .copied()
            .ok_or_else(|| PipelineError::Fit("fitted history is empty".to_string()))?;

        let z = interval_z(self.config.interval_width);
        let history_len = state.dates.len();
        let n = history_len + horizon;

        let mut dates = Vec::with_capacity(n);
        let mut point = Vec::with_capacity(n);
        let mut lower = Vec::with_capacity(n);
        let mut upper = Vec::with_capacity(n);
        let mut trend = Vec::with_capacity(n);
        let mut seasonal = Vec::with_capacity(n);

        let history = state.dates.iter().map(|&d| (d, 0usize));
        let future = (1..=horizon).map(|k| (last + Duration::days(k as i64), k));
        for (date, steps_ahead) in history.chain(future) {
            let (tr, se) = state.components(date);
            let widen = (1.0 + steps_ahead as f64 / state.n_train as f64).sqrt();
            let half = z * state.sigma * widen;
            let p = tr + se;

            dates.push(date);
            point.push(p);
            lower.push(p - half);
            upper.push(p + half);
            trend.push(tr);
            seasonal.push(se);
        }

        SeriesForecast::from_columns(dates, point, lower, upper, trend, seasonal, history_len)
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.fitted.as_deref()
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.residuals.as_deref()
    }

    fn name(&self) -> &str {
        "Additive"
    }
}
