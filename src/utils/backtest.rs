//! Rolling-origin backtesting of per-series forecasters.

use crate::core::{DailySeries, SeriesForecast};
use crate::error::{PipelineError, Result};
use crate::models::{AdditiveModel, ForecastConfig, Forecaster};
use crate::utils::metrics::{calculate_metrics, coverage};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration for rolling-origin backtesting, in calendar days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Days of history before the first cutoff.
    pub initial_window: usize,
    /// Days between successive cutoffs.
    pub fold_period: usize,
    /// Days evaluated after each cutoff.
    pub horizon: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_window: 1095,
            fold_period: 180,
            horizon: 90,
        }
    }
}

impl BacktestConfig {
    pub fn new(initial_window: usize, fold_period: usize, horizon: usize) -> Self {
        Self {
            initial_window,
            fold_period,
            horizon,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.initial_window == 0 || self.fold_period == 0 || self.horizon == 0 {
            return Err(PipelineError::InvalidParameter(format!(
                "backtest windows must be positive, got initial {} / period {} / horizon {}",
                self.initial_window, self.fold_period, self.horizon
            )));
        }
        Ok(())
    }

    /// Number of folds for a series spanning `span_days` calendar days.
    pub fn fold_count(&self, span_days: usize) -> usize {
        let needed = self.initial_window + self.horizon;
        if span_days < needed || self.fold_period == 0 {
            return 0;
        }
        (span_days - needed) / self.fold_period + 1
    }
}

/// One evaluated day of one fold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestPoint {
    pub date: NaiveDate,
    /// Days after the cutoff, starting at 1 on the cutoff date itself.
    pub horizon: usize,
    pub truth: f64,
    pub prediction: f64,
    pub lower: f64,
    pub upper: f64,
}

/// A single rolling-origin evaluation window.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestFold {
    /// First date not seen in training.
    pub cutoff: NaiveDate,
    pub points: Vec<BacktestPoint>,
}

/// Accuracy at one horizon offset, aggregated over all folds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub horizon: usize,
    pub rmse: f64,
    pub mse: f64,
    pub mae: f64,
    /// Absent when every truth at this horizon is ~0.
    pub mape: Option<f64>,
    pub smape: f64,
    /// Fraction of truths inside the uncertainty band, in `[0, 1]`.
    pub coverage: f64,
}

/// Folds and per-horizon metrics of a backtest.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub folds: Vec<BacktestFold>,
    /// Ascending by horizon.
    pub metrics: Vec<MetricRow>,
}

impl BacktestResult {
    pub fn n_folds(&self) -> usize {
        self.folds.len()
    }
}

/// Backtest a forecaster on one series.
///
/// Starting `initial_window` days after the first date, the model is trained
/// on every observation before the cutoff and evaluated on the next `horizon`
/// days; the cutoff then advances by `fold_period` until fewer than `horizon`
/// days remain. Missing truth values are skipped.
///
/// # Errors
/// - [`PipelineError::InvalidParameter`] for an invalid `config`
/// - [`PipelineError::InsufficientHistory`] if the series spans fewer than
///   `initial_window + horizon` days
/// - any error from fitting or predicting a fold
pub fn backtest<F, Factory>(
    config: &BacktestConfig,
    series: &DailySeries,
    model_factory: Factory,
) -> Result<BacktestResult>
where
    F: Forecaster,
    Factory: Fn() -> F,
{
    config.validate()?;

    let span = series.span_days();
    let needed = config.initial_window + config.horizon;
    let first = match series.first_date() {
        Some(first) if span >= needed => first,
        _ => return Err(PipelineError::InsufficientHistory { needed, got: span }),
    };

    let mut folds = Vec::with_capacity(config.fold_count(span));
    let mut offset = config.initial_window;
    while offset + config.horizon <= span {
        let cutoff = first + Duration::days(offset as i64);
        let end = cutoff + Duration::days(config.horizon as i64);
        log::debug!("backtest fold at cutoff {}", cutoff);

        let train = series.before(cutoff);
        let mut model = model_factory();
        model.fit(&train)?;

        let last_train = train.last_date().ok_or(PipelineError::InsufficientHistory {
            needed,
            got: span,
        })?;
        let steps = (end - last_train).num_days().max(0) as usize;
        let forecast = model.predict(steps)?;

        let points = evaluate_fold(&forecast, &series.between(cutoff, end), cutoff);
        folds.push(BacktestFold { cutoff, points });

        offset += config.fold_period;
    }

    let metrics = metrics_by_horizon(&folds)?;
    Ok(BacktestResult { folds, metrics })
}

/// Backtest the additive forecaster built from `forecast`.
pub fn backtest_additive(
    config: &BacktestConfig,
    forecast: &ForecastConfig,
    series: &DailySeries,
) -> Result<BacktestResult> {
    backtest(config, series, || AdditiveModel::new(forecast.clone()))
}

fn evaluate_fold(forecast: &SeriesForecast, truth: &DailySeries, cutoff: NaiveDate) -> Vec<BacktestPoint> {
    truth
        .points()
        .filter(|p| p.value.is_finite())
        .filter_map(|p| {
            let row = forecast.at(p.date)?;
            Some(BacktestPoint {
                date: p.date,
                horizon: (p.date - cutoff).num_days() as usize + 1,
                truth: p.value,
                prediction: row.point,
                lower: row.lower,
                upper: row.upper,
            })
        })
        .collect()
}

/// Group fold points by horizon offset and compute accuracy per group.
pub fn metrics_by_horizon(folds: &[BacktestFold]) -> Result<Vec<MetricRow>> {
    let mut groups: BTreeMap<usize, Vec<&BacktestPoint>> = BTreeMap::new();
    for point in folds.iter().flat_map(|f| &f.points) {
        groups.entry(point.horizon).or_default().push(point);
    }

    groups
        .into_iter()
        .map(|(horizon, points)| {
            let truth: Vec<f64> = points.iter().map(|p| p.truth).collect();
            let prediction: Vec<f64> = points.iter().map(|p| p.prediction).collect();
            let lower: Vec<f64> = points.iter().map(|p| p.lower).collect();
            let upper: Vec<f64> = points.iter().map(|p| p.upper).collect();

            let accuracy = calculate_metrics(&truth, &prediction)?;
            Ok(MetricRow {
                horizon,
                rmse: accuracy.rmse,
                mse: accuracy.mse,
                mae: accuracy.mae,
                mape: accuracy.mape,
                smape: accuracy.smape,
                coverage: coverage(&truth, &lower, &upper)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn series(n: usize) -> DailySeries {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let dates = (0..n).map(|i| start + Duration::days(i as i64)).collect();
        let values = (0..n)
            .map(|i| 50.0 + 0.05 * i as f64 + [3.0, 1.0, 0.0, -1.0, -2.0, -4.0, 3.0][i % 7])
            .collect();
        DailySeries::new(dates, values).unwrap()
    }

    fn small_config() -> BacktestConfig {
        BacktestConfig::new(60, 20, 10)
    }

    fn model() -> AdditiveModel {
        AdditiveModel::new(ForecastConfig::default())
    }

    #[test]
    fn fold_count_matches_formula() {
        let config = BacktestConfig::default();
        assert_eq!(config.fold_count(1500), 2);
        assert_eq!(config.fold_count(1185), 1);
        assert_eq!(config.fold_count(1184), 0);
        assert_eq!(small_config().fold_count(130), 4);
    }

    #[test]
    fn folds_cover_each_horizon() {
        let result = backtest(&small_config(), &series(130), model).unwrap();

        assert_eq!(result.n_folds(), 4);
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert_eq!(result.folds[0].cutoff, start + Duration::days(60));
        assert_eq!(result.folds[1].cutoff, start + Duration::days(80));
        assert!(result.folds.iter().all(|f| f.points.len() == 10));

        let horizons: Vec<usize> = result.metrics.iter().map(|m| m.horizon).collect();
        assert_eq!(horizons, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn metrics_are_well_formed() {
        let result = backtest(&small_config(), &series(130), model).unwrap();
        for row in &result.metrics {
            assert!(row.rmse >= 0.0 && row.mae >= 0.0);
            assert!(row.mape.unwrap() >= 0.0);
            assert!((0.0..=1.0).contains(&row.coverage));
            assert_relative_eq!(row.rmse, row.mse.sqrt(), epsilon = 1e-12);
        }
    }

    #[test]
    fn training_never_sees_the_cutoff() {
        let result = backtest(&small_config(), &series(100), model).unwrap();
        for fold in &result.folds {
            assert!(fold.points.iter().all(|p| p.date >= fold.cutoff));
            assert_eq!(fold.points[0].date, fold.cutoff);
            assert_eq!(fold.points[0].horizon, 1);
        }
    }

    #[test]
    fn short_series_is_insufficient_history() {
        let err = backtest(&small_config(), &series(69), model).unwrap_err();
        assert_eq!(err, PipelineError::InsufficientHistory { needed: 70, got: 69 });
    }

    #[test]
    fn metrics_group_by_horizon() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let point = |day, horizon, truth: f64, prediction: f64| BacktestPoint {
            date: d(day),
            horizon,
            truth,
            prediction,
            lower: prediction - 1.0,
            upper: prediction + 1.0,
        };
        let folds = vec![
            BacktestFold {
                cutoff: d(1),
                points: vec![point(1, 1, 10.0, 10.5), point(2, 2, 0.0, 3.0)],
            },
            BacktestFold {
                cutoff: d(5),
                points: vec![point(5, 1, 10.0, 8.5), point(6, 2, 0.0, 1.0)],
            },
        ];

        let rows = metrics_by_horizon(&folds).unwrap();

        assert_eq!(rows.len(), 2);
        assert_relative_eq!(rows[0].mae, 1.0);
        assert_relative_eq!(rows[0].coverage, 0.5);
        assert_relative_eq!(rows[0].mape.unwrap(), 0.1, epsilon = 1e-12);
        assert!(rows[1].mape.is_none());
        assert_relative_eq!(rows[1].coverage, 0.5);
    }

    #[test]
    fn zero_windows_are_rejected() {
        assert!(BacktestConfig::new(0, 1, 1).validate().is_err());
        assert!(backtest(&BacktestConfig::new(10, 0, 5), &series(100), model).is_err());
    }
}
