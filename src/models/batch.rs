//! Parallel per-series forecasting over a whole store/item table.

use super::additive::{AdditiveModel, ForecastConfig};
use crate::core::{DailySeries, SeriesForecast, SeriesKey};
use crate::error::{PipelineError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Tolerance and resource settings for a batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum tolerated per-series failures; `None` tolerates any number
    /// short of all series failing.
    pub max_failures: Option<usize>,
    /// Worker threads; `None` uses one per available core.
    pub threads: Option<usize>,
}

impl BatchConfig {
    /// Fail the batch when more than `max` series fail.
    pub fn with_max_failures(mut self, max: usize) -> Self {
        self.max_failures = Some(max);
        self
    }

    /// Limit the number of worker threads.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.threads == Some(0) {
            return Err(PipelineError::InvalidParameter(
                "thread count must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Progress notification, emitted once per finished series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// Series finished so far, this one included.
    pub completed: usize,
    pub total: usize,
    /// Series that just finished.
    pub key: SeriesKey,
}

/// A series that could not be forecast.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesFailure {
    pub key: SeriesKey,
    pub error: PipelineError,
}

/// Combined result of a batch run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchForecast {
    /// Forecasts of every series that succeeded.
    pub forecasts: BTreeMap<SeriesKey, SeriesForecast>,
    /// Series that failed, in key order.
    pub failures: Vec<SeriesFailure>,
    /// Series left unprocessed after an abort, in key order.
    pub skipped: Vec<SeriesKey>,
}

impl BatchForecast {
    pub fn get(&self, key: &SeriesKey) -> Option<&SeriesForecast> {
        self.forecasts.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &SeriesKey> {
        self.forecasts.keys()
    }

    pub fn len(&self) -> usize {
        self.forecasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forecasts.is_empty()
    }

    /// Total number of rows over all forecasts.
    pub fn row_count(&self) -> usize {
        self.forecasts.values().map(|f| f.len()).sum()
    }
}

/// Cloneable handle that stops a running batch between series.
///
/// The flag stays set after the run it stopped; call [`AbortHandle::reset`]
/// before reusing the runner.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag so the next run processes every series.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

type ProgressFn = Box<dyn Fn(&BatchProgress) + Send + Sync>;

/// Runs one independent [`AdditiveModel`] per series on a rayon pool.
///
/// # Example
///
/// ```
/// use retail_pulse::core::{DailySeries, SeriesKey};
/// use retail_pulse::models::{BatchConfig, BatchRunner, ForecastConfig};
/// use chrono::{Duration, NaiveDate};
/// use std::collections::BTreeMap;
///
/// let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
/// let dates: Vec<_> = (0..28).map(|i| start + Duration::days(i)).collect();
/// let values: Vec<f64> = (0..28).map(|i| 10.0 + (i % 7) as f64).collect();
///
/// let mut table = BTreeMap::new();
/// table.insert(SeriesKey::new(1, 1), DailySeries::new(dates, values).unwrap());
///
/// let batch = BatchRunner::new(ForecastConfig::default().with_horizon(7), BatchConfig::default())
///     .run(&table)
///     .unwrap();
/// assert_eq!(batch.get(&SeriesKey::new(1, 1)).unwrap().len(), 35);
/// ```
pub struct BatchRunner {
    forecast: ForecastConfig,
    batch: BatchConfig,
    abort: AbortHandle,
    on_progress: Option<ProgressFn>,
}

impl BatchRunner {
    pub fn new(forecast: ForecastConfig, batch: BatchConfig) -> Self {
        Self {
            forecast,
            batch,
            abort: AbortHandle::default(),
            on_progress: None,
        }
    }

    /// Register a callback invoked after each series finishes.
    ///
    /// Called from worker threads; calls may arrive out of key order.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&BatchProgress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Box::new(callback));
        self
    }

    pub fn forecast_config(&self) -> &ForecastConfig {
        &self.forecast
    }

    pub fn batch_config(&self) -> &BatchConfig {
        &self.batch
    }

    /// Handle for aborting the remaining series of a run.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Forecast every series in `table`.
    ///
    /// Per-series failures are logged and listed in the result.
    ///
    /// # Errors
    /// - [`PipelineError::InvalidParameter`] for invalid configuration
    /// - [`PipelineError::EmptyData`] for an empty table
    /// - [`PipelineError::BatchForecast`] if every processed series failed or
    ///   the failures exceed `max_failures`
    pub fn run(&self, table: &BTreeMap<SeriesKey, DailySeries>) -> Result<BatchForecast> {
        self.forecast.validate()?;
        self.batch.validate()?;
        if table.is_empty() {
            return Err(PipelineError::EmptyData);
        }

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(threads) = self.batch.threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder
            .build()
            .map_err(|e| PipelineError::ComputationError(format!("thread pool: {}", e)))?;

        let total = table.len();
        let completed = AtomicUsize::new(0);
        if self.abort.is_aborted() {
            log::warn!("runner was aborted before this run; reset the abort handle to forecast");
        }
        log::info!("forecasting {} series, horizon {} days", total, self.forecast.horizon);

        let entries: Vec<(&SeriesKey, &DailySeries)> = table.iter().collect();
        let outcomes: Vec<(SeriesKey, Option<Result<SeriesForecast>>)> = pool.install(|| {
            entries
                .par_iter()
                .map(|&(key, series)| {
                    if self.abort.is_aborted() {
                        return (*key, None);
                    }
                    let result = AdditiveModel::fit_predict(&self.forecast, series);
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    log::info!("series {} of {} done ({})", done, total, key);
                    if let Some(callback) = &self.on_progress {
                        callback(&BatchProgress {
                            completed: done,
                            total,
                            key: *key,
                        });
                    }
                    (*key, Some(result))
                })
                .collect()
        });

        let mut batch = BatchForecast::default();
        for (key, outcome) in outcomes {
            match outcome {
                Some(Ok(forecast)) => {
                    batch.forecasts.insert(key, forecast);
                }
                Some(Err(error)) => {
                    log::warn!("forecast for {} failed: {}", key, error);
                    batch.failures.push(SeriesFailure { key, error });
                }
                None => batch.skipped.push(key),
            }
        }

        let failed = batch.failures.len();
        let processed = failed + batch.forecasts.len();
        let too_many = self.batch.max_failures.is_some_and(|max| failed > max);
        if (processed > 0 && batch.forecasts.is_empty()) || too_many {
            return Err(PipelineError::BatchForecast { failed, total });
        }
        if !batch.skipped.is_empty() {
            log::warn!("batch aborted, {} series skipped", batch.skipped.len());
        }
        log::info!("forecast {} of {} series", batch.forecasts.len(), total);
        Ok(batch)
    }
}

/// Forecast every series with default batch settings.
pub fn run_batch_forecast(
    table: &BTreeMap<SeriesKey, DailySeries>,
    forecast: &ForecastConfig,
    batch: &BatchConfig,
) -> Result<BatchForecast> {
    BatchRunner::new(forecast.clone(), batch.clone()).run(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use std::sync::Mutex;

    fn series(n: usize, level: f64) -> DailySeries {
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let dates = (0..n).map(|i| start + Duration::days(i as i64)).collect();
        let values = (0..n).map(|i| level + (i % 7) as f64).collect();
        DailySeries::new(dates, values).unwrap()
    }

    fn table(lengths: &[(u32, usize)]) -> BTreeMap<SeriesKey, DailySeries> {
        lengths
            .iter()
            .map(|&(item, n)| (SeriesKey::new(1, item), series(n, 10.0 * item as f64)))
            .collect()
    }

    fn config() -> ForecastConfig {
        ForecastConfig::default().with_horizon(10)
    }

    #[test]
    fn forecasts_every_series() {
        let batch = run_batch_forecast(
            &table(&[(1, 60), (2, 45), (3, 30)]),
            &config(),
            &BatchConfig::default(),
        )
        .unwrap();

        assert_eq!(batch.len(), 3);
        assert!(batch.failures.is_empty());
        assert_eq!(batch.get(&SeriesKey::new(1, 2)).unwrap().len(), 55);
        assert_eq!(batch.row_count(), 70 + 55 + 40);
    }

    #[test]
    fn isolates_single_series_failures() {
        let batch = run_batch_forecast(
            &table(&[(1, 60), (2, 5), (3, 30)]),
            &config(),
            &BatchConfig::default(),
        )
        .unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].key, SeriesKey::new(1, 2));
        assert!(matches!(batch.failures[0].error, PipelineError::Fit(_)));
    }

    #[test]
    fn all_failures_fail_the_batch() {
        let err = run_batch_forecast(&table(&[(1, 3), (2, 4)]), &config(), &BatchConfig::default())
            .unwrap_err();
        assert_eq!(err, PipelineError::BatchForecast { failed: 2, total: 2 });
    }

    #[test]
    fn failure_budget_is_enforced() {
        let err = run_batch_forecast(
            &table(&[(1, 60), (2, 5), (3, 4)]),
            &config(),
            &BatchConfig::default().with_max_failures(1),
        )
        .unwrap_err();
        assert_eq!(err, PipelineError::BatchForecast { failed: 2, total: 3 });
    }

    #[test]
    fn progress_reports_every_series() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let runner = BatchRunner::new(config(), BatchConfig::default().with_threads(2))
            .with_progress(move |p| sink.lock().unwrap().push((p.completed, p.total)));

        runner.run(&table(&[(1, 30), (2, 30), (3, 30), (4, 30)])).unwrap();

        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    }

    #[test]
    fn aborted_run_skips_remaining_series() {
        let runner = BatchRunner::new(config(), BatchConfig::default());
        runner.abort_handle().abort();

        let batch = runner.run(&table(&[(1, 30), (2, 30)])).unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.skipped.len(), 2);
    }

    #[test]
    fn reset_handle_lets_the_runner_forecast_again() {
        let runner = BatchRunner::new(config(), BatchConfig::default());
        let handle = runner.abort_handle();
        handle.abort();
        assert_eq!(runner.run(&table(&[(1, 30), (2, 30)])).unwrap().skipped.len(), 2);

        handle.reset();
        assert!(!handle.is_aborted());
        let batch = runner.run(&table(&[(1, 30), (2, 30)])).unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batch.skipped.is_empty());
    }

    #[test]
    fn empty_table_and_bad_threads_are_rejected() {
        assert_eq!(
            run_batch_forecast(&BTreeMap::new(), &config(), &BatchConfig::default()),
            Err(PipelineError::EmptyData)
        );
        assert!(BatchConfig::default().with_threads(0).validate().is_err());
    }
}
