//! View models consumed by the two dashboards.
//!
//! [`AnomalySession`] is the single-series anomaly view: grid, decomposition,
//! scores, classified anomalies and the top-N table. [`ForecastSession`] is
//! the multi-series forecast view: selection lists, the combined forecast and
//! an on-demand backtest.

use crate::cache::PipelineCache;
use crate::config::PipelineConfig;
use crate::core::{DailySeries, SeriesForecast, SeriesKey};
use crate::detection::{
    classify_anomalies, score_outliers, top_anomalies, ClassifiedAnomaly, Direction, OutlierScores,
};
use crate::error::{PipelineError, Result};
use crate::io::{load_store_item_sales, load_transactions, SalesRecord, StoreItemRecord};
use crate::models::{BatchForecast, BatchProgress, BatchRunner, SeriesFailure};
use crate::seasonality::{decompose_series, Decomposition, DecompositionWarning};
use crate::utils::backtest::{backtest_additive, BacktestResult, MetricRow};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

/// Anomaly view of one transaction log.
#[derive(Debug, Clone)]
pub struct AnomalySession {
    pub grid: Arc<DailySeries>,
    pub decomposition: Decomposition,
    pub scores: OutlierScores,
    /// Every labelled anomaly, in date order.
    pub anomalies: Vec<ClassifiedAnomaly>,
    top_n: usize,
}

impl AnomalySession {
    /// Run grid building, decomposition, scoring and classification.
    ///
    /// # Errors
    /// [`PipelineError::DataUnavailable`] for an empty log,
    /// [`PipelineError::ModelFit`] if the outlier model cannot be fitted, or
    /// [`PipelineError::InvalidParameter`] for an invalid configuration.
    pub fn from_records(
        records: &[SalesRecord],
        config: &PipelineConfig,
        cache: &PipelineCache,
    ) -> Result<Self> {
        let grid = cache.daily_grid(records)?;
        let decomposition = decompose_series(&grid, &config.decomposition)?;
        let scores = score_outliers(&decomposition, &config.outlier)?;
        let anomalies = classify_anomalies(&scores.points);

        log::info!(
            "{} days scored, {} anomalies",
            grid.len(),
            anomalies.len()
        );
        Ok(Self {
            grid,
            decomposition,
            scores,
            anomalies,
            top_n: config.top_n,
        })
    }

    /// Load a transaction log from CSV and build the view.
    pub fn load<P: AsRef<Path>>(
        path: P,
        config: &PipelineConfig,
        cache: &PipelineCache,
    ) -> Result<Self> {
        let records = load_transactions(path)?;
        Self::from_records(&records, config, cache)
    }

    /// Non-blocking notice shown when decomposition fell back to raw values.
    pub fn warning(&self) -> Option<&DecompositionWarning> {
        self.decomposition.warning.as_ref()
    }

    /// Highest-scoring anomalies, most recent first on ties.
    pub fn top_anomalies(&self) -> Vec<ClassifiedAnomaly> {
        top_anomalies(&self.anomalies, self.top_n)
    }

    /// Anomalies with the given direction.
    pub fn with_direction(&self, direction: Direction) -> impl Iterator<Item = &ClassifiedAnomaly> {
        self.anomalies
            .iter()
            .filter(move |a| a.direction == Some(direction))
    }

    /// Anomalies whose direction cannot be derived.
    pub fn unclassified(&self) -> impl Iterator<Item = &ClassifiedAnomaly> {
        self.anomalies.iter().filter(|a| a.direction.is_none())
    }
}

/// History and forecast of one selected series.
#[derive(Debug, Clone, Copy)]
pub struct SeriesView<'a> {
    pub key: SeriesKey,
    pub history: &'a DailySeries,
    /// Absent when this series failed to fit.
    pub forecast: Option<&'a SeriesForecast>,
}

/// Backtest of one series, computed on request.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestView {
    pub key: SeriesKey,
    pub result: BacktestResult,
}

impl BacktestView {
    pub fn metrics(&self) -> &[MetricRow] {
        &self.result.metrics
    }
}

/// Forecast view of one store/item table.
#[derive(Debug, Clone)]
pub struct ForecastSession {
    table: Arc<BTreeMap<SeriesKey, DailySeries>>,
    forecasts: Arc<BatchForecast>,
    config: PipelineConfig,
    backtest: Option<BacktestView>,
}

impl ForecastSession {
    /// Group the table by series and forecast every series.
    ///
    /// # Errors
    /// [`PipelineError::DataUnavailable`] for an empty table or
    /// [`PipelineError::BatchForecast`] when the batch fails.
    pub fn from_records(
        records: &[StoreItemRecord],
        config: &PipelineConfig,
        cache: &PipelineCache,
    ) -> Result<Self> {
        let runner = BatchRunner::new(config.forecast.clone(), config.batch.clone());
        Self::build(records, config, cache, &runner)
    }

    /// As [`ForecastSession::from_records`], reporting batch progress.
    pub fn from_records_with_progress<F>(
        records: &[StoreItemRecord],
        config: &PipelineConfig,
        cache: &PipelineCache,
        progress: F,
    ) -> Result<Self>
    where
        F: Fn(&BatchProgress) + Send + Sync + 'static,
    {
        let runner = BatchRunner::new(config.forecast.clone(), config.batch.clone())
            .with_progress(progress);
        Self::build(records, config, cache, &runner)
    }

    /// Load a store/item table from CSV and build the view.
    pub fn load<P: AsRef<Path>>(
        path: P,
        config: &PipelineConfig,
        cache: &PipelineCache,
    ) -> Result<Self> {
        let records = load_store_item_sales(path)?;
        Self::from_records(&records, config, cache)
    }

    fn build(
        records: &[StoreItemRecord],
        config: &PipelineConfig,
        cache: &PipelineCache,
        runner: &BatchRunner,
    ) -> Result<Self> {
        config.validate()?;
        let table = cache.series_table(records)?;
        let forecasts = cache.batch_forecast(&table, runner)?;

        Ok(Self {
            table,
            forecasts,
            config: config.clone(),
            backtest: None,
        })
    }

    /// Every series key, ascending.
    pub fn keys(&self) -> Vec<SeriesKey> {
        self.table.keys().copied().collect()
    }

    /// Distinct stores, ascending.
    pub fn stores(&self) -> Vec<u32> {
        let stores: BTreeSet<u32> = self.table.keys().map(|k| k.store).collect();
        stores.into_iter().collect()
    }

    /// Distinct items, ascending.
    pub fn items(&self) -> Vec<u32> {
        let items: BTreeSet<u32> = self.table.keys().map(|k| k.item).collect();
        items.into_iter().collect()
    }

    /// The combined forecast table.
    pub fn forecasts(&self) -> &BatchForecast {
        &self.forecasts
    }

    /// Series that could not be forecast.
    pub fn failures(&self) -> &[SeriesFailure] {
        &self.forecasts.failures
    }

    /// History and forecast for one store/item selection.
    pub fn select(&self, store: u32, item: u32) -> Option<SeriesView<'_>> {
        let key = SeriesKey::new(store, item);
        let history = self.table.get(&key)?;
        Some(SeriesView {
            key,
            history,
            forecast: self.forecasts.get(&key),
        })
    }

    /// Series backtested when the caller names none: the smallest key.
    pub fn default_backtest_key(&self) -> Option<SeriesKey> {
        self.table.keys().next().copied()
    }

    /// Result of the last requested backtest, if any.
    pub fn backtest(&self) -> Option<&BacktestView> {
        self.backtest.as_ref()
    }

    /// Backtest one series and keep the result on the session.
    ///
    /// A failure leaves the forecast view and any previous backtest intact.
    ///
    /// # Errors
    /// - [`PipelineError::DataUnavailable`] for an unknown key
    /// - [`PipelineError::InsufficientHistory`] if the series is too short
    pub fn run_backtest(&mut self, key: Option<SeriesKey>) -> Result<&BacktestView> {
        let key = key
            .or_else(|| self.default_backtest_key())
            .ok_or(PipelineError::EmptyData)?;
        let series = self
            .table
            .get(&key)
            .ok_or_else(|| PipelineError::DataUnavailable(format!("no series for {}", key)))?;

        let result = backtest_additive(&self.config.backtest, &self.config.forecast, series)?;
        log::info!("backtest of {}: {} folds", key, result.n_folds());
        Ok(self.backtest.insert(BacktestView { key, result }))
    }
}
