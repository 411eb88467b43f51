//! Memoization of expensive pipeline steps.
//!
//! Results are keyed by operation name, a SHA-256 fingerprint of the input
//! content and the serialized parameters. At most one computation runs per
//! key; concurrent callers for the same key block until it finishes and then
//! reuse its value. Failed computations are not cached.

use crate::core::{DailySeries, SeriesKey};
use crate::error::{PipelineError, Result};
use crate::io::{SalesRecord, StoreItemRecord};
use crate::models::{BatchForecast, BatchRunner, ForecastConfig};
use crate::transform::{daily_sales_grid, group_by_series};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Identity of one memoized result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub operation: String,
    /// Hex SHA-256 of the input content.
    pub content: String,
    /// Serialized parameters.
    pub params: String,
}

impl CacheKey {
    /// Build a key, serializing `params` to JSON.
    pub fn new<P: Serialize>(operation: &str, content: String, params: &P) -> Result<Self> {
        let params = serde_json::to_string(params)
            .map_err(|e| PipelineError::InvalidParameter(format!("unserializable parameters: {}", e)))?;
        Ok(Self {
            operation: operation.to_string(),
            content,
            params,
        })
    }
}

/// Content fingerprint of a transaction log.
pub fn fingerprint_sales(records: &[SalesRecord]) -> String {
    let mut hasher = Sha256::new();
    for r in records {
        hasher.update(r.date.to_string().as_bytes());
        hasher.update(r.sales.to_bits().to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Content fingerprint of a store/item sales table.
pub fn fingerprint_store_items(records: &[StoreItemRecord]) -> String {
    let mut hasher = Sha256::new();
    for r in records {
        hasher.update(r.date.to_string().as_bytes());
        hasher.update(r.store.to_le_bytes());
        hasher.update(r.item.to_le_bytes());
        hasher.update(r.sales.to_bits().to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Content fingerprint of a set of keyed series.
pub fn fingerprint_table(table: &BTreeMap<SeriesKey, DailySeries>) -> String {
    let mut hasher = Sha256::new();
    for (key, series) in table {
        hasher.update(key.store.to_le_bytes());
        hasher.update(key.item.to_le_bytes());
        for p in series.points() {
            hasher.update(p.date.to_string().as_bytes());
            hasher.update(p.value.to_bits().to_le_bytes());
        }
    }
    format!("{:x}", hasher.finalize())
}

type Slot<V> = Arc<Mutex<Option<V>>>;

/// Read-mostly memo table with single-writer-per-key semantics.
#[derive(Debug)]
pub struct Memo<V> {
    slots: Mutex<HashMap<CacheKey, Slot<V>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl<V> Default for Memo<V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic inside `compute` leaves the slot empty, which is still valid.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<V: Clone> Memo<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value for `key`, computing it on first use.
    ///
    /// # Errors
    /// Whatever `compute` returns; the failure is not cached.
    pub fn get_or_compute<F>(&self, key: CacheKey, compute: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        self.get_or_compute_if(key, compute, |_| true)
    }

    /// As [`Memo::get_or_compute`], storing the computed value only when
    /// `cacheable` accepts it.
    pub fn get_or_compute_if<F, C>(&self, key: CacheKey, compute: F, cacheable: C) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
        C: FnOnce(&V) -> bool,
    {
        let slot = {
            let mut slots = lock(&self.slots);
            Arc::clone(slots.entry(key.clone()).or_default())
        };

        let mut value = lock(&slot);
        if let Some(cached) = value.as_ref() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            log::debug!("cache hit for {}", key.operation);
            return Ok(cached.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        log::debug!("cache miss for {}, computing", key.operation);
        let computed = compute()?;
        if cacheable(&computed) {
            *value = Some(computed.clone());
        } else {
            log::debug!("result of {} not cached", key.operation);
        }
        Ok(computed)
    }

    /// Cached value for `key`, if already computed.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let slot = lock(&self.slots).get(key).cloned()?;
        let value = lock(&slot);
        value.clone()
    }

    /// Number of completed entries.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot<V>> = lock(&self.slots).values().cloned().collect();
        slots.iter().filter(|s| lock(s).is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    /// Drop every entry.
    pub fn clear(&self) {
        lock(&self.slots).clear();
    }
}

/// Parameters that change the outcome of a batch run.
///
/// Thread count only changes scheduling, so it is left out.
#[derive(Debug, Serialize)]
struct BatchParams<'a> {
    forecast: &'a ForecastConfig,
    max_failures: Option<usize>,
}

/// Memo tables for the expensive steps of both dashboards.
#[derive(Debug, Default)]
pub struct PipelineCache {
    grids: Memo<Arc<DailySeries>>,
    tables: Memo<Arc<BTreeMap<SeriesKey, DailySeries>>>,
    forecasts: Memo<Arc<BatchForecast>>,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Daily grid of a transaction log.
    pub fn daily_grid(&self, records: &[SalesRecord]) -> Result<Arc<DailySeries>> {
        let key = CacheKey::new("daily_grid", fingerprint_sales(records), &())?;
        self.grids
            .get_or_compute(key, || daily_sales_grid(records).map(Arc::new))
    }

    /// Per-key series of a store/item table.
    pub fn series_table(
        &self,
        records: &[StoreItemRecord],
    ) -> Result<Arc<BTreeMap<SeriesKey, DailySeries>>> {
        let key = CacheKey::new("series_table", fingerprint_store_items(records), &())?;
        self.tables
            .get_or_compute(key, || group_by_series(records).map(Arc::new))
    }

    /// Batch forecast of `table`, keyed by its content, the forecast settings
    /// and the failure budget.
    ///
    /// An aborted run is returned but not stored.
    pub fn batch_forecast(
        &self,
        table: &BTreeMap<SeriesKey, DailySeries>,
        runner: &BatchRunner,
    ) -> Result<Arc<BatchForecast>> {
        let params = BatchParams {
            forecast: runner.forecast_config(),
            max_failures: runner.batch_config().max_failures,
        };
        let key = CacheKey::new("batch_forecast", fingerprint_table(table), &params)?;
        self.forecasts.get_or_compute_if(
            key,
            || runner.run(table).map(Arc::new),
            |batch| batch.skipped.is_empty(),
        )
    }

    /// Number of forecast batches computed so far.
    pub fn forecast_misses(&self) -> usize {
        self.forecasts.misses()
    }

    pub fn clear(&self) {
        self.grids.clear();
        self.tables.clear();
        self.forecasts.clear();
    }
}
