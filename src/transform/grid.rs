//! Densify irregular event logs into regular daily series.

use crate::core::{DailySeries, SeriesKey};
use crate::error::{PipelineError, Result};
use crate::io::{SalesRecord, StoreItemRecord};
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;

/// Build a gap-free daily series from `(date, value)` events.
///
/// Values sharing a date are summed; non-finite values are skipped. The result
/// spans `[min_date, max_date]` inclusive, one point per calendar day, with
/// dates that had no events filled with 0.
///
/// # Errors
/// [`PipelineError::DataUnavailable`] if `events` is empty.
///
/// # Example
/// ```
/// use retail_pulse::transform::build_daily_grid;
/// use chrono::NaiveDate;
///
/// let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
/// let grid = build_daily_grid(vec![(d(1), 2.0), (d(1), 3.0), (d(4), 1.0)]).unwrap();
///
/// assert_eq!(grid.len(), 4);
/// assert_eq!(grid.values(), &[5.0, 0.0, 0.0, 1.0]);
/// ```
pub fn build_daily_grid<I>(events: I) -> Result<DailySeries>
where
    I: IntoIterator<Item = (NaiveDate, f64)>,
{
    let mut totals: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (date, value) in events {
        let total = totals.entry(date).or_insert(0.0);
        if value.is_finite() {
            *total += value;
        }
    }

    let (min_date, max_date) = match (totals.keys().next(), totals.keys().next_back()) {
        (Some(&min), Some(&max)) => (min, max),
        _ => {
            return Err(PipelineError::DataUnavailable(
                "no sales records to build a daily series from".to_string(),
            ))
        }
    };

    let days = (max_date - min_date).num_days() as usize + 1;
    let mut dates = Vec::with_capacity(days);
    let mut values = Vec::with_capacity(days);
    for offset in 0..days {
        let date = min_date + Duration::days(offset as i64);
        dates.push(date);
        values.push(totals.get(&date).copied().unwrap_or(0.0));
    }

    DailySeries::new(dates, values)
}

/// Daily sales grid for the transaction log.
pub fn daily_sales_grid(records: &[SalesRecord]) -> Result<DailySeries> {
    build_daily_grid(records.iter().map(|r| (r.date, r.sales)))
}

/// Split the store/item log into one series per [`SeriesKey`].
///
/// Rows sharing a key and date are summed. Gaps are kept as gaps (the
/// forecaster works on observed dates); a date whose rows are all missing
/// keeps a NaN value so it counts as a non-observation.
pub fn group_by_series(records: &[StoreItemRecord]) -> Result<BTreeMap<SeriesKey, DailySeries>> {
    if records.is_empty() {
        return Err(PipelineError::DataUnavailable(
            "store/item sales table is empty".to_string(),
        ));
    }

    let mut grouped: BTreeMap<SeriesKey, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
    for record in records {
        let slot = grouped
            .entry(record.key())
            .or_default()
            .entry(record.date)
            .or_insert(f64::NAN);
        if record.sales.is_finite() {
            *slot = if slot.is_nan() {
                record.sales
            } else {
                *slot + record.sales
            };
        }
    }

    grouped
        .into_iter()
        .map(|(key, by_date)| {
            let (dates, values): (Vec<_>, Vec<_>) = by_date.into_iter().unzip();
            Ok((key, DailySeries::new(dates, values)?))
        })
        .collect()
}
