//! Daily sales series keyed by calendar date.

use crate::error::{PipelineError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One observation of a daily series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimePoint {
    pub date: NaiveDate,
    pub value: f64,
}

impl TimePoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// A univariate series of daily values with strictly increasing dates.
///
/// Dates need not be contiguous: raw per-store series may have gaps. The
/// grid builder produces contiguous series, which [`DailySeries::is_contiguous`]
/// reports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailySeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl DailySeries {
    /// Create a series, validating that dates are strictly increasing.
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(PipelineError::DimensionMismatch {
                expected: dates.len(),
                got: values.len(),
            });
        }

        for i in 1..dates.len() {
            if dates[i] <= dates[i - 1] {
                return Err(PipelineError::InvalidParameter(format!(
                    "dates must be strictly increasing ({} follows {})",
                    dates[i],
                    dates[i - 1]
                )));
            }
        }

        Ok(Self { dates, values })
    }

    /// Get the number of observations.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Check if the series is empty.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Observation at `index`, if any.
    pub fn point(&self, index: usize) -> Option<TimePoint> {
        Some(TimePoint::new(
            *self.dates.get(index)?,
            *self.values.get(index)?,
        ))
    }

    /// Iterate over observations in date order.
    pub fn points(&self) -> impl Iterator<Item = TimePoint> + '_ {
        self.dates
            .iter()
            .zip(self.values.iter())
            .map(|(&date, &value)| TimePoint { date, value })
    }

    /// Number of calendar days covered, first and last date inclusive.
    pub fn span_days(&self) -> usize {
        match (self.first_date(), self.last_date()) {
            (Some(first), Some(last)) => (last - first).num_days() as usize + 1,
            _ => 0,
        }
    }

    /// True when every calendar day between first and last date is present.
    pub fn is_contiguous(&self) -> bool {
        self.span_days() == self.len()
    }

    /// Count of finite (non-missing) values.
    pub fn finite_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_finite()).count()
    }

    /// Observations dated strictly before `cutoff`.
    pub fn before(&self, cutoff: NaiveDate) -> DailySeries {
        let end = self.dates.partition_point(|d| *d < cutoff);
        DailySeries {
            dates: self.dates[..end].to_vec(),
            values: self.values[..end].to_vec(),
        }
    }

    /// Observations dated in `[start, end)`.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> DailySeries {
        let lo = self.dates.partition_point(|d| *d < start);
        let hi = self.dates.partition_point(|d| *d < end).max(lo);
        DailySeries {
            dates: self.dates[lo..hi].to_vec(),
            values: self.values[lo..hi].to_vec(),
        }
    }
}
