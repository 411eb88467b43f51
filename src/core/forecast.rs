//! Forecast result structure holding in-sample fit and out-of-sample projection.

use crate::error::{PipelineError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One dated row of a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub date: NaiveDate,
    /// Point estimate.
    pub point: f64,
    /// Lower bound of the uncertainty band.
    pub lower: f64,
    /// Upper bound of the uncertainty band.
    pub upper: f64,
    /// Trend component of the point estimate.
    pub trend: f64,
    /// Sum of all seasonal components of the point estimate.
    pub seasonal: f64,
}

/// Forecast for one series: the fitted history followed by the projected horizon.
///
/// The first `history_len` rows are in-sample (one per historical date), the
/// remaining rows are out-of-sample and cover consecutive calendar days after
/// the last historical date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesForecast {
    dates: Vec<NaiveDate>,
    point: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    trend: Vec<f64>,
    seasonal: Vec<f64>,
    history_len: usize,
}

impl SeriesForecast {
    /// Assemble a forecast from column vectors.
    pub fn from_columns(
        dates: Vec<NaiveDate>,
        point: Vec<f64>,
        lower: Vec<f64>,
        upper: Vec<f64>,
        trend: Vec<f64>,
        seasonal: Vec<f64>,
        history_len: usize,
    ) -> Result<Self> {
        let n = dates.len();
        for column in [&point, &lower, &upper, &trend, &seasonal] {
            if column.len() != n {
                return Err(PipelineError::DimensionMismatch {
                    expected: n,
                    got: column.len(),
                });
            }
        }
        if history_len > n {
            return Err(PipelineError::InvalidParameter(format!(
                "history length {} exceeds forecast length {}",
                history_len, n
            )));
        }

        Ok(Self {
            dates,
            point,
            lower,
            upper,
            trend,
            seasonal,
            history_len,
        })
    }

    /// Total number of rows (history plus horizon).
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Number of in-sample rows.
    pub fn history_len(&self) -> usize {
        self.history_len
    }

    /// Number of out-of-sample rows.
    pub fn horizon(&self) -> usize {
        self.dates.len() - self.history_len
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn point(&self) -> &[f64] {
        &self.point
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    pub fn trend(&self) -> &[f64] {
        &self.trend
    }

    pub fn seasonal(&self) -> &[f64] {
        &self.seasonal
    }

    /// Row at `index`, if any.
    pub fn row(&self, index: usize) -> Option<ForecastRow> {
        Some(ForecastRow {
            date: *self.dates.get(index)?,
            point: self.point[index],
            lower: self.lower[index],
            upper: self.upper[index],
            trend: self.trend[index],
            seasonal: self.seasonal[index],
        })
    }

    /// Iterate over every row in date order.
    pub fn rows(&self) -> impl Iterator<Item = ForecastRow> + '_ {
        (0..self.len()).filter_map(move |i| self.row(i))
    }

    /// In-sample rows only.
    pub fn in_sample(&self) -> impl Iterator<Item = ForecastRow> + '_ {
        self.rows().take(self.history_len)
    }

    /// Out-of-sample rows only.
    pub fn out_of_sample(&self) -> impl Iterator<Item = ForecastRow> + '_ {
        self.rows().skip(self.history_len)
    }

    /// Row for a given date, if the forecast covers it.
    pub fn at(&self, date: NaiveDate) -> Option<ForecastRow> {
        self.dates
            .binary_search(&date)
            .ok()
            .and_then(|i| self.row(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_forecast() -> SeriesForecast {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates: Vec<NaiveDate> = (0..5).map(|i| base + Duration::days(i)).collect();
        SeriesForecast::from_columns(
            dates,
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
            vec![0.5, 1.5, 2.5, 3.0, 3.5],
            vec![1.5, 2.5, 3.5, 5.0, 6.5],
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
            vec![0.0; 5],
            3,
        )
        .unwrap()
    }

    #[test]
    fn forecast_splits_history_and_horizon() {
        let forecast = sample_forecast();

        assert_eq!(forecast.len(), 5);
        assert_eq!(forecast.history_len(), 3);
        assert_eq!(forecast.horizon(), 2);
        assert_eq!(forecast.in_sample().count(), 3);

        let future: Vec<f64> = forecast.out_of_sample().map(|r| r.point).collect();
        assert_eq!(future, vec![4.0, 5.0]);
    }

    #[test]
    fn forecast_looks_up_rows_by_date() {
        let forecast = sample_forecast();
        let date = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();

        let row = forecast.at(date).unwrap();
        assert_eq!(row.point, 4.0);
        assert_eq!(row.lower, 3.0);
        assert_eq!(row.upper, 5.0);

        let missing = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert!(forecast.at(missing).is_none());
    }

    #[test]
    fn forecast_rejects_ragged_columns() {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let result = SeriesForecast::from_columns(
            vec![base],
            vec![1.0, 2.0],
            vec![1.0],
            vec![1.0],
            vec![1.0],
            vec![0.0],
            1,
        );
        assert!(result.is_err());
    }
}
