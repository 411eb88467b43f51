//! Core data structures for daily sales series and forecasts.

mod forecast;
mod series_key;
mod time_series;

pub use forecast::{ForecastRow, SeriesForecast};
pub use series_key::SeriesKey;
pub use time_series::{DailySeries, TimePoint};
