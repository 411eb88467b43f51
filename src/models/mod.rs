//! Forecasting models.

mod traits;

pub mod additive;
pub mod batch;

pub use additive::{AdditiveModel, ForecastConfig};
pub use batch::{
    run_batch_forecast, AbortHandle, BatchConfig, BatchForecast, BatchProgress, BatchRunner,
    SeriesFailure,
};
pub use traits::{BoxedForecaster, Forecaster};
