//! # retail-pulse
//!
//! Daily retail sales analytics: anomaly detection on a single transaction
//! log and per-store/item demand forecasting with rolling-origin backtests.
//!
//! - [`transform`]: event logs to contiguous daily grids
//! - [`seasonality`]: robust STL decomposition with graceful fallback
//! - [`detection`]: isolation-forest scoring and spike/drop labelling
//! - [`models`]: additive trend/seasonality model and the parallel batch runner
//! - [`utils`]: backtesting, accuracy metrics and numeric helpers
//! - [`dashboard`]: view models for the anomaly and forecast dashboards

#![allow(clippy::upper_case_acronyms)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![allow(clippy::needless_range_loop)]

pub mod cache;
pub mod config;
pub mod core;
pub mod dashboard;
pub mod detection;
pub mod error;
pub mod io;
pub mod models;
pub mod seasonality;
pub mod transform;
pub mod utils;

pub use error::{PipelineError, Result};

pub mod prelude {
    pub use crate::cache::PipelineCache;
    pub use crate::config::PipelineConfig;
    pub use crate::core::{DailySeries, SeriesForecast, SeriesKey};
    pub use crate::dashboard::{AnomalySession, ForecastSession};
    pub use crate::detection::{ClassifiedAnomaly, Direction};
    pub use crate::error::{PipelineError, Result};
    pub use crate::models::{AdditiveModel, ForecastConfig, Forecaster};
    pub use crate::utils::{calculate_metrics, AccuracyMetrics, BacktestConfig};
}
