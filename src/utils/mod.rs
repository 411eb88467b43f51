//! Utility functions for forecasting and evaluation.

pub mod backtest;
pub mod metrics;
pub mod ols;
pub mod stats;

pub use backtest::{
    backtest, backtest_additive, metrics_by_horizon, BacktestConfig, BacktestFold, BacktestPoint,
    BacktestResult, MetricRow,
};
pub use metrics::{calculate_metrics, coverage, AccuracyMetrics};
pub use ols::{ridge_fit, RidgeFit};
pub use stats::{interval_z, percentile, quantile_normal};
