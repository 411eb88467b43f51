//! Aggregate configuration for both dashboards.

use crate::detection::OutlierConfig;
use crate::error::{PipelineError, Result};
use crate::models::{BatchConfig, ForecastConfig};
use crate::seasonality::DecompositionConfig;
use crate::utils::BacktestConfig;
use serde::{Deserialize, Serialize};

/// Number of rows in the top-anomalies table.
pub const DEFAULT_TOP_N: usize = 10;

/// Every tunable of the anomaly and forecast pipelines.
///
/// Missing sections and fields take their defaults, so a partial JSON
/// document is a valid override.
///
/// # Example
/// ```
/// use retail_pulse::config::PipelineConfig;
///
/// let config = PipelineConfig::from_json_str(r#"{"outlier": {"contamination": 0.02}}"#).unwrap();
/// assert_eq!(config.outlier.contamination, 0.02);
/// assert_eq!(config.outlier.seed, 42);
/// assert_eq!(config.forecast.horizon, 365);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub decomposition: DecompositionConfig,
    pub outlier: OutlierConfig,
    pub forecast: ForecastConfig,
    pub batch: BatchConfig,
    pub backtest: BacktestConfig,
    /// Rows in the top-anomalies table.
    pub top_n: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            decomposition: DecompositionConfig::default(),
            outlier: OutlierConfig::default(),
            forecast: ForecastConfig::default(),
            batch: BatchConfig::default(),
            backtest: BacktestConfig::default(),
            top_n: DEFAULT_TOP_N,
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a JSON override document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| PipelineError::InvalidParameter(format!("configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PipelineError::InvalidParameter(format!("configuration: {}", e)))
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.decomposition.validate()?;
        self.outlier.validate()?;
        self.forecast.validate()?;
        self.batch.validate()?;
        self.backtest.validate()
    }
}
