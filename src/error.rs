//! Error types for the retail-pulse pipeline.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while building, scoring or forecasting sales series.
///
/// Each variant halts only the view that produced it: a failed backtest leaves
/// the forecast view usable, and a single-series [`PipelineError::Fit`] is
/// recorded by the batch runner instead of being propagated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Input file is missing, unreadable or lacks a required column.
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    /// The outlier model could not be fitted on the feature matrix.
    #[error("outlier model fit failed: {0}")]
    ModelFit(String),

    /// A single-series forecast could not be fitted.
    #[error("forecast fit failed: {0}")]
    Fit(String),

    /// Every series in a batch failed, or more than the tolerated number did.
    #[error("batch forecast failed: {failed} of {total} series could not be fitted")]
    BatchForecast { failed: usize, total: usize },

    /// The series is too short for the requested backtest windows.
    #[error("insufficient history for backtest: need {needed} days, got {got}")]
    InsufficientHistory { needed: usize, got: usize },

    /// Input data is empty.
    #[error("empty input data")]
    EmptyData,

    /// Insufficient data points for the operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Dimension mismatch between data structures.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Numerical failure inside a computation.
    #[error("computation error: {0}")]
    ComputationError(String),
}

impl PipelineError {
    /// Whether the error ends the view that raised it.
    ///
    /// Only [`PipelineError::Fit`] is recoverable, and only at the batch
    /// runner boundary.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PipelineError::Fit(_))
    }
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        PipelineError::DataUnavailable(err.to_string())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::DataUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_descriptive() {
        let err = PipelineError::DataUnavailable("train.csv not found".to_string());
        assert_eq!(err.to_string(), "data unavailable: train.csv not found");

        let err = PipelineError::InsufficientHistory {
            needed: 1185,
            got: 400,
        };
        assert_eq!(
            err.to_string(),
            "insufficient history for backtest: need 1185 days, got 400"
        );

        let err = PipelineError::BatchForecast {
            failed: 3,
            total: 3,
        };
        assert_eq!(
            err.to_string(),
            "batch forecast failed: 3 of 3 series could not be fitted"
        );

        let err = PipelineError::InsufficientData { needed: 10, got: 5 };
        assert_eq!(
            err.to_string(),
            "insufficient data: need at least 10, got 5"
        );
    }

    #[test]
    fn only_single_series_fit_errors_are_recoverable() {
        assert!(!PipelineError::Fit("too short".to_string()).is_fatal());
        assert!(PipelineError::ModelFit("nan".to_string()).is_fatal());
        assert!(PipelineError::EmptyData.is_fatal());
    }

    #[test]
    fn io_errors_map_to_data_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err: PipelineError = io.into();
        assert!(matches!(err, PipelineError::DataUnavailable(_)));
    }

    #[test]
    fn errors_are_clonable_and_comparable() {
        let err1 = PipelineError::EmptyData;
        let err2 = err1.clone();
        assert_eq!(err1, err2);
    }
}
