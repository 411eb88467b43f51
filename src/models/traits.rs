//! Forecaster trait defining the common interface for per-series models.

use crate::core::{DailySeries, SeriesForecast};
use crate::error::Result;

/// Common interface for per-series forecasting models.
///
/// This trait is object-safe and can be used with `Box<dyn Forecaster>`.
pub trait Forecaster {
    /// Fit the model to one series' history.
    fn fit(&mut self, series: &DailySeries) -> Result<()>;

    /// Fitted history followed by `horizon` consecutive days past the last
    /// historical date.
    fn predict(&self, horizon: usize) -> Result<SeriesForecast>;

    /// Get the fitted values (in-sample predictions), one per historical date.
    fn fitted_values(&self) -> Option<&[f64]>;

    /// Get the residuals (actual - fitted); NaN where the actual was missing.
    fn residuals(&self) -> Option<&[f64]>;

    /// Get the model name.
    fn name(&self) -> &str;

    /// Check if the model has been fitted.
    fn is_fitted(&self) -> bool {
        self.fitted_values().is_some()
    }
}

/// Type alias for boxed forecaster trait objects.
///
/// # Example
///
/// ```
/// use retail_pulse::models::{AdditiveModel, BoxedForecaster, Forecaster};
///
/// let model: BoxedForecaster = Box::new(AdditiveModel::default());
/// assert_eq!(model.name(), "Additive");
/// assert!(!model.is_fitted());
/// ```
pub type BoxedForecaster = Box<dyn Forecaster + Send>;
