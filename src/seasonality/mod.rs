//! Seasonal decomposition of daily sales.
//!
//! - [`STL`]: Seasonal-Trend decomposition using LOESS, optionally robust
//! - [`decompose_series`]: decomposition of a daily grid with graceful fallback

mod decompose;
mod stl;

pub use decompose::{
    decompose_series, DecomposedPoint, Decomposition, DecompositionConfig, DecompositionWarning,
};
pub use stl::{STLResult, STL};
