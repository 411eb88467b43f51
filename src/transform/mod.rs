//! Data transformations from raw sales tables to regular series.
//!
//! # Example
//!
//! ```
//! use retail_pulse::transform::build_daily_grid;
//! use chrono::NaiveDate;
//!
//! let d = |day| NaiveDate::from_ymd_opt(2024, 5, day).unwrap();
//! let grid = build_daily_grid(vec![(d(3), 1.0), (d(1), 2.0)]).unwrap();
//! assert_eq!(grid.values(), &[2.0, 0.0, 1.0]);
//! ```

pub mod grid;

pub use grid::{build_daily_grid, daily_sales_grid, group_by_series};
