//! Anomaly detection on decomposed daily sales.
//!
//! This module provides:
//! - A seeded isolation forest
//! - Outlier scoring with a contamination-calibrated threshold
//! - Spike/drop classification and top-N ranking

mod anomaly;
mod isolation_forest;
mod outlier;

pub use anomaly::{classify_anomalies, top_anomalies, ClassifiedAnomaly, Direction};
pub use isolation_forest::{average_path_length, IsolationForest};
pub use outlier::{score_outliers, FeatureSet, OutlierConfig, OutlierScores, ScoredPoint};
