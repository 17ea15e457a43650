//! Shared utilities: errors, logging, metrics, and chart rendering.

pub mod charts;
pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{Error, Result};
pub use metrics::{ClassMetrics, ConfusionMatrix, RocAuc};
