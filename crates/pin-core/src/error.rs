//! Error types

use thiserror::Error;

/// Errors raised while validating a chart configuration or its data rows
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Category key is empty")]
    EmptyCategoryKey,

    #[error("Row {row} has no value for category field '{key}'")]
    MissingCategory { row: usize, key: String },

    #[error("Series '{0}' is configured more than once")]
    DuplicateSeries(String),

    #[error("Series key is empty")]
    EmptySeriesKey,

    #[error("Invalid color '{0}'")]
    InvalidColor(String),

    #[error("max_annotations must be at least 1")]
    ZeroCapacity,

    #[error("Invalid snap thresholds: {0}")]
    InvalidThresholds(String),

    #[error("JSON error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Json(err.to_string())
    }
}

/// Errors surfaced by the discovery bus
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// A request was issued from inside another dispatch
    #[error("Discovery request issued while the bus is already dispatching")]
    Reentrant,
}
