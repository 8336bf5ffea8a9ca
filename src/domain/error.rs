// Error taxonomy for scanning and repairing series
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CleanerError {
    #[error("Series store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Write rejected for {time}: {reason}")]
    WriteRejected { time: String, reason: String },

    #[error("No {what} available for {time}")]
    MissingNeighborValue { what: &'static str, time: String },

    #[error("Invalid relative time: {0:?}")]
    InvalidTimeRange(String),

    #[error("Min value {min} cannot be greater than max value {max}")]
    InvalidBounds { min: f64, max: f64 },

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),
}
