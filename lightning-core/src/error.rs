//! Error types for the calendar engine.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Reasons a raw event cannot become an `EventRecord`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Event title must not be empty")]
    EmptyTitle,

    #[error("Event start is required")]
    MissingStart,

    #[error("Event end ({end}) is before its start ({start})")]
    EndBeforeStart {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Invalid date/time value: {0}")]
    InvalidDate(String),
}

/// Errors that can occur in engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Event with id '{0}' already exists")]
    DuplicateId(String),

    #[error("Event not found: {0}")]
    NotFound(String),

    #[error("ICS parse error: {0}")]
    IcsParse(String),

    #[error("ICS generation error: {0}")]
    IcsGenerate(String),

    #[error("Recurrence error: {0}")]
    Recurrence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Config(err.to_string())
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
