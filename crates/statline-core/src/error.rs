//! Error types for Statline

use thiserror::Error;

use crate::search::request::ValidationError;

/// Result type alias using Statline's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Statline error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Request errors (E100-E199)
    #[error("Invalid search request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Search errors (E200-E299)
    #[error("Search timed out after {0} ms")]
    SearchTimeout(u64),

    // Database errors (E400-E499)
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Malformed document: {0}")]
    Document(String),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "E100",
            Self::InvalidInput(_) => "E101",
            Self::SearchTimeout(_) => "E200",
            Self::DatabaseError(_) => "E400",
            Self::Document(_) => "E401",
            Self::ConfigError(_) => "E600",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::Validation(ValidationError::InvalidEntityType(_)) => {
                Some("statline catalog".to_string())
            }
            Self::Validation(ValidationError::InvalidFilterField { entity_type, .. }) => {
                Some(format!("statline catalog --type {}", entity_type))
            }
            Self::SearchTimeout(_) => Some("statline config set search.timeout_ms 30000".to_string()),
            Self::DatabaseError(_) => Some("statline db status".to_string()),
            Self::ConfigError(_) => Some("statline config list".to_string()),
            _ => None,
        }
    }

    /// Whether this error is a caller mistake (4xx-equivalent) rather than a fault
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InvalidInput(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Document(err.to_string())
    }
}
