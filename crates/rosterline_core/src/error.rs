//! Core error types for rosterline.

use std::fmt;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Invalid canonical encoding
    InvalidEncoding,

    /// Invalid ID format
    InvalidId {
        /// Why the id was refused
        reason: String,
    },

    /// Invalid calendar date or instant
    InvalidDate {
        /// Input as given
        value: String,
    },

    /// Parse error
    ParseError {
        /// Parser message
        message: String,
    },

    /// Validation error
    Validation {
        /// Field that failed
        field: String,
        /// Why it failed
        reason: String,
    },

    /// Not found
    NotFound {
        /// Kind of thing looked up
        kind: String,
        /// Its identifier
        id: String,
    },

    /// Ordering discipline was bypassed
    OrderViolation {
        /// What was out of order
        reason: String,
    },

    /// Cancelled
    Cancelled,

    /// Internal error (for unexpected errors)
    Internal {
        /// Error message
        message: String,
    },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEncoding => write!(f, "Invalid encoding"),
            Self::InvalidId { reason } => write!(f, "Invalid ID: {}", reason),
            Self::InvalidDate { value } => write!(f, "Invalid date: {}", value),
            Self::ParseError { message } => write!(f, "Parse error: {}", message),
            Self::Validation { field, reason } => {
                write!(f, "Validation failed for {}: {}", field, reason)
            }
            Self::NotFound { kind, id } => write!(f, "{} not found: {}", kind, id),
            Self::OrderViolation { reason } => write!(f, "Order violation: {}", reason),
            Self::Cancelled => write!(f, "Operation cancelled"),
            Self::Internal { message } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError {
            message: err.to_string(),
        }
    }
}

impl From<postcard::Error> for CoreError {
    fn from(_: postcard::Error) -> Self {
        Self::InvalidEncoding
    }
}

impl From<chrono::ParseError> for CoreError {
    fn from(err: chrono::ParseError) -> Self {
        Self::ParseError {
            message: err.to_string(),
        }
    }
}
