//! Result and error types for the core library

use rust_decimal::Decimal;
use thiserror::Error;

/// Core library error type
///
/// `Validation` and `InsufficientFunds` are raised by the entity itself.
/// `Conflict` and `NotFound` come from a repository. Everything else is a
/// technical failure the core passes through without interpreting.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: Decimal, available: Decimal },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// True for caller-correctable input problems, including uniqueness conflicts
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Conflict(_))
    }

    /// Short machine-readable name, safe to log
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::Credential(_) => "credential",
            Self::Database(_) => "database",
        }
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;
