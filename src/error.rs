//! Error types for sonde-peek.
//!
//! Defines the main error enum used throughout the application.

use thiserror::Error;

/// Main error type for sonde-peek operations.
#[derive(Error, Debug)]
pub enum PeekError {
    /// Missing or malformed configuration (unset variable, non-numeric port, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query building or execution errors (unknown table, unknown column, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// Internal application errors (output failures, unexpected states)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PeekError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "Configuration Error",
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Internal(_) => 1,
            Self::Config(_) => 2,
            Self::Connection(_) => 3,
            Self::Query(_) => 4,
        }
    }
}

impl From<std::io::Error> for PeekError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(format!("Failed to write output: {err}"))
    }
}

/// Result type alias using PeekError.
pub type Result<T> = std::result::Result<T, PeekError>;
