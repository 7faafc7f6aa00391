//! Common error types for Book Nook

use thiserror::Error;

/// Common result type for Book Nook operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the library and the web service
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Document (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required secret is absent from the process environment
    #[error("{0} is not defined. Check the service environment variables.")]
    MissingSecret(&'static str),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation requires an anonymous session
    #[error("Not signed in: {0}")]
    Unauthenticated(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
