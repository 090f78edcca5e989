//! Common error types for WasteWise

use thiserror::Error;

/// Common result type for WasteWise operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the API service and the admin CLI
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Row would violate a uniqueness constraint
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map a sqlx error, turning unique-constraint violations into `Conflict`
    ///
    /// Other database errors pass through unchanged.
    pub fn from_db(err: sqlx::Error, conflict_message: &str) -> Self {
        if is_unique_violation(&err) {
            Error::Conflict(conflict_message.to_string())
        } else {
            Error::Database(err)
        }
    }
}

/// True when the database rejected a write because of a UNIQUE constraint
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
