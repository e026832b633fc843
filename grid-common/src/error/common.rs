//! Error types shared between the ingestion crates.
//!
//! Crate-specific errors wrap these with `#[from]`.

use thiserror::Error;

/// Database errors surfaced by the store implementations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DatabaseError {
    /// Statement failed for a reason other than a constraint
    #[error("Query failed: {0}")]
    Query(String),

    /// Statement violated a constraint. `code` is the SQLSTATE.
    #[error("Constraint violation ({code}): {message}")]
    Constraint { code: String, message: String },

    /// Connection to the database failed
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Begin, commit or rollback failed
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// Connection pool exhausted
    #[error("Connection pool exhausted")]
    PoolExhausted,
}

impl DatabaseError {
    /// SQLSTATE raised by PostgreSQL when no partition accepts a row.
    pub const CHECK_VIOLATION: &'static str = "23514";

    /// Returns true when the error reports a row with no matching partition.
    pub fn is_missing_partition(&self) -> bool {
        match self {
            DatabaseError::Constraint { code, message } => {
                code == Self::CHECK_VIOLATION && message.contains("no partition")
            }
            _ => false,
        }
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted,
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) => DatabaseError::Connection(err.to_string()),
            sqlx::Error::Database(db) => match db.code() {
                Some(code) if code.starts_with("23") => DatabaseError::Constraint {
                    code: code.to_string(),
                    message: db.message().to_string(),
                },
                _ => DatabaseError::Query(err.to_string()),
            },
            _ => DatabaseError::Query(err.to_string()),
        }
    }
}

/// Network errors raised while talking to upstream data providers.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum NetworkError {
    /// Connection could not be established
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Request exceeded its deadline
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Request could not be built or sent
    #[error("Request failed: {0}")]
    Request(String),

    /// Upstream answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body could not be read
    #[error("Receive failed: {0}")]
    Receive(String),
}

impl NetworkError {
    /// Build a status error, keeping only the head of the body for logs.
    pub fn status(status: u16, body: &str) -> Self {
        let body: String = body.chars().take(200).collect();
        NetworkError::Status { status, body }
    }
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NetworkError::Timeout(err.to_string())
        } else if err.is_connect() {
            NetworkError::Connection(err.to_string())
        } else if let Some(status) = err.status() {
            NetworkError::status(status.as_u16(), &err.to_string())
        } else if err.is_body() || err.is_decode() {
            NetworkError::Receive(err.to_string())
        } else {
            NetworkError::Request(err.to_string())
        }
    }
}

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// Required field is missing
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Field has invalid value
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// Configuration source could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ConfigurationError {
    /// Create an InvalidValue error
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigurationError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
