//! Core error types for the EMA refresh engine.
//!
//! This module defines database-agnostic error types. Storage-specific errors
//! (from Diesel, SQLite, etc.) are converted to these types by the storage layer.

use chrono::{DateTime, ParseError as ChronoParseError, Utc};
use thiserror::Error;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the refresh engine.
///
/// Database-specific errors are wrapped in string form to keep this type
/// database-agnostic.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Data quality error: {0}")]
    DataQuality(#[from] DataQualityError),

    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Alert delivery failed: {0}")]
    Alert(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl Error {
    /// Returns true when the error must abort the whole run.
    ///
    /// Data-quality problems and persistence failures are scoped to a single
    /// asset; everything configuration-related is fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }

    /// Short classification used in run summaries and alerts.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Database(_) => "persistence",
            Error::Configuration(_) => "configuration",
            Error::DataQuality(_) => "data_quality",
            Error::Validation(_) => "validation",
            Error::Repository(_) => "repository",
            Error::Alert(_) => "alert",
            Error::Unexpected(_) => "unexpected",
        }
    }
}

/// Database-agnostic error type for storage operations.
///
/// This enum uses `String` for all error details, allowing the storage layer
/// to convert storage-specific errors (Diesel, SQLite, etc.) into this format.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to establish a database connection.
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to create or configure the connection pool.
    #[error("Failed to create database pool: {0}")]
    PoolCreationFailed(String),

    /// A database query failed to execute.
    #[error("Database query failed: {0}")]
    QueryFailed(String),

    /// The requested record was not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A unique constraint was violated (e.g., duplicate key).
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// A database transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Database migration failed.
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Internal/unexpected database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

/// Reference data or wiring problems. Always fatal for a run.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Unknown timeframe code '{0}'")]
    UnknownTimeframe(String),

    #[error("Unknown session key {0}")]
    UnknownSession(String),

    #[error("No asset profile registered for asset '{0}'")]
    UnknownAsset(String),

    #[error("Invalid timezone '{0}': {1}")]
    InvalidTimezone(String, String),

    #[error("Invalid timeframe definition '{code}': {reason}")]
    InvalidTimeframe { code: String, reason: String },

    #[error("Duplicate timeframe code '{0}'")]
    DuplicateTimeframe(String),

    #[error("Invalid session definition {key}: {reason}")]
    InvalidSession { key: String, reason: String },
}

/// Problems with one asset's source series. Scoped to that asset.
#[derive(Error, Debug)]
pub enum DataQualityError {
    #[error("Non-monotonic series for {asset_id}: {timestamp} does not follow {previous}")]
    NonMonotonic {
        asset_id: String,
        previous: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    #[error("Malformed bar for {asset_id} at {timestamp}: {reason}")]
    MalformedBar {
        asset_id: String,
        timestamp: DateTime<Utc>,
        reason: String,
    },
}

/// Validation errors for caller input and data parsing.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to parse date/time: {0}")]
    DateTimeParse(#[from] ChronoParseError),
}

// === From implementations for common error types ===

impl From<ChronoParseError> for Error {
    fn from(err: ChronoParseError) -> Self {
        Error::Validation(ValidationError::DateTimeParse(err))
    }
}
