use thiserror::Error;

use crate::domain::Grocer;
use crate::importer::ImportSummary;

/// A feed could not be decoded by the parser of its retailer.
#[derive(Error, Debug)]
#[error("failed to parse {grocer} feed: {source}")]
pub struct ParseError {
    pub grocer: Grocer,
    #[source]
    pub source: serde_json::Error,
}

/// Failures raised by a catalog store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Store {0} does not exist")]
    StoreNotFound(i64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("Database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Corrupt value in column {column}: {message}")]
    CorruptValue { column: String, message: String },
}

impl StoreError {
    /// Classify a rusqlite failure, pulling out unique violations so callers can
    /// fall back to reading the row that won the race.
    pub fn from_sqlite(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, msg)
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                StoreError::UniqueViolation(msg.clone().unwrap_or_else(|| err.to_string()))
            }
            rusqlite::Error::SqliteFailure(e, msg)
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_CHECK =>
            {
                StoreError::InvalidRecord(msg.clone().unwrap_or_else(|| err.to_string()))
            }
            _ => StoreError::Database(err),
        }
    }
}

/// Terminal errors of one import run. Per-item upsert failures are not in here;
/// they are counted in the run summary instead.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("unsupported feed format for '{signal}': {reason}")]
    UnsupportedFormat { signal: String, reason: String },

    #[error("failed to open feed {path}: {source}")]
    FeedOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("failed to resolve store '{location_id}': {source}")]
    StoreResolution {
        location_id: String,
        #[source]
        source: StoreError,
    },

    #[error(
        "import cancelled after {} of {} products",
        .summary.attempted(),
        .summary.total_products
    )]
    Cancelled { summary: Box<ImportSummary> },
}

/// Configuration loading failures
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

pub type Result<T> = std::result::Result<T, ImportError>;
