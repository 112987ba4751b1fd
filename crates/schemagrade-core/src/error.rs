use thiserror::Error;

/// Core error type shared across schemagrade crates.
#[derive(Debug, Error)]
pub enum Error {
    /// Database error while extracting a schema or probing row counts.
    #[error("database error: {0}")]
    Db(String),
    /// The schema violates internal invariants.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// Thresholds or weights rejected at startup.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Catch-all error for unexpected failures.
    #[error("other error: {0}")]
    Other(String),
}

/// Convenience alias for results returned by schemagrade crates.
pub type Result<T> = std::result::Result<T, Error>;
