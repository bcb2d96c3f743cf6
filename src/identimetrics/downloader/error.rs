use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, DownloaderError>;

/// Error type covering the failures that can occur while loading settings,
/// talking to PowerSchool, or writing the export files.
#[derive(Debug, Error)]
pub enum DownloaderError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level failures from the HTTP client (connect, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Errors bubbled up from the CSV writer.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Raised when the server answers with a non-success status code.
    #[error("server returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    /// Raised when no configuration document can be found.
    #[error("configuration file not found: {0}")]
    MissingConfig(PathBuf),

    /// Raised when a configuration document is not valid YAML or misses keys.
    #[error("failed to parse {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// Raised when a configuration value parses but cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Raised when the token endpoint answers without an `access_token`.
    #[error("no 'access_token' in authentication response")]
    MissingToken,

    /// Raised when a query is attempted before authentication succeeded.
    #[error("not authenticated: no access token available")]
    NotAuthenticated,

    /// Raised when a query response has no top-level `record` key.
    #[error("no 'record' key in JSON")]
    MissingRecords,

    /// Raised when the `record` collection has an unexpected shape.
    #[error("malformed record collection: {0}")]
    InvalidRecords(String),

    /// Raised when a record lacks a field its export layout requires.
    #[error("record {index} is missing required field '{field}'")]
    MissingField { index: usize, field: String },

    /// Raised when a name or identifying number is present but empty.
    #[error("record {index} has an empty '{field}'")]
    EmptyField { index: usize, field: String },

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
