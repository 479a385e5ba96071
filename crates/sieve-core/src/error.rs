//! Error types shared by the rule engine, sync, and export paths.

use thiserror::Error;

/// Errors that can occur in Sieve core operations.
#[derive(Debug, Error)]
pub enum SieveError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("HTTP error: {0}")]
    HttpStatus(u16),

    /// IO error while writing a downloaded config.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A `mode=` line carried something other than `proxy` or `bypass`.
    #[error("Unknown mode: {0}")]
    InvalidMode(String),

    /// The config never declared a `mode=` line.
    #[error("Subscription config has no mode= line")]
    MissingMode,

    /// The subscription URL is not an absolute http(s) URL.
    #[error("Invalid subscription URL: {0}")]
    InvalidUrl(String),

    /// The persistent store could not be reached.
    #[error("Store unavailable")]
    StoreUnavailable,

    /// The persistent store rejected an operation.
    #[error("Store error: {0}")]
    Store(String),

    /// Rendering an export failed.
    #[error("Export failed: {0}")]
    Export(#[from] serde_json::Error),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, SieveError>;
