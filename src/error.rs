//! Error types for collection-fetch
//!
//! Errors fall into three families that mirror the stages of one fetch:
//! - [`PlanningError`] - invalid page size or concurrency, raised before any request
//! - [`TransportError`] - a page query failed; terminal for the current fetch
//! - [`SinkError`] - the output destination could not be opened, written or committed
//!
//! Nothing is retried or translated between families: the first error observed
//! is the one returned to the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for collection-fetch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for collection-fetch
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "service.base_url")
        key: Option<String>,
    },

    /// Page boundaries could not be computed
    #[error("planning error: {0}")]
    Planning(#[from] PlanningError),

    /// A page query failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The output sink failed
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// The fetch was cancelled before it completed
    #[error("fetch cancelled")]
    Cancelled,
}

/// Errors detected while computing page boundaries
#[derive(Debug, Error)]
pub enum PlanningError {
    /// Page size must be at least one record
    #[error("page size must be positive, got {page_size}")]
    InvalidPageSize {
        /// The rejected page size
        page_size: u64,
    },

    /// Concurrency cap must allow at least one request in flight
    #[error("max concurrent pages must be positive, got {limit}")]
    InvalidConcurrency {
        /// The rejected concurrency cap
        limit: usize,
    },
}

/// Errors raised by a page query
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP request could not be sent or its body could not be read
    #[error("request for page at offset {offset} failed: {source}")]
    Request {
        /// Offset of the page being fetched
        offset: u64,
        /// Underlying HTTP client error
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status
    #[error("service returned status {status} for page at offset {offset}: {body}")]
    Status {
        /// Offset of the page being fetched
        offset: u64,
        /// HTTP status code
        status: u16,
        /// Response body, as far as it could be read
        body: String,
    },

    /// The service answered, but the body is not a page
    #[error("malformed page at offset {offset}: {reason}")]
    MalformedPage {
        /// Offset of the page being fetched
        offset: u64,
        /// Why the body was rejected
        reason: String,
    },

    /// Generic failure reported by a custom page query
    #[error("page query at offset {offset} failed: {message}")]
    Query {
        /// Offset of the page being fetched
        offset: u64,
        /// Failure description
        message: String,
    },
}

/// Errors raised by an output sink
#[derive(Debug, Error)]
pub enum SinkError {
    /// The output file could not be created
    #[error("failed to open {path}: {source}")]
    Open {
        /// Path that could not be opened
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Writing or flushing the output failed
    #[error("write failed: {0}")]
    Write(#[from] std::io::Error),

    /// A document could not be serialized
    #[error("failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),

    /// The temporary file could not be moved over the target
    #[error("failed to move {from} to {to}: {source}")]
    Commit {
        /// Temporary file holding the complete output
        from: PathBuf,
        /// Final destination
        to: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The sink was already finished or aborted
    #[error("sink is already closed")]
    Finished,
}

impl Error {
    /// Create a configuration error for the given key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Machine-readable error code, used as the label in CLI output
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Planning(e) => match e {
                PlanningError::InvalidPageSize { .. } => "invalid_page_size",
                PlanningError::InvalidConcurrency { .. } => "invalid_concurrency",
            },
            Error::Transport(e) => match e {
                TransportError::Request { .. } => "request_failed",
                TransportError::Status { .. } => "bad_status",
                TransportError::MalformedPage { .. } => "malformed_page",
                TransportError::Query { .. } => "query_failed",
            },
            Error::Sink(e) => match e {
                SinkError::Open { .. } => "sink_open_failed",
                SinkError::Write(_) => "sink_write_failed",
                SinkError::Encode(_) => "encode_failed",
                SinkError::Commit { .. } => "sink_commit_failed",
                SinkError::Finished => "sink_closed",
            },
            Error::Cancelled => "cancelled",
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            // Usage-level problems, nothing was requested
            Error::Config { .. } | Error::Planning(_) => 2,
            Error::Transport(_) => 3,
            Error::Sink(_) => 4,
            // 128 + SIGINT
            Error::Cancelled => 130,
        }
    }
}
