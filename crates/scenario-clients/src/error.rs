//! Client error types

use thiserror::Error;

/// Errors from calls to external systems
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
