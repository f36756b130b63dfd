//! Error types for the streaming core and the backend API clients.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Failures of a single streaming chat operation.
///
/// Malformed individual records are not represented here: the decoder drops
/// them and keeps the stream alive. [`StreamError::Decode`] is reserved for
/// framing corruption that makes the rest of the body unusable.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("chat endpoint returned {status}: {body}")]
    Transport { status: StatusCode, body: String },

    #[error("connection failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("no response within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("corrupt stream framing: {0}")]
    Decode(String),

    #[error("stream cancelled")]
    Cancelled,

    #[error("query must not be empty")]
    EmptyQuery,
}

/// Failures of the non-streaming backend endpoints.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
