//! Client Errors
//!
//! Every terminal condition of a chat turn and every failed REST call is one
//! of these. The producer reports at most one per session.

use thiserror::Error;

/// Errors surfaced by the daemon client
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection refused, reset, DNS failure, or a read that died mid-body
    #[error("connection failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The daemon answered with a non-success status
    #[error("daemon returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Bounded prefix of the response body
        body: String,
    },

    /// A wire record could not be decoded, or the body had the wrong type
    #[error("malformed stream: {0}")]
    Decode(String),

    /// The turn was cancelled before the daemon finished
    #[error("cancelled")]
    Cancelled,

    /// No model is configured or advertised by the daemon
    #[error("no model available")]
    NoModelAvailable,

    /// The daemon envelope reported `ok: false`
    #[error("daemon error: {0}")]
    Api(String),

    /// A JSON payload did not match the expected shape
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Whether this error is the producer acknowledging a cancel request
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
