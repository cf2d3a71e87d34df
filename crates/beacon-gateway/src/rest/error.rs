//! REST error types

use reqwest::StatusCode;
use thiserror::Error;

/// Errors from the HTTP side of the bot
#[derive(Debug, Error)]
pub enum RestError {
    /// The token was rejected
    #[error("Unauthorized ({0}): check the bot token")]
    Unauthorized(StatusCode),

    /// Any other non-success status
    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },

    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not match the expected shape
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RestError {
    /// Status code returned by the server, if a response was received
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Unauthorized(status) | Self::UnexpectedStatus { status, .. } => Some(*status),
            Self::Http(err) => err.status(),
            Self::Decode(_) => None,
        }
    }
}

/// REST result type
pub type RestResult<T> = Result<T, RestError>;
