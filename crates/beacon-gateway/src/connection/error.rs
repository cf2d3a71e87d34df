//! Gateway error types

use crate::rest::RestError;
use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors that end a connection or the whole session
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Could not resolve the gateway URL
    #[error("Gateway bootstrap failed: {0}")]
    Bootstrap(#[source] RestError),

    /// The gateway URL could not be parsed
    #[error("Invalid gateway URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The WebSocket handshake did not finish in time
    #[error("Connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// WebSocket transport failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// The connection ended without a close frame
    #[error("Connection lost")]
    ConnectionLost,

    /// A frame could not be decoded
    #[error("Protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    /// The writer task is gone
    #[error("Writer closed")]
    WriterClosed,

    /// The outbound queue stayed full
    #[error("Outbound queue full for {0:?}")]
    EnqueueTimeout(Duration),

    /// The server closed the connection with a code that forbids reconnecting
    #[error("Closed by server (code {code:?}): {reason}")]
    Closed { code: Option<u16>, reason: String },

    /// Gave up reconnecting
    #[error("Gave up after {0} reconnect attempts")]
    ReconnectExhausted(u32),
}

impl GatewayError {
    /// Check if a new connection may fix this
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConnectTimeout(_)
                | Self::WebSocket(_)
                | Self::ConnectionLost
                | Self::Protocol(_)
                | Self::WriterClosed
                | Self::EnqueueTimeout(_)
        )
    }
}

/// Gateway result type
pub type GatewayResult<T> = Result<T, GatewayError>;
