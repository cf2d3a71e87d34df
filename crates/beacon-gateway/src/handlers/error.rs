//! Handler error types

use crate::rest::RestError;
use thiserror::Error;

/// Error returned by a command handler
///
/// Errors stay inside the dispatch that produced them.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The interaction callback failed
    #[error("Failed to respond: {0}")]
    Respond(#[from] RestError),

    /// A command option was missing or had the wrong type
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// Anything else the handler wants to report
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Handler result type
pub type HandlerResult<T> = Result<T, HandlerError>;
