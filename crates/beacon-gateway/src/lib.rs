//! # beacon-gateway
//!
//! Client for a real-time WebSocket gateway: keeps a session alive with
//! heartbeats, resumes it after disconnects, and routes application commands
//! to registered handlers.

// Handler panics are caught at the dispatch boundary, which needs unwinding
#[cfg(panic = "abort")]
compile_error!("beacon-gateway must be built with panic = \"unwind\"");

pub mod bot;
pub mod connection;
pub mod events;
pub mod handlers;
pub mod protocol;
pub mod rest;

pub use bot::Bot;
pub use connection::{ConnectionManager, ConnectionState, GatewayError, GatewayResult};
pub use handlers::{CommandContext, CommandHandler, CommandRegistry, HandlerError, HandlerResult};
pub use rest::{Embed, InteractionResponse, InteractionResponseData, RestClient, RestError};
