//! REST collaborators
//!
//! Gateway URL resolution and interaction callbacks.

mod client;
mod error;
mod interaction;

pub use client::{GatewayBotResponse, InteractionResponder, RestClient, SessionStartLimit};
pub use error::{RestError, RestResult};
pub use interaction::{
    Embed, InteractionCallbackType, InteractionResponse, InteractionResponseData,
};
