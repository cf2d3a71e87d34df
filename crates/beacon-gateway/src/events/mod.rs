//! Gateway events
//!
//! Dispatch events the client decodes.

mod event_types;
mod payloads;

pub use event_types::GatewayEventType;
pub use payloads::{
    interaction_type, CommandData, CommandOption, InteractionCreateEvent, ReadyEvent,
    ResumedEvent, UserPayload,
};
