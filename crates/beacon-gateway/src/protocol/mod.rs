//! Gateway protocol definitions
//!
//! Defines the WebSocket protocol including op codes, frame formats, and close codes.

mod close_codes;
mod frames;
mod intents;
mod opcodes;
mod payloads;

pub use close_codes::{CloseAction, CloseCode};
pub use frames::{InboundFrame, OutboundFrame};
pub use intents::Intents;
pub use opcodes::OpCode;
pub use payloads::{
    Activity, HelloPayload, IdentifyPayload, IdentifyProperties, PresenceUpdatePayload,
    ResumePayload,
};
