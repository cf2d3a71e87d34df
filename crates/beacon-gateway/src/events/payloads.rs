//! Event payload definitions
//!
//! Only the subset of fields needed to drive the session and the command
//! dispatcher is decoded. Unknown fields are ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// === Connection Events ===

/// READY event payload
///
/// Sent after successful Identify.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyEvent {
    /// Gateway protocol version
    #[serde(default)]
    pub v: u8,

    /// Current user
    #[serde(default)]
    pub user: Option<UserPayload>,

    /// Session ID for resuming
    pub session_id: String,

    /// Gateway URL for resuming
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_gateway_url: Option<String>,
}

/// RESUMED event payload
///
/// Sent after successful Resume. Carries nothing the client needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResumedEvent {}

// === User Payload ===

/// User data included in events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPayload {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

// === Interaction Events ===

/// Interaction type (`type` field of INTERACTION_CREATE)
pub mod interaction_type {
    pub const PING: u8 = 1;
    pub const APPLICATION_COMMAND: u8 = 2;
    pub const MESSAGE_COMPONENT: u8 = 3;
    pub const AUTOCOMPLETE: u8 = 4;
    pub const MODAL_SUBMIT: u8 = 5;
}

/// INTERACTION_CREATE event payload
#[derive(Clone, Serialize, Deserialize)]
pub struct InteractionCreateEvent {
    /// Interaction ID
    pub id: String,

    #[serde(default)]
    pub application_id: Option<String>,

    /// Interaction type
    #[serde(rename = "type")]
    pub kind: u8,

    /// Continuation token for the callback
    pub token: String,

    /// Command data, present for application commands
    #[serde(default)]
    pub data: Option<CommandData>,

    #[serde(default)]
    pub guild_id: Option<String>,

    #[serde(default)]
    pub channel_id: Option<String>,
}

impl InteractionCreateEvent {
    /// Name of the invoked command, if this is an application command
    #[must_use]
    pub fn command_name(&self) -> Option<&str> {
        if self.kind != interaction_type::APPLICATION_COMMAND {
            return None;
        }
        self.data.as_ref().map(|data| data.name.as_str())
    }
}

impl std::fmt::Debug for InteractionCreateEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionCreateEvent")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("token", &"<redacted>")
            .field("data", &self.data)
            .field("guild_id", &self.guild_id)
            .field("channel_id", &self.channel_id)
            .finish_non_exhaustive()
    }
}

/// Invoked command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandData {
    #[serde(default)]
    pub id: Option<String>,

    pub name: String,

    /// Command type (1 = chat input)
    #[serde(rename = "type", default)]
    pub kind: u8,

    #[serde(default)]
    pub options: Vec<CommandOption>,
}

/// Option value supplied with a command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOption {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: u8,

    #[serde(default)]
    pub value: Value,
}
