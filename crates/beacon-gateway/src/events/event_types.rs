//! Gateway event types
//!
//! Event names carried in the `t` field of dispatch frames.

use std::fmt;

/// Dispatch event names the client understands
///
/// Anything not listed here is still tracked for its sequence number but
/// otherwise only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayEventType {
    // Connection events
    /// Sent after successful Identify
    Ready,
    /// Sent after successful Resume
    Resumed,

    // Interaction events
    /// A user invoked an application command
    InteractionCreate,

    // Guild events
    /// Guild available, joined, or created
    GuildCreate,
    /// Left guild, kicked, or guild deleted
    GuildDelete,

    // Message events
    /// New message
    MessageCreate,
}

impl GatewayEventType {
    /// Get the string representation of the event type
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Resumed => "RESUMED",
            Self::InteractionCreate => "INTERACTION_CREATE",
            Self::GuildCreate => "GUILD_CREATE",
            Self::GuildDelete => "GUILD_DELETE",
            Self::MessageCreate => "MESSAGE_CREATE",
        }
    }

    /// Parse an event type from a string
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "READY" => Some(Self::Ready),
            "RESUMED" => Some(Self::Resumed),
            "INTERACTION_CREATE" => Some(Self::InteractionCreate),
            "GUILD_CREATE" => Some(Self::GuildCreate),
            "GUILD_DELETE" => Some(Self::GuildDelete),
            "MESSAGE_CREATE" => Some(Self::MessageCreate),
            _ => None,
        }
    }

    /// Check if this event completes a handshake
    #[must_use]
    pub const fn is_session_start(self) -> bool {
        matches!(self, Self::Ready | Self::Resumed)
    }
}

impl fmt::Display for GatewayEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
