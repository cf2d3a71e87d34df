//! Interaction response types
//!
//! Body of `POST /interactions/{id}/{token}/callback`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Interaction callback type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InteractionCallbackType {
    /// ACK a ping
    Pong = 1,
    /// Respond with a message
    ChannelMessageWithSource = 4,
    /// ACK now, edit the response later
    DeferredChannelMessageWithSource = 5,
}

impl InteractionCallbackType {
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Pong),
            4 => Some(Self::ChannelMessageWithSource),
            5 => Some(Self::DeferredChannelMessageWithSource),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl Serialize for InteractionCallbackType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for InteractionCallbackType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = u8::deserialize(deserializer)?;
        Self::from_u8(value).ok_or_else(|| {
            serde::de::Error::custom(format!("unknown interaction callback type: {value}"))
        })
    }
}

/// Interaction response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: InteractionCallbackType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<InteractionResponseData>,
}

impl InteractionResponse {
    /// Reply with a message
    #[must_use]
    pub fn message(data: InteractionResponseData) -> Self {
        Self {
            kind: InteractionCallbackType::ChannelMessageWithSource,
            data: Some(data),
        }
    }

    /// Reply with plain text
    #[must_use]
    pub fn content(content: impl Into<String>) -> Self {
        Self::message(InteractionResponseData::content(content))
    }

    /// Acknowledge now, answer later
    #[must_use]
    pub fn deferred() -> Self {
        Self {
            kind: InteractionCallbackType::DeferredChannelMessageWithSource,
            data: None,
        }
    }
}

/// Message sent in response to an interaction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionResponseData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,

    /// Message flags (64 = ephemeral)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
}

impl InteractionResponseData {
    /// Message flag: only the invoking user sees the reply
    pub const EPHEMERAL: u64 = 1 << 6;

    #[must_use]
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// Add an embed
    #[must_use]
    pub fn with_embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    /// Make the reply visible only to the invoking user
    #[must_use]
    pub fn ephemeral(mut self) -> Self {
        self.flags = Some(self.flags.unwrap_or(0) | Self::EPHEMERAL);
        self
    }
}

/// Rich embed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// RGB color as an integer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
}
