//! Gateway frame format
//!
//! Inbound frames keep their `d` payload as raw JSON until a consumer asks for
//! a concrete type. Outbound frames are a closed set of variants.

use super::{IdentifyPayload, OpCode, ResumePayload};
use serde::de::DeserializeOwned;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::value::RawValue;

/// Frame received from the gateway
///
/// `op` stays a raw integer so that unknown op codes, including ones outside
/// the `u8` range, survive decoding.
#[derive(Debug, Deserialize)]
pub struct InboundFrame {
    /// Operation code
    pub op: i64,

    /// Sequence number (only for op=0 Dispatch)
    #[serde(default)]
    pub s: Option<u64>,

    /// Event name (only for op=0 Dispatch)
    #[serde(default)]
    pub t: Option<String>,

    /// Undecoded event data
    #[serde(default)]
    pub d: Option<Box<RawValue>>,
}

impl InboundFrame {
    /// Decode the outer envelope from a text frame
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Decode the outer envelope from a binary frame
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// The known op code, if any
    #[must_use]
    pub fn opcode(&self) -> Option<OpCode> {
        u8::try_from(self.op).ok().and_then(OpCode::from_u8)
    }

    /// Event name of a dispatch frame
    #[must_use]
    pub fn event_name(&self) -> Option<&str> {
        self.t.as_deref()
    }

    /// Decode the payload into a concrete type
    ///
    /// A missing payload decodes like JSON `null`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match &self.d {
            Some(raw) => serde_json::from_str(raw.get()),
            None => serde_json::from_str("null"),
        }
    }

    /// Raw payload text, for logging
    #[must_use]
    pub fn raw_payload(&self) -> &str {
        self.d.as_deref().map_or("null", RawValue::get)
    }
}

impl std::fmt::Display for InboundFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.opcode() {
            Some(op) => write!(f, "InboundFrame(op={op}")?,
            None => write!(f, "InboundFrame(op={}", self.op)?,
        }
        if let Some(t) = &self.t {
            write!(f, ", t={t}")?;
        }
        if let Some(s) = self.s {
            write!(f, ", s={s}")?;
        }
        write!(f, ")")
    }
}

/// Frame sent to the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// op 1, carrying the last sequence number
    Heartbeat(Option<u64>),
    /// op 2
    Identify(IdentifyPayload),
    /// op 6
    Resume(ResumePayload),
}

impl OutboundFrame {
    /// Op code written in the `op` field
    #[must_use]
    pub const fn opcode(&self) -> OpCode {
        match self {
            Self::Heartbeat(_) => OpCode::Heartbeat,
            Self::Identify(_) => OpCode::Identify,
            Self::Resume(_) => OpCode::Resume,
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Serialize for OutboundFrame {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut frame = serializer.serialize_struct("OutboundFrame", 2)?;
        frame.serialize_field("op", &self.opcode())?;
        match self {
            Self::Heartbeat(seq) => frame.serialize_field("d", seq)?,
            Self::Identify(payload) => frame.serialize_field("d", payload)?,
            Self::Resume(payload) => frame.serialize_field("d", payload)?,
        }
        frame.end()
    }
}

impl std::fmt::Display for OutboundFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OutboundFrame(op={})", self.opcode())
    }
}
