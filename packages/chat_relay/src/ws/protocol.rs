//! Wire payload shapes shared by both protocols.
//!
//! Outbound payloads borrow from the shared `Arc`'d messages so a fan-out
//! never clones message bodies just to serialize them.

use relay_core::{ChatMessage, Inbound, SignalMessage, VoiceMessage};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::codec::DecodeError;

// === Client → server ===

#[derive(Debug, Deserialize)]
pub(crate) struct ChatIn {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VoiceIn {
    /// base64 string or byte array, relayed as-is
    pub audio: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SignalIn {
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub signal: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IdentifyIn {
    pub id: String,
}

impl From<ChatIn> for Inbound {
    fn from(m: ChatIn) -> Self {
        Inbound::Chat { message: m.message }
    }
}

impl From<VoiceIn> for Inbound {
    fn from(m: VoiceIn) -> Self {
        Inbound::Voice { audio: m.audio }
    }
}

impl From<SignalIn> for Inbound {
    fn from(m: SignalIn) -> Self {
        Inbound::Signal {
            to: m.to,
            signal: m.signal,
        }
    }
}

impl From<IdentifyIn> for Inbound {
    fn from(m: IdentifyIn) -> Self {
        Inbound::Identify { id: m.id }
    }
}

/// Decode the payload of a named client event. Both wire formats name their
/// events the same way; `presence` is accepted as an alias of `identify`.
pub(crate) fn decode_event(event: &str, payload: Value) -> Result<Inbound, DecodeError> {
    let inbound = match event {
        "chat" => serde_json::from_value::<ChatIn>(payload)?.into(),
        "voice" => serde_json::from_value::<VoiceIn>(payload)?.into(),
        "signal" => serde_json::from_value::<SignalIn>(payload)?.into(),
        "identify" | "presence" => serde_json::from_value::<IdentifyIn>(payload)?.into(),
        _ => return Err(DecodeError::UnknownEvent(event.to_string())),
    };
    Ok(inbound)
}

// === Server → client ===

/// A chat line as it appears in `history` and in framed `chat` events.
#[derive(Debug, Serialize)]
pub(crate) struct ChatPayload<'a> {
    pub from: &'a str,
    pub message: &'a str,
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl<'a> From<&'a ChatMessage> for ChatPayload<'a> {
    fn from(m: &'a ChatMessage) -> Self {
        Self {
            from: &m.from,
            message: &m.message,
            timestamp: m.timestamp,
            kind: "chat",
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct VoicePayload<'a> {
    pub from: &'a str,
    pub audio: &'a Value,
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl<'a> From<&'a VoiceMessage> for VoicePayload<'a> {
    fn from(m: &'a VoiceMessage) -> Self {
        Self {
            from: &m.from,
            audio: &m.audio,
            timestamp: m.timestamp,
            kind: "voice",
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SignalPayload<'a> {
    pub from: &'a str,
    pub signal: &'a Value,
}

impl<'a> From<&'a SignalMessage> for SignalPayload<'a> {
    fn from(m: &'a SignalMessage) -> Self {
        Self {
            from: &m.from,
            signal: &m.signal,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct HistoryPayload<'a> {
    pub messages: Vec<ChatPayload<'a>>,
}

impl<'a> HistoryPayload<'a> {
    pub fn new(messages: &'a [ChatMessage]) -> Self {
        Self {
            messages: messages.iter().map(ChatPayload::from).collect(),
        }
    }
}
