//! Transport-independent message model.
//!
//! `Inbound` is what a front end decodes from a client frame; `Message` is what
//! the relay accepted and stamped; `Outbound` is what gets queued for a
//! recipient and encoded by that recipient's own transport.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Which front end a connection arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Named-event frames (`["chat", {...}]`).
    Framed,
    /// Single JSON envelope with a `type` discriminator.
    Raw,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Framed => "framed",
            Self::Raw => "raw",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Chat,
    Voice,
    Signal,
    Presence,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Chat => "chat",
            Self::Voice => "voice",
            Self::Signal => "signal",
            Self::Presence => "presence",
        };
        f.write_str(s)
    }
}

/// A chat line as stored in history and delivered to recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub from: String,
    pub message: String,
    /// Milliseconds since the Unix epoch, assigned by the relay on receipt.
    pub timestamp: i64,
}

/// A voice note. `audio` is relayed untouched (base64 string or byte array).
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceMessage {
    pub from: String,
    pub audio: Value,
    pub timestamp: i64,
}

/// Peer-to-peer call setup metadata, relayed but never interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalMessage {
    pub from: String,
    pub signal: Value,
    pub timestamp: i64,
}

/// A message the relay has accepted from a sender.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Chat(ChatMessage),
    Voice(VoiceMessage),
    Signal(SignalMessage),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Chat(_) => MessageKind::Chat,
            Self::Voice(_) => MessageKind::Voice,
            Self::Signal(_) => MessageKind::Signal,
        }
    }
}

/// A client request decoded from either wire format. Sender and timestamp are
/// filled in by the hub, never taken from the client.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Chat { message: String },
    Voice { audio: Value },
    /// `to: None` is accepted on the wire and dropped by the router.
    Signal { to: Option<String>, signal: Value },
    Identify { id: String },
}

impl Inbound {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Chat { .. } => MessageKind::Chat,
            Self::Voice { .. } => MessageKind::Voice,
            Self::Signal { .. } => MessageKind::Signal,
            Self::Identify { .. } => MessageKind::Presence,
        }
    }
}

/// Queued for one recipient. Payloads are shared across a fan-out.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Tells the client which identifier it is addressed by.
    Welcome { id: String },
    History { messages: Arc<[ChatMessage]> },
    Chat(Arc<ChatMessage>),
    Voice(Arc<VoiceMessage>),
    Signal(Arc<SignalMessage>),
    Error { message: String },
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
