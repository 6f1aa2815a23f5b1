//! Raw message protocol.
//!
//! Every frame is a single JSON object whose `type` field names the message:
//! `{"type": "chat", "message": "hi"}`.

use relay_core::{ChatMessage, Inbound, Outbound, TransportKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::codec::{DecodeError, WireCodec};
use super::protocol::{ChatPayload, decode_event};

#[derive(Debug, Default, Clone, Copy)]
pub struct EnvelopeCodec;

/// Inbound object split into its tag and the remaining fields.
#[derive(Debug, Deserialize)]
struct Tagged {
    #[serde(rename = "type")]
    kind: String,
    #[serde(flatten)]
    body: Value,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum EnvelopeOut<'a> {
    Welcome {
        id: &'a str,
    },
    History {
        messages: Vec<ChatPayload<'a>>,
    },
    Chat {
        from: &'a str,
        message: &'a str,
        timestamp: i64,
    },
    Voice {
        from: &'a str,
        audio: &'a Value,
        timestamp: i64,
    },
    Signal {
        from: &'a str,
        signal: &'a Value,
    },
    Error {
        message: &'a str,
    },
}

impl<'a> From<&'a Outbound> for EnvelopeOut<'a> {
    fn from(msg: &'a Outbound) -> Self {
        match msg {
            Outbound::Welcome { id } => Self::Welcome { id },
            Outbound::History { messages } => Self::History {
                messages: messages.iter().map(ChatPayload::from).collect(),
            },
            Outbound::Chat(m) => {
                let ChatMessage {
                    from,
                    message,
                    timestamp,
                } = m.as_ref();
                Self::Chat {
                    from,
                    message,
                    timestamp: *timestamp,
                }
            }
            Outbound::Voice(m) => Self::Voice {
                from: &m.from,
                audio: &m.audio,
                timestamp: m.timestamp,
            },
            Outbound::Signal(m) => Self::Signal {
                from: &m.from,
                signal: &m.signal,
            },
            Outbound::Error { message } => Self::Error { message },
        }
    }
}

impl WireCodec for EnvelopeCodec {
    const TRANSPORT: TransportKind = TransportKind::Raw;

    fn decode(&self, frame: &[u8]) -> Result<Inbound, DecodeError> {
        let Tagged { kind, body } = serde_json::from_slice(frame)?;
        decode_event(&kind, body)
    }

    fn encode(&self, msg: &Outbound) -> Result<String, serde_json::Error> {
        serde_json::to_string(&EnvelopeOut::from(msg))
    }
}
