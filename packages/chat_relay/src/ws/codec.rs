//! Transport capability shared by both wire formats.

use relay_core::{Inbound, Outbound, TransportKind};

/// Error text sent to a client whose frame could not be decoded.
pub const MALFORMED_FRAME_MESSAGE: &str = "Invalid message format";

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown event: {0}")]
    UnknownEvent(String),
}

impl DecodeError {
    pub fn error_code(&self) -> &str {
        match self {
            Self::Json(_) => "invalid_json",
            Self::UnknownEvent(_) => "unknown_event",
        }
    }
}

/// Converts between one wire format and the relay's message model.
///
/// Decoding happens on the sender's connection; encoding happens on each
/// recipient's connection, so a message crosses transports by being encoded
/// by the recipient's codec.
pub trait WireCodec: Copy + Send + Sync + 'static {
    const TRANSPORT: TransportKind;

    /// Decode one client frame. Text and binary frames both carry UTF-8 JSON.
    fn decode(&self, frame: &[u8]) -> Result<Inbound, DecodeError>;

    fn encode(&self, msg: &Outbound) -> Result<String, serde_json::Error>;
}
