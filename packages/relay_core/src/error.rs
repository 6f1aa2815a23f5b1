//! Error types and stable error codes.

use crate::message::MessageKind;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("unknown connection")]
    UnknownConnection,

    #[error("identifier must not be empty")]
    EmptyIdentifier,

    #[error("identifier already in use: {0}")]
    IdentifierInUse(String),

    #[error("identify is only allowed once, before any chat, voice, or signal")]
    IdentifyNotAllowed,

    #[error("{0} messages cannot be broadcast")]
    NotBroadcastable(MessageKind),
}

impl RelayError {
    pub fn error_code(&self) -> &str {
        match self {
            Self::UnknownConnection => "unknown_connection",
            Self::EmptyIdentifier => "empty_identifier",
            Self::IdentifierInUse(_) => "identifier_in_use",
            Self::IdentifyNotAllowed => "identify_not_allowed",
            Self::NotBroadcastable(_) => "not_broadcastable",
        }
    }
}

/// Why a single recipient did not get a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("outbound queue full")]
    Full,

    #[error("connection closed")]
    Closed,
}
