//! Routing core for the chat relay.
//!
//! Transport-agnostic pieces shared by every front end:
//! - `registry`: live connections keyed by an internal key, looked up by identifier
//! - `history`: chat history replayed to each new connection
//! - `hub`: admission, broadcast fan-out, and targeted delivery under one lock
//! - `id`: pluggable identifier generation

pub mod error;
pub mod history;
pub mod hub;
pub mod id;
pub mod message;
pub mod registry;

pub use error::{DeliveryError, RelayError};
pub use history::HistoryBuffer;
pub use hub::{Admission, DeliveryReport, HubConfig, RelayHub};
pub use id::{IdGenerator, RandomIds, SequentialIds};
pub use message::{
    ChatMessage, Inbound, Message, MessageKind, Outbound, SignalMessage, TransportKind,
    VoiceMessage,
};
pub use registry::{Connection, ConnectionKey, ConnectionRegistry, ConnectionState};
