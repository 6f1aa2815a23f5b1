//! WebSocket front ends
//!
//! Two wire formats share one routing core:
//! - Socket.IO under `/socket.io/`: events such as `42["chat", {...}]`
//! - raw message protocol on `/` and `/ws`: `{"type": "chat", ...}`
//!
//! Both decode client input into the hub's `Inbound` model and hand it to
//! `session::dispatch`.

pub mod codec;
mod envelope_codec;
mod protocol;
mod session;
mod socketio;

pub use envelope_codec::EnvelopeCodec;
pub use session::serve_connection;
pub use socketio::register as register_socketio;
