//! Socket.IO front end
//!
//! Every socket on the default namespace becomes one hub connection whose
//! identifier is the Socket.IO socket id, so `signal.to` can name any
//! connected socket directly. Client events are queued in arrival order and
//! fed through the same `dispatch` path as raw frames.

use std::sync::Arc;

use relay_core::{DeliveryReport, Outbound, TransportKind};
use serde::Serialize;
use serde_json::{Value, json};
use socketioxide::SocketIo;
use socketioxide::extract::{Data, SocketRef};
use tokio::sync::{Notify, mpsc};
use tracing::{debug, error, info, warn};

use crate::server::AppState;

use super::protocol::{ChatPayload, HistoryPayload, SignalPayload, VoicePayload, decode_event};
use super::session::dispatch;

/// Client events forwarded to the hub. Anything else is ignored by the
/// Socket.IO layer itself.
const CLIENT_EVENTS: [&str; 5] = ["chat", "voice", "signal", "identify", "presence"];

type InboundEvent = (&'static str, Value);

/// Attach the relay to the default namespace of `io`.
pub fn register(io: &SocketIo, state: AppState) {
    io.ns("/", move |socket: SocketRef| on_connect(socket, state.clone()));
}

fn on_connect(socket: SocketRef, state: AppState) {
    let capacity = state.config.hub.outbound_capacity.max(1);
    let (inbox_tx, inbox_rx) = mpsc::channel::<InboundEvent>(capacity);

    // Sync handlers run in arrival order, so the inbox preserves client order.
    for event in CLIENT_EVENTS {
        let inbox = inbox_tx.clone();
        let metrics = state.metrics.clone();
        socket.on(event, move |Data(payload): Data<Value>| {
            if let Err(e) = inbox.try_send((event, payload)) {
                warn!(event, "Dropping Socket.IO event: {}", e);
                metrics.record_delivery(&DeliveryReport {
                    delivered: 0,
                    dropped: 1,
                });
            }
        });
    }

    let closed = Arc::new(Notify::new());
    let on_close = closed.clone();
    socket.on_disconnect(move |socket: SocketRef| {
        debug!(sid = %socket.id, "Socket.IO disconnect");
        on_close.notify_one();
    });

    tokio::spawn(serve_socket(socket, state, inbox_rx, closed));
}

async fn serve_socket(
    socket: SocketRef,
    state: AppState,
    mut inbox: mpsc::Receiver<InboundEvent>,
    closed: Arc<Notify>,
) {
    let transport = TransportKind::Framed;
    let sid = socket.id.to_string();
    let admission = match state.hub.admit(transport, Some(sid.clone())).await {
        Ok(a) => a,
        Err(e) => {
            error!(sid = %sid, "Failed to admit Socket.IO connection: {}", e);
            state.metrics.websocket_error();
            let _ = socket.disconnect();
            return;
        }
    };
    let key = admission.key;
    let mut outbox = admission.outbox;

    state.metrics.connection_opened(transport);
    info!(conn_key = key, sid = %sid, "Socket.IO connection opened");

    loop {
        tokio::select! {
            _ = closed.notified() => break,
            Some(msg) = outbox.recv() => match emit(&socket, &msg) {
                Ok(()) => state.metrics.message_sent(),
                Err(e) => {
                    debug!(conn_key = key, "Socket.IO emit failed: {}", e);
                    state.metrics.websocket_error();
                    break;
                }
            },
            Some((event, payload)) = inbox.recv() => {
                dispatch(&state, key, decode_event(event, payload)).await;
            }
            else => break,
        }
    }

    let conn_id = state.hub.close(key).await;
    state.metrics.connection_closed(transport);
    info!(
        conn_key = key,
        conn_id = conn_id.as_deref().unwrap_or_default(),
        "Socket.IO connection closed"
    );
}

/// Emit one outbound message as its named Socket.IO event.
fn emit(socket: &SocketRef, msg: &Outbound) -> Result<(), String> {
    match msg {
        Outbound::Welcome { id } => send(socket, "welcome", &json!({ "id": id })),
        Outbound::History { messages } => {
            send(socket, "history", &HistoryPayload::new(messages))
        }
        Outbound::Chat(m) => send(socket, "chat", &ChatPayload::from(m.as_ref())),
        Outbound::Voice(m) => send(socket, "voice", &VoicePayload::from(m.as_ref())),
        Outbound::Signal(m) => send(socket, "signal", &SignalPayload::from(m.as_ref())),
        Outbound::Error { message } => send(socket, "error", &json!({ "message": message })),
    }
}

fn send<T: Serialize + ?Sized>(
    socket: &SocketRef,
    event: &'static str,
    data: &T,
) -> Result<(), String> {
    socket.emit(event, data).map_err(|e| e.to_string())
}
