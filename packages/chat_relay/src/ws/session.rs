//! WebSocket session loop
//!
//! `serve_connection` runs the raw protocol's socket loop; `dispatch` is the
//! shared path from a decoded frame to the hub for every transport.

use axum::extract::ws::{Message, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};
use relay_core::{ConnectionKey, DeliveryReport, Inbound, MessageKind, Outbound};
use tracing::{debug, error, info, warn};

use crate::server::AppState;

use super::codec::{DecodeError, MALFORMED_FRAME_MESSAGE, WireCodec};

/// Serve one upgraded socket until either side goes away.
pub async fn serve_connection<C: WireCodec>(socket: WebSocket, codec: C, state: AppState) {
    let transport = C::TRANSPORT;
    let admission = match state.hub.admit(transport, None).await {
        Ok(a) => a,
        Err(e) => {
            error!(transport = %transport, "Failed to admit connection: {}", e);
            state.metrics.websocket_error();
            return;
        }
    };
    let key = admission.key;
    let mut outbox = admission.outbox;

    state.metrics.connection_opened(transport);
    info!(
        conn_key = key,
        conn_id = %admission.identifier,
        transport = %transport,
        "WebSocket connection opened"
    );

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Task to drain the outbox into the socket
    let send_timeout = state.config.send_timeout;
    let metrics_send = state.metrics.clone();
    let sender_task = async move {
        while let Some(msg) = outbox.recv().await {
            let text = match codec.encode(&msg) {
                Ok(t) => t,
                Err(e) => {
                    error!(conn_key = key, "Failed to serialize message: {}", e);
                    continue;
                }
            };
            match tokio::time::timeout(send_timeout, ws_sender.send(Message::Text(text.into())))
                .await
            {
                Ok(Ok(())) => metrics_send.message_sent(),
                Ok(Err(e)) => {
                    debug!(conn_key = key, "WebSocket send failed: {}", e);
                    metrics_send.websocket_error();
                    break;
                }
                Err(_) => {
                    warn!(
                        conn_key = key,
                        "WebSocket send timed out after {:?}, closing", send_timeout
                    );
                    metrics_send.websocket_error();
                    break;
                }
            }
        }
    };

    // Task to handle incoming frames
    let state_input = state.clone();
    let input_task = async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    dispatch(&state_input, key, codec.decode(text.as_bytes())).await;
                }
                Ok(Message::Binary(data)) => {
                    dispatch(&state_input, key, codec.decode(&data)).await;
                }
                Ok(Message::Close(_)) => {
                    debug!(conn_key = key, "Client closed connection");
                    break;
                }
                Err(e) => {
                    debug!(conn_key = key, "WebSocket error: {}", e);
                    state_input.metrics.websocket_error();
                    break;
                }
                _ => {}
            }
        }
    };

    tokio::select! {
        _ = sender_task => debug!(conn_key = key, "Sender task ended"),
        _ = input_task => debug!(conn_key = key, "Input task ended"),
    }

    let conn_id = state.hub.close(key).await;
    state.metrics.connection_closed(transport);
    info!(
        conn_key = key,
        conn_id = conn_id.as_deref().unwrap_or_default(),
        transport = %transport,
        "WebSocket connection closed"
    );
}

/// Hand one decoded client frame to the hub.
///
/// Frames that fail to decode and requests the hub refuses are answered with
/// an error frame on this connection only. Events the relay does not know
/// are counted and otherwise ignored.
pub(super) async fn dispatch(
    state: &AppState,
    key: ConnectionKey,
    decoded: Result<Inbound, DecodeError>,
) {
    state.metrics.frame_received();

    let inbound = match decoded {
        Ok(m) => m,
        Err(DecodeError::UnknownEvent(event)) => {
            state.metrics.unknown_event();
            debug!(conn_key = key, event = %event, "Ignoring unknown event");
            return;
        }
        Err(e) => {
            state.metrics.malformed_frame();
            warn!(conn_key = key, code = e.error_code(), "Malformed frame: {}", e);
            reply_error(state, key, MALFORMED_FRAME_MESSAGE.to_string()).await;
            return;
        }
    };

    let kind = inbound.kind();
    match state.hub.handle(key, inbound).await {
        Ok(report) => {
            state.metrics.record_delivery(&report);
            if kind == MessageKind::Signal && report.is_empty() {
                state.metrics.signal_dropped();
            }
        }
        Err(e) => {
            state.metrics.request_rejected();
            debug!(conn_key = key, code = e.error_code(), "Request rejected: {}", e);
            reply_error(state, key, e.to_string()).await;
        }
    }
}

async fn reply_error(state: &AppState, key: ConnectionKey, message: String) {
    if state
        .hub
        .notify(key, Outbound::Error { message })
        .await
        .is_err()
    {
        state.metrics.record_delivery(&DeliveryReport {
            delivered: 0,
            dropped: 1,
        });
    }
}
