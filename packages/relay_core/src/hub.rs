//! Relay hub: admission, broadcast fan-out, and targeted delivery.
//!
//! Registry and history sit behind a single mutex so that admission (with
//! its history snapshot), history appends, and fan-out never interleave. A
//! new connection's snapshot therefore either contains a concurrently
//! broadcast chat line or the line arrives live afterwards, never both.
//!
//! Delivery only ever calls `try_send` on a recipient's bounded queue, so the
//! lock is never held across a socket write and one slow recipient cannot
//! stall the rest.

use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use crate::error::{DeliveryError, RelayError};
use crate::history::HistoryBuffer;
use crate::id::IdGenerator;
use crate::message::{
    ChatMessage, Inbound, Message, Outbound, SignalMessage, TransportKind, VoiceMessage,
    now_millis,
};
use crate::registry::{ConnectionKey, ConnectionRegistry, ConnectionState};

/// Default per-connection outbound queue length.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// Welcome and history are queued on admission, so every queue holds at least two.
const MIN_OUTBOUND_CAPACITY: usize = 2;

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// `None` keeps every chat line for the life of the process.
    pub history_capacity: Option<NonZeroUsize>,
    pub outbound_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            history_capacity: None,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }
}

/// Result of admitting a connection. The outbox already holds the welcome
/// frame followed by the history snapshot.
#[derive(Debug)]
pub struct Admission {
    pub key: ConnectionKey,
    pub identifier: String,
    pub outbox: mpsc::Receiver<Outbound>,
}

/// Per-pass delivery counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Recipients the message was enqueued to.
    pub delivered: usize,
    /// Recipients whose queue was full or closed.
    pub dropped: usize,
}

impl DeliveryReport {
    fn record(&mut self, result: Result<(), DeliveryError>) {
        match result {
            Ok(()) => self.delivered += 1,
            Err(_) => self.dropped += 1,
        }
    }

    /// True if nobody matched at all.
    pub fn is_empty(&self) -> bool {
        self.delivered == 0 && self.dropped == 0
    }
}

struct HubState {
    registry: ConnectionRegistry,
    history: HistoryBuffer,
}

impl HubState {
    /// Enqueue `msg` to every connection except `exclude`.
    fn fan_out(&self, exclude: Option<ConnectionKey>, msg: &Outbound) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for conn in self.registry.all() {
            if Some(conn.key()) == exclude {
                continue;
            }
            let result = conn.offer(msg.clone());
            if let Err(e) = result {
                warn!(
                    conn_id = %conn.identifier(),
                    transport = %conn.transport(),
                    "broadcast delivery failed: {}",
                    e
                );
            }
            report.record(result);
        }
        report
    }

    /// Enqueue `msg` to every connection holding `destination`.
    fn route_to(&self, destination: &str, msg: &Outbound) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for conn in self.registry.find_by_identifier(destination) {
            let result = conn.offer(msg.clone());
            if let Err(e) = result {
                warn!(
                    conn_id = %conn.identifier(),
                    transport = %conn.transport(),
                    "targeted delivery failed: {}",
                    e
                );
            }
            report.record(result);
        }
        if report.is_empty() {
            debug!(destination = %destination, "no connection for destination, dropping");
        }
        report
    }

    /// Mark the sender active and return its identifier.
    fn activate_sender(&mut self, key: ConnectionKey) -> Result<String, RelayError> {
        let conn = self
            .registry
            .get_mut(key)
            .ok_or(RelayError::UnknownConnection)?;
        conn.activate();
        Ok(conn.identifier().to_string())
    }

    fn broadcast(
        &mut self,
        sender: Option<ConnectionKey>,
        message: Message,
    ) -> Result<DeliveryReport, RelayError> {
        match message {
            Message::Chat(chat) => {
                self.history.append(chat.clone());
                Ok(self.fan_out(sender, &Outbound::Chat(Arc::new(chat))))
            }
            Message::Voice(voice) => Ok(self.fan_out(sender, &Outbound::Voice(Arc::new(voice)))),
            other => Err(RelayError::NotBroadcastable(other.kind())),
        }
    }
}

/// Shared routing core used by both transport front ends.
pub struct RelayHub {
    state: Mutex<HubState>,
    outbound_capacity: usize,
}

impl RelayHub {
    pub fn new(config: HubConfig, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            state: Mutex::new(HubState {
                registry: ConnectionRegistry::new(ids),
                history: HistoryBuffer::with_capacity(config.history_capacity),
            }),
            outbound_capacity: config.outbound_capacity.max(MIN_OUTBOUND_CAPACITY),
        }
    }

    /// Register a new connection and queue its welcome and history.
    pub async fn admit(
        &self,
        transport: TransportKind,
        supplied: Option<String>,
    ) -> Result<Admission, RelayError> {
        let (tx, outbox) = mpsc::channel(self.outbound_capacity);
        let mut state = self.state.lock().await;
        let messages = state.history.snapshot();
        let conn = state.registry.admit(transport, supplied, tx)?;

        // Fresh queue with room for both, so neither can fail.
        let _ = conn.offer(Outbound::Welcome {
            id: conn.identifier().to_string(),
        });
        let _ = conn.offer(Outbound::History { messages });

        debug!(
            conn_id = %conn.identifier(),
            transport = %transport,
            "connection admitted"
        );
        Ok(Admission {
            key: conn.key(),
            identifier: conn.identifier().to_string(),
            outbox,
        })
    }

    /// Remove a connection, returning the identifier it last held. Later
    /// deliveries never reach it.
    pub async fn close(&self, key: ConnectionKey) -> Option<String> {
        let conn = self.state.lock().await.registry.remove(key)?;
        debug!(
            conn_id = %conn.identifier(),
            transport = %conn.transport(),
            "connection removed"
        );
        Some(conn.identifier().to_string())
    }

    /// Handle one decoded client request from connection `key`.
    ///
    /// Chat is appended to history and fanned out; voice is fanned out;
    /// signal is routed to its destination; identify renames the connection.
    pub async fn handle(
        &self,
        key: ConnectionKey,
        inbound: Inbound,
    ) -> Result<DeliveryReport, RelayError> {
        let mut state = self.state.lock().await;

        match inbound {
            Inbound::Identify { id } => Self::identify_locked(&mut state, key, id),
            Inbound::Chat { message } => {
                let from = state.activate_sender(key)?;
                state.broadcast(
                    Some(key),
                    Message::Chat(ChatMessage {
                        from,
                        message,
                        timestamp: now_millis(),
                    }),
                )
            }
            Inbound::Voice { audio } => {
                let from = state.activate_sender(key)?;
                state.broadcast(
                    Some(key),
                    Message::Voice(VoiceMessage {
                        from,
                        audio,
                        timestamp: now_millis(),
                    }),
                )
            }
            Inbound::Signal { to, signal } => {
                let from = state.activate_sender(key)?;
                let Some(to) = to else {
                    debug!(conn_id = %from, "signal without destination, dropping");
                    return Ok(DeliveryReport::default());
                };
                let msg = Outbound::Signal(Arc::new(SignalMessage {
                    from,
                    signal,
                    timestamp: now_millis(),
                }));
                Ok(state.route_to(&to, &msg))
            }
        }
    }

    /// Deliver a chat or voice message to every connection, optionally
    /// skipping the sender's own connection. Chat is appended to history.
    pub async fn broadcast(
        &self,
        sender: ConnectionKey,
        message: Message,
        exclude_sender: bool,
    ) -> Result<DeliveryReport, RelayError> {
        let exclude = exclude_sender.then_some(sender);
        self.state.lock().await.broadcast(exclude, message)
    }

    /// Deliver a signal to every connection whose identifier equals
    /// `destination`. No match is not an error.
    pub async fn deliver(&self, message: SignalMessage, destination: &str) -> DeliveryReport {
        let msg = Outbound::Signal(Arc::new(message));
        self.state.lock().await.route_to(destination, &msg)
    }

    /// Queue a message for one connection (error replies).
    pub async fn notify(&self, key: ConnectionKey, msg: Outbound) -> Result<(), DeliveryError> {
        let state = self.state.lock().await;
        match state.registry.get(key) {
            Some(conn) => conn.offer(msg),
            None => Err(DeliveryError::Closed),
        }
    }

    pub async fn history_len(&self) -> usize {
        self.state.lock().await.history.len()
    }

    pub async fn connection_count(&self) -> usize {
        self.state.lock().await.registry.len()
    }

    fn identify_locked(
        state: &mut HubState,
        key: ConnectionKey,
        id: String,
    ) -> Result<DeliveryReport, RelayError> {
        let current = state
            .registry
            .get(key)
            .ok_or(RelayError::UnknownConnection)?;
        if current.state() != ConnectionState::Open {
            return Err(RelayError::IdentifyNotAllowed);
        }

        let previous = current.identifier().to_string();
        state.registry.rename(key, id)?;

        let mut report = DeliveryReport::default();
        if let Some(conn) = state.registry.get_mut(key) {
            conn.activate();
            debug!(
                conn_id = %conn.identifier(),
                previous = %previous,
                "connection identified"
            );
            report.record(conn.offer(Outbound::Welcome {
                id: conn.identifier().to_string(),
            }));
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::SequentialIds;
    use crate::message::MessageKind;
    use serde_json::json;

    fn hub() -> RelayHub {
        RelayHub::new(HubConfig::default(), Arc::new(SequentialIds::new()))
    }

    impl RelayHub {
        async fn history_snapshot(&self) -> Arc<[ChatMessage]> {
            self.state.lock().await.history.snapshot()
        }

        async fn identifier_of(&self, key: ConnectionKey) -> Option<String> {
            let state = self.state.lock().await;
            state
                .registry
                .get(key)
                .map(|c| c.identifier().to_string())
        }

        async fn state_of(&self, key: ConnectionKey) -> ConnectionState {
            let state = self.state.lock().await;
            state
                .registry
                .get(key)
                .map(|c| c.state())
                .unwrap_or(ConnectionState::Closed)
        }
    }

    /// Drain everything currently queued.
    fn drain(rx: &mut mpsc::Receiver<Outbound>) -> Vec<Outbound> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    /// Admit and discard the welcome + history frames.
    async fn join(hub: &RelayHub, transport: TransportKind) -> Admission {
        let mut adm = hub.admit(transport, None).await.unwrap();
        let initial = drain(&mut adm.outbox);
        assert_eq!(initial.len(), 2);
        adm
    }

    fn chat(text: &str) -> Inbound {
        Inbound::Chat {
            message: text.into(),
        }
    }

    #[tokio::test]
    async fn admit_queues_welcome_then_history() {
        let hub = hub();
        let mut adm = hub.admit(TransportKind::Raw, None).await.unwrap();
        assert_eq!(adm.identifier, "raw-1");

        let frames = drain(&mut adm.outbox);
        assert_eq!(
            frames[0],
            Outbound::Welcome {
                id: "raw-1".into()
            }
        );
        match &frames[1] {
            Outbound::History { messages } => assert!(messages.is_empty()),
            other => panic!("expected history, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn chat_reaches_others_not_sender() {
        let hub = hub();
        let mut x = join(&hub, TransportKind::Raw).await;
        let mut y = join(&hub, TransportKind::Raw).await;
        let mut z = join(&hub, TransportKind::Framed).await;

        let report = hub.handle(x.key, chat("hi")).await.unwrap();
        assert_eq!(report.delivered, 2);

        assert!(drain(&mut x.outbox).is_empty());
        for rx in [&mut y.outbox, &mut z.outbox] {
            let frames = drain(rx);
            assert_eq!(frames.len(), 1);
            match &frames[0] {
                Outbound::Chat(m) => {
                    assert_eq!(m.from, "raw-1");
                    assert_eq!(m.message, "hi");
                }
                other => panic!("expected chat, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn late_joiner_gets_chat_history_only() {
        let hub = hub();
        let x = join(&hub, TransportKind::Raw).await;
        let _y = join(&hub, TransportKind::Raw).await;

        hub.handle(x.key, chat("hi")).await.unwrap();
        hub.handle(
            x.key,
            Inbound::Voice {
                audio: json!("AAAA"),
            },
        )
        .await
        .unwrap();
        hub.handle(
            x.key,
            Inbound::Signal {
                to: Some("raw-2".into()),
                signal: json!({"sdp": "offer"}),
            },
        )
        .await
        .unwrap();

        let mut z = hub.admit(TransportKind::Framed, None).await.unwrap();
        let frames = drain(&mut z.outbox);
        match &frames[1] {
            Outbound::History { messages } => {
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].from, "raw-1");
                assert_eq!(messages[0].message, "hi");
            }
            other => panic!("expected history, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn voice_skips_history() {
        let hub = hub();
        let x = join(&hub, TransportKind::Raw).await;
        let mut y = join(&hub, TransportKind::Framed).await;

        hub.handle(
            x.key,
            Inbound::Voice {
                audio: json!("AAAA"),
            },
        )
        .await
        .unwrap();

        assert_eq!(hub.history_len().await, 0);
        let frames = drain(&mut y.outbox);
        assert!(matches!(&frames[0], Outbound::Voice(v) if v.audio == json!("AAAA")));
    }

    #[tokio::test]
    async fn signal_reaches_only_destination() {
        let hub = hub();
        let mut x = join(&hub, TransportKind::Raw).await;
        let mut y = join(&hub, TransportKind::Raw).await;
        let mut z = join(&hub, TransportKind::Framed).await;

        let report = hub
            .handle(
                x.key,
                Inbound::Signal {
                    to: Some(z.identifier.clone()),
                    signal: json!({"candidate": 1}),
                },
            )
            .await
            .unwrap();
        assert_eq!(report.delivered, 1);

        assert!(drain(&mut x.outbox).is_empty());
        assert!(drain(&mut y.outbox).is_empty());
        let frames = drain(&mut z.outbox);
        match &frames[0] {
            Outbound::Signal(s) => {
                assert_eq!(s.from, x.identifier);
                assert_eq!(s.signal, json!({"candidate": 1}));
            }
            other => panic!("expected signal, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn signal_to_unknown_is_silent() {
        let hub = hub();
        let mut x = join(&hub, TransportKind::Raw).await;
        let mut y = join(&hub, TransportKind::Framed).await;

        let report = hub
            .handle(
                x.key,
                Inbound::Signal {
                    to: Some("nonexistent".into()),
                    signal: json!({}),
                },
            )
            .await
            .unwrap();
        assert!(report.is_empty());
        assert!(drain(&mut x.outbox).is_empty());
        assert!(drain(&mut y.outbox).is_empty());
    }

    #[tokio::test]
    async fn signal_without_destination_dropped() {
        let hub = hub();
        let x = join(&hub, TransportKind::Raw).await;
        let mut y = join(&hub, TransportKind::Raw).await;

        let report = hub
            .handle(
                x.key,
                Inbound::Signal {
                    to: None,
                    signal: json!({}),
                },
            )
            .await
            .unwrap();
        assert!(report.is_empty());
        assert!(drain(&mut y.outbox).is_empty());
    }

    #[tokio::test]
    async fn signal_fans_out_across_transports() {
        let hub = hub();
        let x = join(&hub, TransportKind::Raw).await;
        let mut a = join(&hub, TransportKind::Raw).await;
        let mut b = join(&hub, TransportKind::Framed).await;

        hub.handle(a.key, Inbound::Identify { id: "peer".into() })
            .await
            .unwrap();
        hub.handle(b.key, Inbound::Identify { id: "peer".into() })
            .await
            .unwrap();
        drain(&mut a.outbox);
        drain(&mut b.outbox);

        let report = hub
            .handle(
                x.key,
                Inbound::Signal {
                    to: Some("peer".into()),
                    signal: json!("ring"),
                },
            )
            .await
            .unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(drain(&mut a.outbox).len(), 1);
        assert_eq!(drain(&mut b.outbox).len(), 1);
    }

    #[tokio::test]
    async fn identify_once_before_activity() {
        let hub = hub();
        let mut x = join(&hub, TransportKind::Framed).await;

        hub.handle(x.key, Inbound::Identify { id: "alice".into() })
            .await
            .unwrap();
        assert_eq!(hub.identifier_of(x.key).await.as_deref(), Some("alice"));
        assert_eq!(hub.state_of(x.key).await, ConnectionState::Active);
        assert_eq!(
            drain(&mut x.outbox),
            vec![Outbound::Welcome { id: "alice".into() }]
        );

        let err = hub
            .handle(x.key, Inbound::Identify { id: "bob".into() })
            .await
            .unwrap_err();
        assert_eq!(err, RelayError::IdentifyNotAllowed);
        assert_eq!(hub.identifier_of(x.key).await.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn identify_after_chat_rejected() {
        let hub = hub();
        let x = join(&hub, TransportKind::Raw).await;

        hub.handle(x.key, chat("first")).await.unwrap();
        let err = hub
            .handle(x.key, Inbound::Identify { id: "late".into() })
            .await
            .unwrap_err();
        assert_eq!(err, RelayError::IdentifyNotAllowed);
        assert_eq!(hub.identifier_of(x.key).await.as_deref(), Some("raw-1"));
    }

    #[tokio::test]
    async fn identify_taken_on_same_transport_rejected() {
        let hub = hub();
        let a = join(&hub, TransportKind::Raw).await;
        let b = join(&hub, TransportKind::Raw).await;

        hub.handle(a.key, Inbound::Identify { id: "alice".into() })
            .await
            .unwrap();
        let err = hub
            .handle(b.key, Inbound::Identify { id: "alice".into() })
            .await
            .unwrap_err();
        assert_eq!(err, RelayError::IdentifierInUse("alice".into()));
        // Failed identify leaves the connection free to try again
        assert_eq!(hub.state_of(b.key).await, ConnectionState::Open);
    }

    #[tokio::test]
    async fn closed_connection_never_receives() {
        let hub = hub();
        let x = join(&hub, TransportKind::Raw).await;
        let y = join(&hub, TransportKind::Raw).await;
        hub.handle(y.key, Inbound::Identify { id: "yoda".into() })
            .await
            .unwrap();
        let y_id = "yoda".to_string();

        // The identifier reported on close is the renamed one, not the original.
        assert_ne!(y.identifier, y_id);
        assert_eq!(hub.close(y.key).await, Some(y_id.clone()));
        assert!(hub.close(y.key).await.is_none());
        assert_eq!(hub.state_of(y.key).await, ConnectionState::Closed);

        let report = hub.handle(x.key, chat("anyone?")).await.unwrap();
        assert!(report.is_empty());

        let report = hub
            .handle(
                x.key,
                Inbound::Signal {
                    to: Some(y_id),
                    signal: json!({}),
                },
            )
            .await
            .unwrap();
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn handle_from_unknown_connection() {
        let hub = hub();
        let err = hub.handle(42, chat("ghost")).await.unwrap_err();
        assert_eq!(err, RelayError::UnknownConnection);
        assert_eq!(hub.history_len().await, 0);
    }

    #[tokio::test]
    async fn full_queue_isolated_per_recipient() {
        let hub = RelayHub::new(
            HubConfig {
                history_capacity: None,
                outbound_capacity: 2,
            },
            Arc::new(SequentialIds::new()),
        );
        let x = join(&hub, TransportKind::Raw).await;
        // Slow: never drained after join
        let _slow = join(&hub, TransportKind::Raw).await;
        let mut fast = join(&hub, TransportKind::Framed).await;

        for i in 0..4 {
            let report = hub.handle(x.key, chat(&format!("m{i}"))).await.unwrap();
            assert_eq!(report.delivered + report.dropped, 2);
            // Keep the fast recipient drained
            assert_eq!(drain(&mut fast.outbox).len(), 1);
        }
        assert_eq!(hub.history_len().await, 4);
    }

    #[tokio::test]
    async fn broadcast_rejects_signal() {
        let hub = hub();
        let x = join(&hub, TransportKind::Raw).await;
        let err = hub
            .broadcast(
                x.key,
                Message::Signal(SignalMessage {
                    from: x.identifier.clone(),
                    signal: json!({}),
                    timestamp: 0,
                }),
                true,
            )
            .await
            .unwrap_err();
        assert_eq!(err, RelayError::NotBroadcastable(MessageKind::Signal));
    }

    #[tokio::test]
    async fn broadcast_can_include_sender() {
        let hub = hub();
        let mut x = join(&hub, TransportKind::Raw).await;
        let mut y = join(&hub, TransportKind::Raw).await;

        let msg = Message::Chat(ChatMessage {
            from: x.identifier.clone(),
            message: "to all".into(),
            timestamp: now_millis(),
        });
        let report = hub.broadcast(x.key, msg, false).await.unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(drain(&mut x.outbox).len(), 1);
        assert_eq!(drain(&mut y.outbox).len(), 1);
    }

    #[tokio::test]
    async fn deliver_direct() {
        let hub = hub();
        let mut y = join(&hub, TransportKind::Framed).await;

        let report = hub
            .deliver(
                SignalMessage {
                    from: "server".into(),
                    signal: json!({"bye": true}),
                    timestamp: now_millis(),
                },
                &y.identifier,
            )
            .await;
        assert_eq!(report.delivered, 1);
        assert_eq!(drain(&mut y.outbox).len(), 1);
    }

    #[tokio::test]
    async fn notify_targets_one_connection() {
        let hub = hub();
        let mut x = join(&hub, TransportKind::Raw).await;
        let mut y = join(&hub, TransportKind::Raw).await;

        hub.notify(
            x.key,
            Outbound::Error {
                message: "Invalid message format".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(drain(&mut x.outbox).len(), 1);
        assert!(drain(&mut y.outbox).is_empty());

        assert_eq!(
            hub.notify(999, Outbound::Error { message: "x".into() })
                .await,
            Err(DeliveryError::Closed)
        );
    }

    #[tokio::test]
    async fn server_assigns_timestamps() {
        let hub = hub();
        let x = join(&hub, TransportKind::Raw).await;
        let before = now_millis();
        hub.handle(x.key, chat("t")).await.unwrap();
        let after = now_millis();

        let history = hub.history_snapshot().await;
        assert!(history[0].timestamp >= before && history[0].timestamp <= after);
    }

    #[tokio::test]
    async fn counts_connections_across_transports() {
        let hub = hub();
        let _a = join(&hub, TransportKind::Raw).await;
        let _b = join(&hub, TransportKind::Framed).await;
        let _c = join(&hub, TransportKind::Framed).await;
        assert_eq!(hub.connection_count().await, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_joiners_see_each_chat_exactly_once() {
        const CHATS: usize = 300;
        const JOINERS: usize = 12;

        let hub = Arc::new(RelayHub::new(
            HubConfig {
                history_capacity: None,
                outbound_capacity: CHATS + 8,
            },
            Arc::new(SequentialIds::new()),
        ));
        let sender = join(&hub, TransportKind::Raw).await;
        let sender_key = sender.key;

        let chatter = {
            let hub = hub.clone();
            tokio::spawn(async move {
                for i in 0..CHATS {
                    hub.handle(sender_key, chat(&i.to_string())).await.unwrap();
                    if i % 7 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        };

        let joiners: Vec<_> = (0..JOINERS)
            .map(|n| {
                let hub = hub.clone();
                tokio::spawn(async move {
                    for _ in 0..n * 3 {
                        tokio::task::yield_now().await;
                    }
                    let transport = if n % 2 == 0 {
                        TransportKind::Framed
                    } else {
                        TransportKind::Raw
                    };
                    hub.admit(transport, None).await.unwrap()
                })
            })
            .collect();

        let mut admissions = Vec::new();
        for joiner in joiners {
            admissions.push(joiner.await.unwrap());
        }
        chatter.await.unwrap();

        let expected: Vec<String> = (0..CHATS).map(|i| i.to_string()).collect();
        for mut adm in admissions {
            let frames = drain(&mut adm.outbox);
            let Outbound::History { messages } = &frames[1] else {
                panic!("expected history, got {:?}", frames[1]);
            };
            let mut seen: Vec<String> = messages.iter().map(|m| m.message.clone()).collect();
            for frame in &frames[2..] {
                match frame {
                    Outbound::Chat(m) => seen.push(m.message.clone()),
                    other => panic!("unexpected frame {:?}", other),
                }
            }
            assert_eq!(seen, expected);
        }
        drop(sender);
    }
}
