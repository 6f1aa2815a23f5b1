//! Server metrics for observability
//!
//! Atomic counters bumped from the connection loops, exposed as JSON on `/metrics`.

use relay_core::{DeliveryReport, TransportKind};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Server-wide metrics
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Connection metrics
    /// Currently open framed-protocol connections
    pub active_framed: AtomicU64,
    /// Currently open raw-protocol connections
    pub active_raw: AtomicU64,
    /// Total connections since server start
    pub total_connections: AtomicU64,

    // Message metrics
    /// Frames received from clients
    pub frames_received: AtomicU64,
    /// Frames written to clients
    pub messages_sent: AtomicU64,
    /// Deliveries skipped because a recipient queue was full or closed
    pub messages_dropped: AtomicU64,
    /// Signals that matched no connection
    pub signals_dropped: AtomicU64,
    /// Well-formed frames naming an event the relay does not handle
    pub ignored_frames: AtomicU64,

    // Error metrics
    /// Frames that failed to decode
    pub malformed_frames: AtomicU64,
    /// Well-formed requests the hub refused (e.g. late identify)
    pub rejected_requests: AtomicU64,
    /// WebSocket read/write errors and send timeouts
    pub websocket_errors: AtomicU64,

    /// Server start time (for uptime calculation)
    start_time: Option<Instant>,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    // Connection tracking
    pub fn connection_opened(&self, transport: TransportKind) {
        self.active_for(transport).fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self, transport: TransportKind) {
        self.active_for(transport).fetch_sub(1, Ordering::Relaxed);
    }

    fn active_for(&self, transport: TransportKind) -> &AtomicU64 {
        match transport {
            TransportKind::Framed => &self.active_framed,
            TransportKind::Raw => &self.active_raw,
        }
    }

    // Message tracking
    pub fn frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivery(&self, report: &DeliveryReport) {
        if report.dropped > 0 {
            self.messages_dropped
                .fetch_add(report.dropped as u64, Ordering::Relaxed);
        }
    }

    pub fn signal_dropped(&self) {
        self.signals_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unknown_event(&self) {
        self.ignored_frames.fetch_add(1, Ordering::Relaxed);
    }

    // Error tracking
    pub fn malformed_frame(&self) {
        self.malformed_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_rejected(&self) {
        self.rejected_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn websocket_error(&self) {
        self.websocket_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// Create a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let framed = self.active_framed.load(Ordering::Relaxed);
        let raw = self.active_raw.load(Ordering::Relaxed);
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            connections: ConnectionMetrics {
                active: framed + raw,
                framed,
                raw,
                total: self.total_connections.load(Ordering::Relaxed),
            },
            messages: MessageMetrics {
                received: self.frames_received.load(Ordering::Relaxed),
                sent: self.messages_sent.load(Ordering::Relaxed),
                dropped: self.messages_dropped.load(Ordering::Relaxed),
                signals_dropped: self.signals_dropped.load(Ordering::Relaxed),
                ignored: self.ignored_frames.load(Ordering::Relaxed),
            },
            errors: ErrorMetrics {
                malformed: self.malformed_frames.load(Ordering::Relaxed),
                rejected: self.rejected_requests.load(Ordering::Relaxed),
                websocket: self.websocket_errors.load(Ordering::Relaxed),
            },
        }
    }
}

/// Serializable snapshot of metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub connections: ConnectionMetrics,
    pub messages: MessageMetrics,
    pub errors: ErrorMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub active: u64,
    pub framed: u64,
    pub raw: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetrics {
    pub received: u64,
    pub sent: u64,
    pub dropped: u64,
    pub signals_dropped: u64,
    pub ignored: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub malformed: u64,
    pub rejected: u64,
    pub websocket: u64,
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub connections: u64,
    pub history_entries: u64,
    pub uptime_secs: u64,
}
