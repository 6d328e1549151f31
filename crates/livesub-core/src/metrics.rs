//! Broker counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

/// Counters describing broker activity.
#[derive(Debug)]
pub struct BrokerMetrics {
    /// Lifecycle notifications received by the translator.
    pub events_received: AtomicU64,
    /// Messages published to broadcast groups.
    pub dispatches: AtomicU64,
    /// Grouping axes skipped because the key could not be read.
    pub axes_skipped: AtomicU64,
    /// Notifications handed to connections.
    pub deliveries: AtomicU64,
    /// Notifications withheld by a permission check.
    pub permission_denied: AtomicU64,
    /// Events discarded by a drop-oldest mailbox.
    pub dropped_messages: AtomicU64,
    /// Sessions closed because their mailbox overflowed.
    pub overflow_disconnects: AtomicU64,
    /// Protocol errors reported to clients.
    pub protocol_errors: AtomicU64,
    /// Sessions opened.
    pub sessions_opened: AtomicU64,
    /// Sessions closed.
    pub sessions_closed: AtomicU64,
    /// Broker start time.
    pub started_at: Instant,
}

impl BrokerMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self {
            events_received: AtomicU64::new(0),
            dispatches: AtomicU64::new(0),
            axes_skipped: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            permission_denied: AtomicU64::new(0),
            dropped_messages: AtomicU64::new(0),
            overflow_disconnects: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            sessions_opened: AtomicU64::new(0),
            sessions_closed: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn record_event(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch(&self) {
        self.dispatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_axis_skipped(&self) {
        self.axes_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deliveries(&self, count: usize) {
        self.deliveries.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_permission_denied(&self) {
        self.permission_denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_overflow_disconnect(&self) {
        self.overflow_disconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_closed(&self) {
        self.sessions_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let sessions_opened = self.sessions_opened.load(Ordering::Relaxed);
        let sessions_closed = self.sessions_closed.load(Ordering::Relaxed);

        MetricsSnapshot {
            uptime_secs: self.started_at.elapsed().as_secs(),
            events_received: self.events_received.load(Ordering::Relaxed),
            dispatches: self.dispatches.load(Ordering::Relaxed),
            axes_skipped: self.axes_skipped.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            permission_denied: self.permission_denied.load(Ordering::Relaxed),
            dropped_messages: self.dropped_messages.load(Ordering::Relaxed),
            overflow_disconnects: self.overflow_disconnects.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            sessions_opened,
            sessions_closed,
            sessions_active: sessions_opened.saturating_sub(sessions_closed),
        }
    }
}

impl Default for BrokerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics handle.
pub type SharedMetrics = Arc<BrokerMetrics>;

/// Serializable copy of [`BrokerMetrics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub events_received: u64,
    pub dispatches: u64,
    pub axes_skipped: u64,
    pub deliveries: u64,
    pub permission_denied: u64,
    pub dropped_messages: u64,
    pub overflow_disconnects: u64,
    pub protocol_errors: u64,
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    pub sessions_active: u64,
}
