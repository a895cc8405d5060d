//! Relay-wide counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Server-wide statistics
///
/// Shared by the listener, sessions, and the router; all counters are
/// monotonic except `active_connections`.
#[derive(Debug)]
pub struct RelayStats {
    started_at: Instant,
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    rejected_handshakes: AtomicU64,
    frames_delivered: AtomicU64,
    frames_dropped: AtomicU64,
}

impl RelayStats {
    /// Create a fresh counter set
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            rejected_handshakes: AtomicU64::new(0),
            frames_delivered: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
        }
    }

    /// A connection reached the registry
    pub fn record_connected(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// A registered connection went away
    pub fn record_disconnected(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    /// A connection attempt was rejected before registration
    pub fn record_rejected(&self) {
        self.rejected_handshakes.fetch_add(1, Ordering::Relaxed);
    }

    /// A fan-out frame was queued to a recipient
    pub fn record_delivered(&self) {
        self.frames_delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// A fan-out frame was dropped on a full send queue
    pub fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time snapshot of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            rejected_handshakes: self.rejected_handshakes.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Copyable view of the counters at one instant
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    /// Connections ever registered
    pub total_connections: u64,
    /// Currently registered connections
    pub active_connections: u64,
    /// Handshakes rejected before registration
    pub rejected_handshakes: u64,
    /// Fan-out frames queued for delivery
    pub frames_delivered: u64,
    /// Fan-out frames dropped on full queues
    pub frames_dropped: u64,
    /// Time since the counters were created
    pub uptime: Duration,
}
