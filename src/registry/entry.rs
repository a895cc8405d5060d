//! Per-connection state stored in the registry

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Notify, RwLock};

use super::frame::{OutboundFrame, UserId};
use crate::protocol::CloseReason;

/// Result of queueing a frame for one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Frame accepted into the send queue
    Queued,
    /// Send queue was full; frame dropped and counted
    Dropped,
    /// Connection is closed or closing; frame discarded
    Closed,
}

/// One live client connection
///
/// The identity is set at construction and never reassigned. The
/// subscription set is mutated only by the owning connection's inbound-frame
/// handling; broadcasts take concurrent read locks.
#[derive(Debug)]
pub struct ConnectionEntry {
    /// Unique session ID (allocated by the listener)
    session_id: u64,

    /// Authenticated identity, immutable for the connection's lifetime
    identity: UserId,

    /// Remote peer address
    peer_addr: SocketAddr,

    /// Channels this connection wants market data for
    subscriptions: RwLock<HashSet<String>>,

    /// Bounded queue feeding the connection's writer task
    tx: mpsc::Sender<OutboundFrame>,

    /// Set once the connection is closing; all later sends no-op
    closed: AtomicBool,

    /// Wakes the session loop when the connection is closed out-of-band
    close_notify: Notify,

    /// Frames dropped because the send queue was full
    dropped_frames: AtomicU64,

    /// When the connection became active
    connected_at: Instant,
}

impl ConnectionEntry {
    /// Create a new entry for an authenticated connection.
    pub fn new(
        session_id: u64,
        identity: UserId,
        peer_addr: SocketAddr,
        tx: mpsc::Sender<OutboundFrame>,
    ) -> Self {
        Self {
            session_id,
            identity,
            peer_addr,
            subscriptions: RwLock::new(HashSet::new()),
            tx,
            closed: AtomicBool::new(false),
            close_notify: Notify::new(),
            dropped_frames: AtomicU64::new(0),
            connected_at: Instant::now(),
        }
    }

    /// Session ID of this connection
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Authenticated identity
    pub fn identity(&self) -> &UserId {
        &self.identity
    }

    /// Remote peer address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Add a channel to the subscription set. Idempotent.
    pub async fn subscribe(&self, channel: impl Into<String>) {
        self.subscriptions.write().await.insert(channel.into());
    }

    /// Remove a channel from the subscription set. Idempotent.
    pub async fn unsubscribe(&self, channel: &str) {
        self.subscriptions.write().await.remove(channel);
    }

    /// Whether the subscription set contains `channel`
    pub async fn is_subscribed(&self, channel: &str) -> bool {
        self.subscriptions.read().await.contains(channel)
    }

    /// Number of subscribed channels
    pub async fn subscription_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }

    /// Queue a frame for delivery without blocking.
    ///
    /// Overflow policy: a full queue drops the frame and increments the
    /// dropped counter. A closed connection discards silently.
    pub fn send(&self, frame: OutboundFrame) -> SendOutcome {
        if self.is_closed() {
            return SendOutcome::Closed;
        }

        match self.tx.try_send(frame) {
            Ok(()) => SendOutcome::Queued,
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped_frames.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    session_id = self.session_id,
                    identity = %self.identity,
                    dropped,
                    "Send queue full, dropping frame"
                );
                SendOutcome::Dropped
            }
            Err(TrySendError::Closed(_)) => SendOutcome::Closed,
        }
    }

    /// Close the connection.
    ///
    /// Marks the entry closed (stopping further dispatch immediately),
    /// queues a close frame for the writer, and wakes the session loop.
    /// Idempotent; only the first reason wins.
    pub fn close(&self, reason: CloseReason) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.try_send(OutboundFrame::Close(reason));
        self.close_notify.notify_waiters();
    }

    /// Whether the connection has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wait until the connection is closed.
    pub async fn closed(&self) {
        let notified = self.close_notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_closed() {
            return;
        }
        notified.await;
    }

    /// Frames dropped on this connection due to queue overflow
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    /// How long the connection has been active
    pub fn uptime(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }
}
