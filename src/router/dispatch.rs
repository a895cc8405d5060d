//! Frame dispatch and fan-out
//!
//! Routing is keyed on identity and channel strings rather than raw
//! transport handles, so a reconnect (same identity, new transport) is
//! invisible to upstream event producers.

use std::sync::Arc;

use serde_json::Value;

use crate::protocol::{parse_client_frame, ClientFrame, ErrorFrame, ProtocolError, ServerFrame};
use crate::registry::{ConnectionEntry, ConnectionRegistry, OutboundFrame, SendOutcome, UserId};
use crate::stats::RelayStats;

/// Routes inbound client frames and outbound platform events
///
/// The broadcast methods are the hub's outward API: message-bus consumers
/// and other services call them directly.
#[derive(Debug)]
pub struct MessageRouter {
    registry: Arc<ConnectionRegistry>,
    stats: Arc<RelayStats>,
}

impl MessageRouter {
    /// Create a router over the given registry
    pub fn new(registry: Arc<ConnectionRegistry>, stats: Arc<RelayStats>) -> Self {
        Self { registry, stats }
    }

    /// The registry this router consults
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Process one inbound frame from `conn`.
    ///
    /// Failures are reported to the originating connection only; they never
    /// terminate it or touch any other connection.
    pub async fn handle_frame(&self, conn: &ConnectionEntry, text: &str) {
        match parse_client_frame(text) {
            Ok(ClientFrame::Subscribe { channel }) => {
                conn.subscribe(channel.clone()).await;
                tracing::debug!(
                    session_id = conn.session_id(),
                    identity = %conn.identity(),
                    channel = %channel,
                    "Subscribed"
                );
                self.respond(conn, &ServerFrame::Subscribed { channel });
            }
            Ok(ClientFrame::Unsubscribe { channel }) => {
                conn.unsubscribe(&channel).await;
                tracing::debug!(
                    session_id = conn.session_id(),
                    identity = %conn.identity(),
                    channel = %channel,
                    "Unsubscribed"
                );
                self.respond(conn, &ServerFrame::Unsubscribed { channel });
            }
            Err(e) => {
                tracing::debug!(
                    session_id = conn.session_id(),
                    error = %e,
                    "Rejected client frame"
                );
                self.respond_error(conn, e);
            }
        }
    }

    /// Report an unreadable frame to the originating connection.
    ///
    /// Used by the lifecycle manager for input that never reaches the
    /// parser, e.g. binary frames that are not valid UTF-8.
    pub fn reject_frame(&self, conn: &ConnectionEntry) {
        self.respond_error(conn, ProtocolError::InvalidFormat);
    }

    /// Deliver a market-data event to every connection subscribed to
    /// `channel` as of this call's registry snapshot.
    ///
    /// Returns the number of connections the frame was queued to. A full or
    /// closed recipient never affects delivery to the rest.
    pub async fn broadcast_market_data(&self, channel: &str, payload: Value) -> usize {
        let envelope = ServerFrame::MarketData {
            channel: channel.to_string(),
            data: payload,
        };
        let frame = match OutboundFrame::encode(&envelope) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(channel, error = %e, "Failed to encode market data");
                return 0;
            }
        };

        let mut delivered = 0;
        for conn in self.registry.snapshot().await {
            if !conn.is_subscribed(channel).await {
                continue;
            }
            match conn.send(frame.clone()) {
                SendOutcome::Queued => {
                    delivered += 1;
                    self.stats.record_delivered();
                }
                SendOutcome::Dropped => self.stats.record_dropped(),
                // Disconnected mid-broadcast; nothing to do
                SendOutcome::Closed => {}
            }
        }

        tracing::trace!(channel, delivered, "Market data broadcast");
        delivered
    }

    /// Deliver an order update to the connection currently registered for
    /// `identity`, if any.
    ///
    /// Returns false when the user has no live connection; whether that is
    /// an error is the caller's concern.
    pub async fn broadcast_order_update(&self, identity: &UserId, payload: Value) -> bool {
        let conn = match self.registry.lookup(identity).await {
            Some(conn) => conn,
            None => {
                tracing::trace!(identity = %identity, "Order update for offline user");
                return false;
            }
        };

        let frame = match OutboundFrame::encode(&ServerFrame::OrderUpdate { data: payload }) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(identity = %identity, error = %e, "Failed to encode order update");
                return false;
            }
        };

        match conn.send(frame) {
            SendOutcome::Queued => {
                self.stats.record_delivered();
                true
            }
            SendOutcome::Dropped => {
                self.stats.record_dropped();
                false
            }
            SendOutcome::Closed => false,
        }
    }

    fn respond(&self, conn: &ConnectionEntry, frame: &ServerFrame) {
        match OutboundFrame::encode(frame) {
            Ok(frame) => {
                let _ = conn.send(frame);
            }
            Err(e) => {
                tracing::error!(session_id = conn.session_id(), error = %e, "Failed to encode response");
                self.respond_error(conn, ProtocolError::InvalidFormat);
            }
        }
    }

    fn respond_error(&self, conn: &ConnectionEntry, error: ProtocolError) {
        if let Ok(frame) = OutboundFrame::encode(&ErrorFrame::from(error)) {
            let _ = conn.send(frame);
        }
    }
}
