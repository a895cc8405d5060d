//! Session state machine
//!
//! Tracks one connection attempt from transport accept to its terminal
//! state. The transition table is the authoritative contract; the I/O
//! driver in `conn` only walks it.

use std::net::SocketAddr;
use std::time::Instant;

use crate::registry::UserId;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Transport accepted, WebSocket handshake not complete
    Connecting,
    /// Handshake complete, credential being verified
    Authenticating,
    /// Identity verified, connection registered, frames flowing
    Active,
    /// Credential missing or invalid; never reached the registry. Terminal.
    Rejected,
    /// Connection finished and deregistered. Terminal.
    Closed,
}

/// Complete per-session state
#[derive(Debug)]
pub struct SessionState {
    /// Unique session ID
    pub id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Current phase
    pub phase: SessionPhase,

    /// When the transport was accepted
    pub connected_at: Instant,

    /// When authentication completed
    pub authenticated_at: Option<Instant>,

    /// Authenticated identity; set once, never reassigned
    pub identity: Option<UserId>,

    /// Inbound frames processed
    pub frames_received: u64,
}

impl SessionState {
    /// Create state for a freshly accepted transport
    pub fn new(id: u64, peer_addr: SocketAddr) -> Self {
        Self {
            id,
            peer_addr,
            phase: SessionPhase::Connecting,
            connected_at: Instant::now(),
            authenticated_at: None,
            identity: None,
            frames_received: 0,
        }
    }

    /// Handshake finished; credential verification begins
    pub fn start_authentication(&mut self) {
        if self.phase == SessionPhase::Connecting {
            self.phase = SessionPhase::Authenticating;
        }
    }

    /// Verification succeeded; the connection is being registered
    pub fn activate(&mut self, identity: UserId) {
        if self.phase == SessionPhase::Authenticating {
            self.identity = Some(identity);
            self.authenticated_at = Some(Instant::now());
            self.phase = SessionPhase::Active;
        }
    }

    /// Reject the attempt before it reaches the registry
    pub fn reject(&mut self) {
        if matches!(
            self.phase,
            SessionPhase::Connecting | SessionPhase::Authenticating
        ) {
            self.phase = SessionPhase::Rejected;
        }
    }

    /// The active connection has ended
    pub fn close(&mut self) {
        if self.phase == SessionPhase::Active {
            self.phase = SessionPhase::Closed;
        }
    }

    /// Count one processed inbound frame
    pub fn on_frame(&mut self) {
        self.frames_received += 1;
    }

    /// Whether the session is serving frames
    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    /// Time since the transport was accepted
    pub fn duration(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }
}
