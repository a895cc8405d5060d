//! Fan-out frame types and the identity routing key

use bytes::Bytes;
use serde::Serialize;

use crate::protocol::CloseReason;

/// Authenticated user identity used to key the registry
///
/// Opaque to the relay; whatever the identity verifier resolves a credential
/// to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
    /// Create a new identity key
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identity as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A frame queued for one connection's writer task
///
/// `Data` payloads are cheap to clone: the JSON is serialized once and the
/// `Bytes` handle is reference-counted across recipients.
#[derive(Debug, Clone)]
pub enum OutboundFrame {
    /// Pre-serialized JSON text
    Data(Bytes),
    /// Pong reply carrying the ping payload back
    Pong(Bytes),
    /// Close the transport with the given reason, then stop writing
    Close(CloseReason),
}

impl OutboundFrame {
    /// Serialize a frame once for delivery to any number of recipients.
    pub fn encode<T: Serialize>(frame: &T) -> serde_json::Result<Self> {
        Ok(Self::Data(Bytes::from(serde_json::to_vec(frame)?)))
    }
}
