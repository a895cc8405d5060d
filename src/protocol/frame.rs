//! Client and server frame types
//!
//! Inbound frames are parsed leniently: the error reported to the client
//! distinguishes unparseable input, an unrecognized `type`, and a missing
//! `channel`, and is always scoped to the originating connection.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;

/// A validated client request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// Add a channel to the connection's subscription set
    Subscribe { channel: String },
    /// Remove a channel from the connection's subscription set
    Unsubscribe { channel: String },
}

/// Why an inbound frame was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame was not parseable JSON
    InvalidFormat,
    /// The `type` field was missing or not a recognized request
    UnknownType,
    /// A subscribe/unsubscribe request without a non-empty `channel`
    ChannelMissing,
}

impl ProtocolError {
    /// The message reported back to the client, verbatim on the wire.
    pub fn message(&self) -> &'static str {
        match self {
            ProtocolError::InvalidFormat => "Invalid message format",
            ProtocolError::UnknownType => "Unknown message type",
            ProtocolError::ChannelMissing => "Channel not specified",
        }
    }
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for ProtocolError {}

/// Parse one inbound text frame into a [`ClientFrame`].
///
/// Validation order matches the dispatch contract: parse failure first, then
/// the `type` tag, then the `channel` field (which must be a non-empty
/// string).
pub fn parse_client_frame(text: &str) -> Result<ClientFrame, ProtocolError> {
    let value: Value = serde_json::from_str(text).map_err(|_| ProtocolError::InvalidFormat)?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::UnknownType)?;

    match kind {
        "subscribe" => Ok(ClientFrame::Subscribe {
            channel: required_channel(&value)?,
        }),
        "unsubscribe" => Ok(ClientFrame::Unsubscribe {
            channel: required_channel(&value)?,
        }),
        _ => Err(ProtocolError::UnknownType),
    }
}

fn required_channel(value: &Value) -> Result<String, ProtocolError> {
    match value.get("channel").and_then(Value::as_str) {
        Some(channel) if !channel.is_empty() => Ok(channel.to_string()),
        _ => Err(ProtocolError::ChannelMissing),
    }
}

/// Server-to-client envelopes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Subscription acknowledged
    Subscribed { channel: String },
    /// Unsubscription acknowledged
    Unsubscribed { channel: String },
    /// Market data fan-out for one channel
    MarketData { channel: String, data: Value },
    /// Order update unicast to one user
    OrderUpdate { data: Value },
}

/// Error response sent only to the originating connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorFrame {
    pub error: String,
}

impl ErrorFrame {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

impl From<ProtocolError> for ErrorFrame {
    fn from(e: ProtocolError) -> Self {
        Self::new(e.message())
    }
}

/// Why a transport is being closed
///
/// Each reason maps to a fixed close code and reason text so clients can
/// tell a policy rejection from a server fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// No credential supplied in the handshake
    AuthenticationRequired,
    /// Credential supplied but the verifier rejected it
    InvalidToken,
    /// Unexpected failure while completing the handshake
    InternalError,
    /// A newer connection authenticated as the same identity
    Replaced,
    /// Server-initiated disconnect
    Terminated,
}

impl CloseReason {
    /// WebSocket close code (1008 policy violation, 1011 internal error,
    /// 1000 normal closure).
    pub fn code(&self) -> CloseCode {
        match self {
            CloseReason::AuthenticationRequired | CloseReason::InvalidToken => CloseCode::Policy,
            CloseReason::InternalError => CloseCode::Error,
            CloseReason::Replaced | CloseReason::Terminated => CloseCode::Normal,
        }
    }

    /// Reason text carried in the close frame.
    pub fn text(&self) -> &'static str {
        match self {
            CloseReason::AuthenticationRequired => "Authentication required",
            CloseReason::InvalidToken => "Invalid token",
            CloseReason::InternalError => "Internal server error",
            CloseReason::Replaced => "Replaced by new connection",
            CloseReason::Terminated => "Connection closed by server",
        }
    }

    /// Build the close frame for this reason.
    pub fn frame(&self) -> CloseFrame<'static> {
        CloseFrame {
            code: self.code(),
            reason: self.text().into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_subscribe() {
        let frame = parse_client_frame(r#"{"type":"subscribe","channel":"AAPL"}"#).unwrap();
        assert_eq!(
            frame,
            ClientFrame::Subscribe {
                channel: "AAPL".to_string()
            }
        );
    }

    #[test]
    fn test_parse_unsubscribe() {
        let frame = parse_client_frame(r#"{"type":"unsubscribe","channel":"TSLA"}"#).unwrap();
        assert_eq!(
            frame,
            ClientFrame::Unsubscribe {
                channel: "TSLA".to_string()
            }
        );
    }

    #[test]
    fn test_parse_missing_channel() {
        let err = parse_client_frame(r#"{"type":"subscribe"}"#).unwrap_err();
        assert_eq!(err, ProtocolError::ChannelMissing);
        assert_eq!(err.message(), "Channel not specified");
    }

    #[test]
    fn test_parse_empty_channel() {
        let err = parse_client_frame(r#"{"type":"subscribe","channel":""}"#).unwrap_err();
        assert_eq!(err, ProtocolError::ChannelMissing);
    }

    #[test]
    fn test_parse_non_string_channel() {
        let err = parse_client_frame(r#"{"type":"unsubscribe","channel":42}"#).unwrap_err();
        assert_eq!(err, ProtocolError::ChannelMissing);
    }

    #[test]
    fn test_parse_unknown_type() {
        let err = parse_client_frame(r#"{"type":"order","channel":"AAPL"}"#).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownType);
        assert_eq!(err.message(), "Unknown message type");
    }

    #[test]
    fn test_parse_missing_type() {
        let err = parse_client_frame(r#"{"channel":"AAPL"}"#).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownType);
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = parse_client_frame("not json at all").unwrap_err();
        assert_eq!(err, ProtocolError::InvalidFormat);
        assert_eq!(err.message(), "Invalid message format");
    }

    #[test]
    fn test_market_data_envelope() {
        let frame = ServerFrame::MarketData {
            channel: "AAPL".to_string(),
            data: json!({"price": 150}),
        };
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"type": "market_data", "channel": "AAPL", "data": {"price": 150}})
        );
    }

    #[test]
    fn test_order_update_envelope() {
        let frame = ServerFrame::OrderUpdate {
            data: json!({"orderId": "o-1", "status": "FILLED"}),
        };
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"type": "order_update", "data": {"orderId": "o-1", "status": "FILLED"}})
        );
    }

    #[test]
    fn test_ack_envelopes() {
        let frame = ServerFrame::Subscribed {
            channel: "AAPL".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"type": "subscribed", "channel": "AAPL"})
        );

        let frame = ServerFrame::Unsubscribed {
            channel: "AAPL".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"type": "unsubscribed", "channel": "AAPL"})
        );
    }

    #[test]
    fn test_error_frame_shape() {
        let frame = ErrorFrame::from(ProtocolError::ChannelMissing);
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"error": "Channel not specified"})
        );
    }

    #[test]
    fn test_close_reason_codes() {
        assert_eq!(u16::from(CloseReason::AuthenticationRequired.code()), 1008);
        assert_eq!(u16::from(CloseReason::InvalidToken.code()), 1008);
        assert_eq!(u16::from(CloseReason::InternalError.code()), 1011);
        assert_eq!(u16::from(CloseReason::Replaced.code()), 1000);
        assert_eq!(
            CloseReason::AuthenticationRequired.frame().reason,
            "Authentication required"
        );
    }
}
