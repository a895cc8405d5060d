//! Wire protocol for the relay
//!
//! All traffic is JSON-encoded text frames. Clients send `subscribe` /
//! `unsubscribe` requests; the server answers with acknowledgements or an
//! `{"error": ...}` frame, and pushes `market_data` / `order_update`
//! envelopes produced by the fan-out paths.

pub mod frame;
pub mod handshake;

pub use frame::{
    parse_client_frame, ClientFrame, CloseReason, ErrorFrame, ProtocolError, ServerFrame,
};
pub use handshake::extract_token;
