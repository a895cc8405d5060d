//! Realtime WebSocket fan-out relay
//!
//! `relay-rs` is the realtime hub of a trading platform: it authenticates
//! WebSocket clients, tracks per-connection channel subscriptions, and fans
//! out market-data and order-update events produced elsewhere on the
//! platform.
//!
//! # Architecture
//!
//! - [`registry`] — the identity-keyed connection table; single source of
//!   truth for "is this user connected, and through which connection".
//! - [`router`] — dispatches inbound `subscribe`/`unsubscribe` frames and
//!   exposes the two fan-out entry points,
//!   [`MessageRouter::broadcast_market_data`] and
//!   [`MessageRouter::broadcast_order_update`].
//! - [`session`] — the per-connection lifecycle:
//!   accept → authenticate → register → serve → deregister.
//! - [`auth`] — the [`IdentityVerifier`] seam; ships a JWT verifier and a
//!   static table for tests.
//!
//! # Wire protocol
//!
//! JSON text frames. Clients authenticate with a `token` query parameter on
//! the connection URL, then send
//! `{"type":"subscribe","channel":"AAPL"}` /
//! `{"type":"unsubscribe","channel":"AAPL"}`. The server acknowledges with
//! `subscribed`/`unsubscribed`, reports problems as `{"error": "..."}`, and
//! pushes `market_data` and `order_update` envelopes.
//!
//! # Example
//!
//! ```no_run
//! use relay_rs::{JwtVerifier, RelayServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> relay_rs::Result<()> {
//!     let config = ServerConfig::from_env();
//!     let verifier = JwtVerifier::new(&config.jwt_secret);
//!     let server = RelayServer::new(config, verifier);
//!
//!     // Event sources hold on to the router for fan-out:
//!     // server.router().broadcast_market_data("AAPL", payload).await;
//!
//!     server.run().await
//! }
//! ```

pub mod auth;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod stats;

pub use auth::{IdentityVerifier, JwtVerifier, StaticTokenVerifier};
pub use error::{RelayError, Result};
pub use protocol::{ClientFrame, CloseReason, ErrorFrame, ProtocolError, ServerFrame};
pub use registry::{ConnectionEntry, ConnectionRegistry, OutboundFrame, SendOutcome, UserId};
pub use router::MessageRouter;
pub use server::{RelayServer, ServerConfig};
pub use session::{Session, SessionPhase, SessionState};
pub use stats::{RelayStats, StatsSnapshot};
