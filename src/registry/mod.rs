//! Connection registry for identity-keyed routing
//!
//! The registry is the single source of truth for which users are connected
//! and through which connection. Fan-out addresses users and channels, never
//! raw transports, so a reconnecting client is transparent to event
//! producers.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<ConnectionRegistry>
//!                  ┌─────────────────────────────┐
//!                  │ connections: HashMap<       │
//!                  │   UserId,                   │
//!                  │   Arc<ConnectionEntry {     │
//!                  │     subscriptions,          │
//!                  │     tx: mpsc::Sender,       │
//!                  │   }>                        │
//!                  │ >                           │
//!                  └──────────────┬──────────────┘
//!                                 │
//!          ┌──────────────────────┼──────────────────────┐
//!          │                      │                      │
//!          ▼                      ▼                      ▼
//!     [Session u1]           [Session u2]           [Session u3]
//!     read loop              read loop              read loop
//!          ▲                      ▲                      ▲
//!          └── router.broadcast_market_data() ──► entry.send() ──► writer
//! ```
//!
//! # Zero-Copy Design
//!
//! Outbound payloads are serialized once per broadcast into `bytes::Bytes`;
//! every recipient's queue holds a reference-counted handle to the same
//! allocation, not a copy.

pub mod entry;
pub mod frame;
pub mod store;

pub use entry::{ConnectionEntry, SendOutcome};
pub use frame::{OutboundFrame, UserId};
pub use store::ConnectionRegistry;
