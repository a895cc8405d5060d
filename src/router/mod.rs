//! Message routing
//!
//! The router is the dispatch layer between the wire and the registry:
//! inbound client frames mutate the originating connection's subscription
//! set, and the two outbound entry points fan events out to whatever
//! connections the registry holds at call time.

pub mod dispatch;

pub use dispatch::MessageRouter;
