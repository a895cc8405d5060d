//! Connection lifecycle management
//!
//! A session carries one connection attempt through
//! accept → authenticate → register → serve → deregister. No connection is
//! left registered after it closes, and nothing is sent on a connection
//! that has closed.

pub mod conn;
pub mod state;

pub use conn::Session;
pub use state::{SessionPhase, SessionState};
