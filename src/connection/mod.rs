//! Connection lifecycle to the remote engine.
//!
//! `Disconnected -> Connecting -> Connected -> Disconnected`. An attempt stays
//! `Connecting` until both the socket and the handshake succeeded. Every
//! attempt gets a new epoch; results carrying an older epoch are discarded. A
//! single reconnect deadline is armed only while disconnected.

mod connector;
mod manager;

pub use connector::*;
pub use manager::*;
