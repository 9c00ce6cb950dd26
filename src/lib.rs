//! Feedback state cache bridge between a control-surface host and a remote
//! creative-automation engine.
//!
//! The host polls feedback values synchronously through a [`BridgeHandle`];
//! the [`Bridge`] event loop keeps the cache populated over a persistent RPC
//! connection, reacts to push notifications and reconnects on failure.

mod bridge;
mod cache;
mod compositor;
mod config;
mod connection;
pub mod constants;
mod errors;
mod feedback;
mod host;
mod metrics;
mod rebuilder;
mod rpc;
pub mod utils;

pub use bridge::*;
pub use cache::*;
pub use compositor::*;
pub use config::*;
pub use connection::*;
pub use errors::*;
pub use feedback::*;
pub use host::*;
pub use metrics::*;
pub use rebuilder::*;
pub use rpc::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
