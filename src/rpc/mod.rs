//! RPC gateway to the remote engine.
//!
//! Newline-delimited JSON frames over one socket. Each call is its own
//! future matched by request id; push notifications are forwarded as
//! [`RpcEvent`]s to whoever owns the connection.

mod calls;
mod client;
mod message;
mod push;

pub use calls::*;
pub use client::*;
pub use message::*;
pub use push::*;
