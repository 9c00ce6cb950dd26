//! Test components shared by the unit tests: an in-process remote engine,
//! a host that records every callback, and small helpers.
mod common;
mod fake_engine;
mod recording_host;

pub use common::*;
pub use fake_engine::*;
pub use recording_host::*;
