//! Feedback state cache.
//!
//! - [`fingerprint`] maps (identity, options) to a cache key
//! - [`FeedbackCache`] holds resolved values by fingerprint
//! - [`StalenessTracker`] records feedback-changed pushes per identity
//! - [`MissQueue`] collects lookups waiting for the rebuilder
//! - [`FeedbackEngine`] combines them behind the synchronous lookup

mod engine;
mod fingerprint;
mod miss_queue;
mod staleness;
mod store;

pub use engine::*;
pub use fingerprint::*;
pub use miss_queue::*;
pub use staleness::*;
pub use store::*;
