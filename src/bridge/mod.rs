//! The bridge: one event loop owning the connection, the rebuild tick and
//! the catalog refresh, plus a cloneable handle the host polls through.
//!
//! All remote work runs in a `JoinSet` tagged with the connection epoch and
//! is aborted when the connection drops. The feedback engine is shared with
//! the handle behind a mutex that is never held across an await.

mod command;
mod handle;
mod runtime;

pub use command::*;
pub use handle::*;
pub use runtime::*;
