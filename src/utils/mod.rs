mod deadline_timer;
mod scoped_timer;

pub use deadline_timer::*;
pub(crate) use scoped_timer::*;
