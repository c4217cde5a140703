//! Extension points around every mutation.
//!
//! Two independent mechanisms are involved. Callbacks are always invoked and
//! may transform the in-flight subject. Events are fire-and-forget and are
//! skipped, payload and all, when nobody listens.

mod callback;
mod event;
mod pipeline;
mod stage;

pub use callback::*;
pub use event::*;
pub use pipeline::*;
pub use stage::*;
