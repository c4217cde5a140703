//! The repository interface the lifecycle engine writes through, plus two
//! implementations: an in-memory store and a volatile one discarding writes.
//!
//! Repositories address values by dotted paths built in [crate::path]. The
//! first segment is the id of a root document, the rest is a field path
//! inside it.

mod memory;
mod repository;
mod volatile;

pub use memory::*;
pub use repository::*;
pub use volatile::*;
