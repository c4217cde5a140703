//! In-memory query evaluation over documents.
//!
//! Nested collections come back from the repository as whole maps, so the
//! engine filters, sorts and paginates them itself. The same evaluator backs
//! [crate::store::MemoryRepository] for root documents.

mod cast;
mod criteria;
mod evaluator;
mod fields;
mod find_options;
mod sort;

pub use cast::*;
pub use criteria::*;
pub use evaluator::*;
pub use fields::*;
pub use find_options::*;
pub use sort::*;
