//! Storage path addressing for documents nested up to three levels deep.
//!
//! A service declares its [TypePath] once; every operation then turns its
//! parent identifiers and target identifier into a [NestingPath] and asks it
//! for the dotted repository path of the document, one of its fields, the
//! collection holding it, or its parent document.

mod document_id;
mod nesting_path;
mod type_path;

pub use document_id::*;
pub use nesting_path::*;
pub use type_path::*;
