//! Common types, constants, and utilities shared by every nestdoc module.

mod constants;
mod options;
mod value;
mod util;

pub use constants::*;
pub use options::*;
pub use util::*;
pub use value::*;
