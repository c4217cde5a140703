//! The validator interface consulted before every create and update, with a
//! pass-through implementation and a field-rule schema implementation.

mod schema;
mod validator;

pub use schema::*;
pub use validator::*;
