//! The depth-parameterised document lifecycle engine and its bulk
//! coordinator, builder and registry.

mod builder;
mod bulk;
mod config;
mod engine;
mod registry;

pub use builder::*;
pub use bulk::*;
pub use config::*;
pub use engine::*;
pub use registry::*;
