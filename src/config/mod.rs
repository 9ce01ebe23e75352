//! Configuration module.

mod loader;
mod provision;
mod types;

pub use loader::*;
pub use provision::*;
pub use types::*;
