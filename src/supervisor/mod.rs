//! Supervisor module: the coordination core and its event loop.

mod core;
mod event;
mod runner;
mod state;

pub use self::core::*;
pub use event::*;
pub use runner::*;
pub use state::*;
