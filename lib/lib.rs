//! `shoutem-cli` library.

mod macros;

pub mod batch;
pub mod check;
pub mod commands;
pub mod config;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod manifest;
pub mod npm;
pub mod pack;
pub mod platform;
pub mod prompt;
pub mod publish;
pub mod registry;
pub mod session;
pub mod styles;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;

//--------------------------------------------------------------------------------------------------
// Re-Exports
//--------------------------------------------------------------------------------------------------

pub use batch::*;
pub use commands::*;
pub use constants::*;
pub use error::*;
pub use manifest::*;
pub use pack::*;
pub use registry::*;
