//! branch-guard CLI library exports.
//!
//! The binary in `main.rs` only installs logging, parses arguments and maps
//! the result of [`app::execute`] to an exit status.

pub mod app;
pub mod args;
pub mod errors;
pub mod prompt;
pub mod summary;

pub use args::Cli;
