//! Command line interface module
//!
//! Argument parsing and the runner that turns a parsed command into registry
//! calls.

pub mod args;
pub mod runner;

pub use args::{Args, Command, ImagesCommand};
pub use runner::Runner;
