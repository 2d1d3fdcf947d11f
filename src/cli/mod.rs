//! Command-line interface
//!
//! Argument parsing for the directory, store and node processes and for the
//! user-side commands.

pub mod commands;

pub use commands::{Command, Opt};
