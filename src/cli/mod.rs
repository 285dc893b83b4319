//! CLI module for AeroRelay
//!
//! Provides the command-line interface:
//! - serve: boot the relay and enter the serving loop
//! - config: print the effective configuration

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{run, run_command};
pub use errors::{CliError, CliResult};
