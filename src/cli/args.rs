//! CLI argument definitions using clap
//!
//! Commands:
//! - aerorelay serve [--config <path>] [--host <host>] [--port <port>]
//! - aerorelay config [--config <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// AeroRelay - A strict, self-hostable event relay for coding-agent workspaces
#[derive(Parser, Debug)]
#[command(name = "aerorelay")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the relay server
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./aerorelay.json")]
        config: PathBuf,

        /// Override the bind host
        #[arg(long)]
        host: Option<String>,

        /// Override the bind port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Print the effective configuration and exit
    Config {
        /// Path to configuration file
        #[arg(long, default_value = "./aerorelay.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
