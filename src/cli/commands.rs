//! CLI command implementations
//!
//! The composition root: the aggregator, settings store and HTTP server
//! are constructed here with explicit lifecycles and wired together.

use std::path::Path;
use std::sync::Arc;

use crate::http_server::{HttpServer, HttpServerConfig};
use crate::observability::{Logger, Severity};
use crate::relay::Aggregator;
use crate::settings::MemorySettingsStore;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};

/// Parse arguments and dispatch to the selected command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}

/// Dispatch a parsed command
pub fn run_command(command: Command) -> CliResult<()> {
    match command {
        Command::Serve { config, host, port } => {
            let mut server_config = load_config(&config)?;
            if let Some(host) = host {
                server_config.host = host;
            }
            if let Some(port) = port {
                server_config.port = port;
            }
            serve(server_config)
        }
        Command::Config { config } => {
            let server_config = load_config(&config)?;
            let rendered = serde_json::to_string_pretty(&server_config)
                .map_err(|e| CliError::config_error(e.to_string()))?;
            println!("{}", rendered);
            Ok(())
        }
    }
}

/// Load configuration; a missing file means defaults apply
fn load_config(path: &Path) -> CliResult<HttpServerConfig> {
    if !path.exists() {
        return Ok(HttpServerConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| CliError::config_error(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| CliError::config_error(format!("{}: {}", path.display(), e)))
}

/// Boot the relay and serve until the process is stopped
fn serve(config: HttpServerConfig) -> CliResult<()> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::serve_failed(format!("runtime: {}", e)))?;

    let aggregator = Arc::new(Aggregator::new());
    let settings = Arc::new(MemorySettingsStore::new());

    let addr = config.socket_addr();
    Logger::log(Severity::Info, "cli.serve.boot", &[("addr", addr.as_str())]);

    let server = HttpServer::new(config, aggregator, settings);
    runtime
        .block_on(server.start())
        .map_err(|e| CliError::serve_failed(e.to_string()))
}
