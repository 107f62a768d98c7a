//! tooldex server - MCP bridge to tmux panes
//!
//! Speaks MCP over stdin/stdout; logs go to a file so the stream stays clean.

use std::sync::Arc;

use tracing::{error, info};

use tooldex_utils::{LogConfig, Result, TooldexError};

mod config;
mod gateway;
mod hub;
mod maintenance;
mod mcp;
mod pane;
mod state;
mod subscription;

use config::{ConfigLoader, DEFAULT_CONFIG_TOML};
use gateway::TmuxGateway;
use hub::PaneHub;
use mcp::McpServer;

fn print_usage() {
    println!(
        "tooldex-server {}\n\n\
         Usage: tooldex-server [--print-config | --version | --help]\n\n\
         With no arguments, serves MCP on stdin/stdout.\n\
         Configuration is read from $TOOLDEX_CONFIG or the XDG config directory.\n\
         Set TOOLDEX_LOG_STDERR to log to stderr instead of the log file.",
        env!("CARGO_PKG_VERSION")
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("--print-config") => {
            print!("{}", DEFAULT_CONFIG_TOML);
            return Ok(());
        }
        Some("--version") | Some("-V") => {
            println!("tooldex-server {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some("--help") | Some("-h") => {
            print_usage();
            return Ok(());
        }
        Some(other) => {
            return Err(TooldexError::InvalidArgument(format!("unknown argument {:?}", other)));
        }
        None => {}
    }

    // Debug logging to stderr leaves the MCP stream on stdout untouched
    let log_config = if std::env::var_os("TOOLDEX_LOG_STDERR").is_some() {
        LogConfig::development()
    } else {
        LogConfig::server()
    };
    tooldex_utils::init_logging_with_config(log_config)?;

    let config = ConfigLoader::load_and_validate().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    let gateway = Arc::new(TmuxGateway::new(&config.tmux));
    let hub = Arc::new(PaneHub::new(gateway, &config));

    if let Some(locator) = config.registry.origin_locator() {
        hub.detect_origin(&locator).await;
    } else {
        info!("no origin pane configured; the primary alias needs an explicit attach");
    }

    let server = Arc::new(McpServer::new(hub));
    server.run().await.map_err(|e| {
        error!("MCP server failed: {}", e);
        TooldexError::internal(e.to_string())
    })
}
