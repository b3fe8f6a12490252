//! Configuration types and constants for the natter server.

use std::path::PathBuf;

use clap::Parser;

pub(crate) const WS_CHANNEL_CAPACITY: usize = 256;

/// Messaging server with durable chat history and a friend graph.
///
/// Exposes a REST API for conversation history and friend management plus a
/// WebSocket endpoint for live chat, persisting everything in SQLite.
///
/// Configuration can be set via CLI arguments or environment variables.
/// CLI arguments take precedence over environment variables.
#[derive(Parser, Debug)]
#[command(name = "natter", version, about)]
pub struct Cli {
    /// HTTP server bind address [env: NATTER_BIND] [default: 127.0.0.1:5001]
    #[arg(long, short = 'b')]
    pub bind: Option<String>,

    /// Data directory for the database [env: NATTER_HOME] [default: ~/.natter]
    #[arg(long, short = 'd')]
    pub data_dir: Option<PathBuf>,
}

pub struct Config {
    pub bind_addr: String,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn from_cli_and_env(cli: Cli) -> Self {
        let data_dir = cli
            .data_dir
            .or_else(|| std::env::var("NATTER_HOME").ok().map(PathBuf::from))
            .unwrap_or_else(|| {
                std::env::var("HOME")
                    .map(|h| PathBuf::from(h).join(".natter"))
                    .unwrap_or_else(|_| PathBuf::from(".natter"))
            });

        let bind_addr = cli
            .bind
            .or_else(|| std::env::var("NATTER_BIND").ok())
            .unwrap_or_else(|| "127.0.0.1:5001".to_string());

        Self {
            bind_addr,
            data_dir,
        }
    }
}
