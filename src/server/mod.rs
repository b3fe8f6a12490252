//! natter server: REST API + WebSocket chat backend.
//!
//! Persists messages and the friend graph in SQLite and fans live chat out
//! to every connected WebSocket client.

pub mod config;
pub mod handlers;
pub mod router;
pub mod state;
pub mod utils;

use clap::Parser;

use crate::storage::{db_path, Storage};

use config::{Cli, Config};
use state::AppState;

/// Entry point: parse CLI, open storage, start server.
pub async fn run() {
    let cli = Cli::parse();
    let config = Config::from_cli_and_env(cli);

    crate::logging::init();

    crate::nlog!("natter starting");
    crate::nlog!("  data directory: {}", config.data_dir.display());

    let database = db_path(&config.data_dir);
    let storage = Storage::open(&database).expect("failed to open database");
    crate::nlog!("  database: {}", database.display());

    let state = AppState::new(storage);

    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind");
    crate::nlog!("natter listening on http://{}", config.bind_addr);

    axum::serve(listener, app).await.expect("server error");
}
