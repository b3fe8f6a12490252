//! Shared application state and WebSocket event types.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, Mutex};

use crate::chat::MessageDraft;
use crate::server::config::WS_CHANNEL_CAPACITY;
use crate::storage::{MessageRow, Storage};

/// Events received from WebSocket clients.
///
/// Wire form: `{"event": "sendMessage", "data": {...}}`. Payloads with an
/// unrecognized event name fail to parse and are dropped by the connection
/// loop.
#[derive(Debug, serde::Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "sendMessage")]
    SendMessage(MessageDraft),
}

/// Events broadcast to connected WebSocket clients.
///
/// Wire form: `{"event": "receiveMessage", "data": {...}}` where the data is
/// the canonical persisted message, ids and defaults included.
#[derive(Clone, Debug, serde::Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "receiveMessage")]
    ReceiveMessage(MessageRow),
}

/// Bookkeeping for one live WebSocket connection.
pub struct ConnectionInfo {
    pub connected_at: Instant,
}

pub struct AppState {
    pub storage: Storage,
    pub ws_tx: broadcast::Sender<ServerEvent>,
    pub ws_clients: HashMap<u64, ConnectionInfo>,
    pub next_conn_id: u64,
}

pub type SharedState = Arc<Mutex<AppState>>;

impl AppState {
    /// Create shared state around an open database.
    pub fn new(storage: Storage) -> SharedState {
        let (ws_tx, _) = broadcast::channel(WS_CHANNEL_CAPACITY);
        Arc::new(Mutex::new(AppState {
            storage,
            ws_tx,
            ws_clients: HashMap::new(),
            next_conn_id: 0,
        }))
    }
}
