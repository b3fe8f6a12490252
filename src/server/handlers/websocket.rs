//! WebSocket upgrade and the persist-then-broadcast pipeline.
//!
//! Every connection subscribes to the shared broadcast channel. An inbound
//! `sendMessage` event is persisted first; only the canonical stored row is
//! fanned out, as a `receiveMessage` event to every active connection
//! (including the sender). Delivery is not scoped to the message's receiver.

use std::time::Instant;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use tokio::sync::broadcast;

use crate::chat;
use crate::server::state::{ClientEvent, ConnectionInfo, ServerEvent, SharedState};

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> Response {
    ws.on_upgrade(|socket| ws_connection(socket, state))
}

async fn ws_connection(mut socket: WebSocket, state: SharedState) {
    // Subscribe to the broadcast channel and register the connection
    let (mut rx, conn_id) = {
        let mut st = state.lock().await;
        let rx = st.ws_tx.subscribe();
        let id = st.next_conn_id;
        st.next_conn_id += 1;
        st.ws_clients.insert(
            id,
            ConnectionInfo {
                connected_at: Instant::now(),
            },
        );
        crate::nlog!("ws: client {} connected ({} active)", id, st.ws_clients.len());
        (rx, id)
    };

    loop {
        tokio::select! {
            // Forward broadcast events to the WebSocket client
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if let Ok(json) = serde_json::to_string(&event) {
                            if socket.send(WsMessage::Text(json)).await.is_err() {
                                break; // client disconnected
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        crate::nlog!("ws: client {} lagged, skipped {} event(s)", conn_id, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            // Handle incoming events from the client
            msg = socket.recv() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        handle_client_event(&state, &text).await;
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        if socket.send(WsMessage::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }

    // Deregister on disconnect
    {
        let mut st = state.lock().await;
        if let Some(info) = st.ws_clients.remove(&conn_id) {
            crate::nlog!(
                "ws: client {} disconnected after {}s ({} active)",
                conn_id,
                info.connected_at.elapsed().as_secs(),
                st.ws_clients.len()
            );
        }
    }
}

/// Parse and apply one client event.
///
/// Unrecognized payloads are dropped. Persistence failures are logged and
/// dropped too: the sender gets no error reply and nothing is broadcast, so
/// a message is only ever announced after it is durably stored.
async fn handle_client_event(state: &SharedState, text: &str) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(_) => return,
    };

    match event {
        ClientEvent::SendMessage(draft) => {
            let st = state.lock().await;
            match chat::persist_message(&st.storage, draft) {
                Ok(message) => {
                    let id = message.id;
                    let receivers = st
                        .ws_tx
                        .send(ServerEvent::ReceiveMessage(message))
                        .unwrap_or(0);
                    crate::nlog!("ws: message {} broadcast to {} client(s)", id, receivers);
                }
                Err(e) => {
                    crate::nlog!("ws: failed to persist message: {}", e);
                }
            }
        }
    }
}
