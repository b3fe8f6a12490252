//! Health check endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::server::state::SharedState;

pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let state = state.lock().await;
    let body = serde_json::json!({
        "status": "ok",
        "active_connections": state.ws_clients.len(),
    });
    (StatusCode::OK, axum::Json(body))
}
