//! Axum router construction.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::server::handlers;
use crate::server::state::SharedState;

/// Build the complete Axum router with all API routes.
///
/// CORS is wide open: browser clients connect from arbitrary origins.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health::health_handler))
        // Messages API
        .route("/messages", get(handlers::messages::list_messages_handler))
        // Friends API
        .route(
            "/sendFriendRequest",
            post(handlers::friends::send_friend_request_handler),
        )
        .route(
            "/friendRequests/:email",
            get(handlers::friends::list_friend_requests_handler),
        )
        .route(
            "/acceptFriendRequest",
            post(handlers::friends::accept_friend_request_handler),
        )
        .route(
            "/friends/:email",
            get(handlers::friends::list_friends_handler),
        )
        // WebSocket
        .route("/ws", get(handlers::websocket::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
