//! Conversation history endpoint.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::chat;
use crate::server::state::SharedState;
use crate::server::utils::text_response;

#[derive(Deserialize)]
pub struct ConversationQuery {
    pub sender: String,
    pub receiver: String,
}

/// `GET /messages?sender=A&receiver=B`
///
/// Returns every message exchanged between the two identities, oldest first.
/// The pair is unordered: either party may appear as `sender`.
pub async fn list_messages_handler(
    State(state): State<SharedState>,
    Query(query): Query<ConversationQuery>,
) -> Response {
    let st = state.lock().await;
    match chat::conversation_between(&st.storage, &query.sender, &query.receiver) {
        Ok(messages) => (StatusCode::OK, axum::Json(messages)).into_response(),
        Err(e) => {
            crate::nlog!("messages: failed to fetch conversation: {}", e);
            text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error fetching messages.",
            )
        }
    }
}
