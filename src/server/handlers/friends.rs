//! Friend request and friend list handlers.
//!
//! Mutating endpoints answer with short plain-text confirmations; list
//! endpoints answer with JSON arrays straight from storage.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::server::state::SharedState;
use crate::server::utils::text_response;
use crate::social::{self, SocialError};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendFriendRequestPayload {
    pub sender_email: String,
    pub receiver_email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptFriendRequestPayload {
    pub user_email: String,
    pub friend_email: String,
}

/// `POST /sendFriendRequest`
pub async fn send_friend_request_handler(
    State(state): State<SharedState>,
    axum::Json(req): axum::Json<SendFriendRequestPayload>,
) -> Response {
    let st = state.lock().await;
    match social::send_friend_request(&st.storage, &req.sender_email, &req.receiver_email) {
        Ok(row) => {
            crate::nlog!(
                "friends: request {} from {} to {}",
                row.id,
                crate::logging::ident(&req.sender_email),
                crate::logging::ident(&req.receiver_email)
            );
            text_response(StatusCode::OK, "Friend request sent.")
        }
        Err(SocialError::SelfRequest) => {
            text_response(StatusCode::BAD_REQUEST, "Cannot add yourself as a friend.")
        }
        Err(SocialError::DuplicateRequest) => {
            text_response(StatusCode::BAD_REQUEST, "Friend request already sent.")
        }
        Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// `GET /friendRequests/:email`
///
/// Pending requests addressed to `email`, oldest first.
pub async fn list_friend_requests_handler(
    State(state): State<SharedState>,
    Path(email): Path<String>,
) -> Response {
    let st = state.lock().await;
    match social::list_pending_requests(&st.storage, &email) {
        Ok(requests) => (StatusCode::OK, axum::Json(requests)).into_response(),
        Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// `POST /acceptFriendRequest`
pub async fn accept_friend_request_handler(
    State(state): State<SharedState>,
    axum::Json(req): axum::Json<AcceptFriendRequestPayload>,
) -> Response {
    let st = state.lock().await;
    match social::accept_friend_request(&st.storage, &req.user_email, &req.friend_email) {
        Ok(()) => {
            crate::nlog!(
                "friends: {} accepted {}",
                crate::logging::ident(&req.user_email),
                crate::logging::ident(&req.friend_email)
            );
            text_response(StatusCode::OK, "Friend request accepted.")
        }
        Err(SocialError::RequestNotFound) => {
            text_response(StatusCode::BAD_REQUEST, "Friend request not found.")
        }
        Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// `GET /friends/:email`
///
/// Confirmed friends of `email`, oldest friendship first.
pub async fn list_friends_handler(
    State(state): State<SharedState>,
    Path(email): Path<String>,
) -> Response {
    let st = state.lock().await;
    match social::list_friends(&st.storage, &email) {
        Ok(friends) => (StatusCode::OK, axum::Json(friends)).into_response(),
        Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
