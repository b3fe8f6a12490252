//! Shared utility functions for the web server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Build a plain-text response. Confirmation and error strings are part of
/// the API contract; clients match on them exactly.
pub fn text_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, message.into()).into_response()
}
