//! Route handler modules for the natter REST API and WebSocket.

pub mod friends;
pub mod health;
pub mod messages;
pub mod websocket;
