//! Message persistence and conversation reads.
//!
//! A message arrives as a [`MessageDraft`], usually parsed straight from a
//! websocket payload. Persisting the draft stamps the defaults the client
//! left out (arrival time, `sent` status) and returns the canonical stored
//! row, which is what gets broadcast back out. Conversations are the full
//! two-way history between a pair of identities.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::storage::{MessageRow, MessageStatus, Storage, StorageError};

/// Incoming message before persistence. `timestamp` and `status` are
/// optional; missing values are stamped when the draft is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDraft {
    pub sender: String,
    pub receiver: String,
    pub body: String,
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub status: Option<MessageStatus>,
}

/// Milliseconds since the UNIX epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Persist a draft, filling in any missing timestamp and status, and return
/// the stored row with its assigned id.
pub fn persist_message(storage: &Storage, draft: MessageDraft) -> Result<MessageRow, StorageError> {
    let mut row = MessageRow {
        id: 0,
        sender: draft.sender,
        receiver: draft.receiver,
        body: draft.body,
        timestamp: draft.timestamp.unwrap_or_else(now_millis),
        status: draft.status.unwrap_or(MessageStatus::Sent),
    };
    row.id = storage.insert_message(&row)?;
    Ok(row)
}

/// Fetch the full conversation between two identities, oldest first. Both
/// orderings of the pair name the same conversation.
pub fn conversation_between(
    storage: &Storage,
    a: &str,
    b: &str,
) -> Result<Vec<MessageRow>, StorageError> {
    storage.list_conversation(a, b)
}
