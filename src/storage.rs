//! SQLite storage layer for natter.
//!
//! Owns the single database that holds all three record collections:
//! chat messages, friend requests, and friendship edges. Handles schema
//! creation and the per-collection CRUD operations. Higher-level rules
//! (duplicate suppression, edge symmetry, default stamping) live in the
//! [`social`][crate::social] and [`chat`][crate::chat] modules; this layer
//! only reads and writes rows.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum StorageError {
    Sqlite(rusqlite::Error),
    Io(std::io::Error),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Sqlite(e) => write!(f, "sqlite error: {e}"),
            StorageError::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        StorageError::Sqlite(e)
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// Delivery status of a stored message. The pipeline only ever records
/// `sent`; the value exists as its own type so the wire form stays closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
        }
    }
}

impl std::str::FromStr for MessageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(MessageStatus::Sent),
            _ => Err(format!("invalid message status: {s}")),
        }
    }
}

/// Lifecycle status of a friend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
        }
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "accepted" => Ok(RequestStatus::Accepted),
            _ => Err(format!("invalid request status: {s}")),
        }
    }
}

/// Chat message row. Field names double as the JSON wire form.
/// Timestamps are milliseconds since the UNIX epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: i64,
    pub sender: String,
    pub receiver: String,
    pub body: String,
    pub timestamp: u64,
    pub status: MessageStatus,
}

/// Friend request row. Serializes with the camelCase field names clients
/// expect (`senderEmail`, `receiverEmail`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestRow {
    pub id: i64,
    pub sender_email: String,
    pub receiver_email: String,
    pub status: RequestStatus,
}

/// One direction of a friendship. Confirmed friendships are stored as two
/// of these, one per direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRow {
    pub id: i64,
    pub user_email: String,
    pub friend_email: String,
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open or create a database at the given path. Creates the parent
    /// directory and schema if needed.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let storage = Self { conn };
        storage.create_schema()?;
        Ok(storage)
    }

    /// Create an in-memory database. Used by tests.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let storage = Self { conn };
        storage.create_schema()?;
        Ok(storage)
    }

    fn create_schema(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS messages (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                sender    TEXT NOT NULL,
                receiver  TEXT NOT NULL,
                body      TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                status    TEXT NOT NULL DEFAULT 'sent'
            );

            CREATE INDEX IF NOT EXISTS idx_messages_sender
                ON messages(sender, receiver, timestamp);
            CREATE INDEX IF NOT EXISTS idx_messages_receiver
                ON messages(receiver, sender, timestamp);

            CREATE TABLE IF NOT EXISTS friend_requests (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                sender_email   TEXT NOT NULL,
                receiver_email TEXT NOT NULL,
                status         TEXT NOT NULL DEFAULT 'pending'
            );

            CREATE INDEX IF NOT EXISTS idx_friend_requests_receiver
                ON friend_requests(receiver_email, status);
            CREATE INDEX IF NOT EXISTS idx_friend_requests_pair
                ON friend_requests(sender_email, receiver_email);

            CREATE TABLE IF NOT EXISTS friends (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                user_email   TEXT NOT NULL,
                friend_email TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_friends_user
                ON friends(user_email);
            ",
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Messages
    // -----------------------------------------------------------------------

    /// Insert a message row. The row's `id` is ignored; the generated id is
    /// returned.
    pub fn insert_message(&self, row: &MessageRow) -> Result<i64, StorageError> {
        self.conn.execute(
            "INSERT INTO messages (sender, receiver, body, timestamp, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                row.sender,
                row.receiver,
                row.body,
                row.timestamp as i64,
                row.status.as_str(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// List every message exchanged between two identities in either
    /// direction, ascending by timestamp. Insertion order breaks ties so
    /// the result is stable for same-millisecond messages.
    pub fn list_conversation(&self, a: &str, b: &str) -> Result<Vec<MessageRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, sender, receiver, body, timestamp, status
             FROM messages
             WHERE (sender = ?1 AND receiver = ?2)
                OR (sender = ?2 AND receiver = ?1)
             ORDER BY timestamp ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![a, b], |row| {
            Ok(MessageRow {
                id: row.get(0)?,
                sender: row.get(1)?,
                receiver: row.get(2)?,
                body: row.get(3)?,
                timestamp: row.get::<_, i64>(4)? as u64,
                status: row.get::<_, String>(5)?.parse().map_err(|e: String| {
                    rusqlite::Error::FromSqlConversionFailure(
                        5,
                        rusqlite::types::Type::Text,
                        e.into(),
                    )
                })?,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Friend requests
    // -----------------------------------------------------------------------

    /// Insert a friend request row. The row's `id` is ignored; the generated
    /// id is returned.
    pub fn insert_friend_request(&self, row: &FriendRequestRow) -> Result<i64, StorageError> {
        self.conn.execute(
            "INSERT INTO friend_requests (sender_email, receiver_email, status)
             VALUES (?1, ?2, ?3)",
            params![row.sender_email, row.receiver_email, row.status.as_str()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Check whether any request for the exact directed pair exists,
    /// regardless of status.
    pub fn request_exists(&self, sender: &str, receiver: &str) -> Result<bool, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM friend_requests
             WHERE sender_email = ?1 AND receiver_email = ?2",
            params![sender, receiver],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Find the pending request for the exact directed pair, if one exists.
    pub fn find_pending_request(
        &self,
        sender: &str,
        receiver: &str,
    ) -> Result<Option<FriendRequestRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, sender_email, receiver_email, status
             FROM friend_requests
             WHERE sender_email = ?1 AND receiver_email = ?2 AND status = 'pending'
             LIMIT 1",
        )?;
        let row = stmt
            .query_row(params![sender, receiver], read_friend_request_row)
            .optional()?;
        Ok(row)
    }

    /// List pending requests addressed to an identity, in persisted
    /// (insertion) order.
    pub fn list_pending_requests(
        &self,
        receiver: &str,
    ) -> Result<Vec<FriendRequestRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, sender_email, receiver_email, status
             FROM friend_requests
             WHERE receiver_email = ?1 AND status = 'pending'
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![receiver], read_friend_request_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Flip a request's status to accepted. Returns false when no row with
    /// that id exists.
    pub fn mark_request_accepted(&self, id: i64) -> Result<bool, StorageError> {
        let affected = self.conn.execute(
            "UPDATE friend_requests SET status = 'accepted' WHERE id = ?1",
            params![id],
        )?;
        Ok(affected > 0)
    }

    // -----------------------------------------------------------------------
    // Friend edges
    // -----------------------------------------------------------------------

    /// Insert one direction of a friendship. The row's `id` is ignored; the
    /// generated id is returned.
    pub fn insert_friend(&self, row: &FriendRow) -> Result<i64, StorageError> {
        self.conn.execute(
            "INSERT INTO friends (user_email, friend_email) VALUES (?1, ?2)",
            params![row.user_email, row.friend_email],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// List all edges owned by an identity, in persisted order.
    pub fn list_friends(&self, owner: &str) -> Result<Vec<FriendRow>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_email, friend_email FROM friends
             WHERE user_email = ?1
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![owner], |row| {
            Ok(FriendRow {
                id: row.get(0)?,
                user_email: row.get(1)?,
                friend_email: row.get(2)?,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

fn read_friend_request_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FriendRequestRow> {
    Ok(FriendRequestRow {
        id: row.get(0)?,
        sender_email: row.get(1)?,
        receiver_email: row.get(2)?,
        status: row.get::<_, String>(3)?.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
        })?,
    })
}

/// Resolve the database path: `{data_dir}/natter.db`.
pub fn db_path(data_dir: &Path) -> PathBuf {
    data_dir.join("natter.db")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
