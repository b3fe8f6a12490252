//! Friend request and friendship rules.
//!
//! The social graph is built from two collections: directed friend requests
//! that move from `pending` to `accepted`, and per-user friendship edges. A
//! confirmed friendship is two edges, one owned by each side, written when
//! the receiver accepts. All rule checks happen here; the storage layer just
//! persists what this module decides.

use crate::storage::{FriendRequestRow, FriendRow, RequestStatus, Storage, StorageError};

/// Error types for friend graph operations
#[derive(Debug)]
pub enum SocialError {
    /// Sender and receiver are the same identity.
    SelfRequest,
    /// A request for this directed pair already exists, whatever its status.
    DuplicateRequest,
    /// No pending request matches the acceptance.
    RequestNotFound,
    Storage(StorageError),
}

impl std::fmt::Display for SocialError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SocialError::SelfRequest => write!(f, "cannot add yourself as a friend"),
            SocialError::DuplicateRequest => write!(f, "friend request already sent"),
            SocialError::RequestNotFound => write!(f, "friend request not found"),
            SocialError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for SocialError {}

impl From<StorageError> for SocialError {
    fn from(e: StorageError) -> Self {
        SocialError::Storage(e)
    }
}

/// File a friend request from `sender` to `receiver`.
///
/// Rejects self-requests and duplicates of the exact directed pair. A prior
/// request in the reverse direction does not count as a duplicate, and an
/// already-accepted request still blocks a new one for the same pair.
pub fn send_friend_request(
    storage: &Storage,
    sender: &str,
    receiver: &str,
) -> Result<FriendRequestRow, SocialError> {
    if sender == receiver {
        return Err(SocialError::SelfRequest);
    }
    if storage.request_exists(sender, receiver)? {
        return Err(SocialError::DuplicateRequest);
    }
    let mut row = FriendRequestRow {
        id: 0,
        sender_email: sender.to_string(),
        receiver_email: receiver.to_string(),
        status: RequestStatus::Pending,
    };
    row.id = storage.insert_friend_request(&row)?;
    Ok(row)
}

/// List the pending requests waiting on `receiver`, oldest first.
pub fn list_pending_requests(
    storage: &Storage,
    receiver: &str,
) -> Result<Vec<FriendRequestRow>, SocialError> {
    Ok(storage.list_pending_requests(receiver)?)
}

/// Accept the pending request that `friend` sent to `user`.
///
/// Marks the request accepted and writes one friendship edge for each side.
/// The three writes are sequential, not transactional; a crash between them
/// can leave an accepted request with one or zero edges.
pub fn accept_friend_request(
    storage: &Storage,
    user: &str,
    friend: &str,
) -> Result<(), SocialError> {
    let request = storage
        .find_pending_request(friend, user)?
        .ok_or(SocialError::RequestNotFound)?;

    storage.mark_request_accepted(request.id)?;
    storage.insert_friend(&FriendRow {
        id: 0,
        user_email: user.to_string(),
        friend_email: friend.to_string(),
    })?;
    storage.insert_friend(&FriendRow {
        id: 0,
        user_email: friend.to_string(),
        friend_email: user.to_string(),
    })?;
    Ok(())
}

/// List the confirmed friends of `user`, oldest friendship first.
pub fn list_friends(storage: &Storage, user: &str) -> Result<Vec<FriendRow>, SocialError> {
    Ok(storage.list_friends(user)?)
}
