//! Durable message store operations.
//!
//! Every function here is synchronous rusqlite code meant to run inside
//! `tokio::task::spawn_blocking` with the connection lock held. Functions
//! return plain outcome values and never touch the realtime hub — deciding
//! whether and where to push a live event is the notifier's job. That split
//! keeps the REST paths testable without any open connection.

use std::collections::HashMap;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::Message;
use crate::error::ApiError;
use crate::users::store::{user_exists, UserProfile};

/// A message with sender and receiver resolved to profile fields — the shape
/// REST responses and `receiveMessage` events carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    pub sender: UserProfile,
    pub receiver: UserProfile,
    pub content: String,
    pub read: bool,
    /// Unix millis
    pub created_at: i64,
}

/// One entry in the conversations listing: the counterpart, the most recent
/// message exchanged with them, and how many of their messages are unread.
/// Derived per request — never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub user: UserProfile,
    pub last_message: MessageView,
    pub unread_count: i64,
    /// created_at of the most recent message, unix millis
    pub last_activity: i64,
}

/// Outcome of marking a single message read.
#[derive(Debug)]
pub struct ReadOutcome {
    pub sender_id: String,
    /// False when the message was already read — callers emit no receipt then.
    pub newly_read: bool,
}

/// Outcome of deleting a message.
#[derive(Debug)]
pub struct DeleteOutcome {
    pub receiver_id: String,
}

const VIEW_SELECT: &str = "\
SELECT m.id, m.content, m.read, m.created_at,
       s.id, s.name, s.email, s.avatar,
       r.id, r.name, r.email, r.avatar
FROM messages m
JOIN users s ON s.id = m.sender_id
JOIN users r ON r.id = m.receiver_id";

fn view_from_row(row: &Row<'_>) -> rusqlite::Result<MessageView> {
    Ok(MessageView {
        id: row.get(0)?,
        content: row.get(1)?,
        read: row.get(2)?,
        created_at: row.get(3)?,
        sender: UserProfile {
            id: row.get(4)?,
            name: row.get(5)?,
            email: row.get(6)?,
            avatar: row.get(7)?,
        },
        receiver: UserProfile {
            id: row.get(8)?,
            name: row.get(9)?,
            email: row.get(10)?,
            avatar: row.get(11)?,
        },
    })
}

/// Create a message with read=false and return the populated view.
/// Rejects with NotFound if the receiver does not exist.
pub fn create_message(
    conn: &Connection,
    sender_id: &str,
    receiver_id: &str,
    content: &str,
) -> Result<MessageView, ApiError> {
    if !user_exists(conn, receiver_id)? {
        return Err(ApiError::NotFound("Receiver not found".to_string()));
    }

    let id = Uuid::now_v7().to_string();
    let created_at = Utc::now().timestamp_millis();
    conn.execute(
        "INSERT INTO messages (id, sender_id, receiver_id, content, read, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        rusqlite::params![id, sender_id, receiver_id, content, created_at],
    )?;

    // Re-read through the profile join so the caller gets the same shape the
    // live mirror will carry.
    fetch_view(conn, &id)?.ok_or(ApiError::Internal)
}

/// Fetch one populated message view.
pub fn fetch_view(conn: &Connection, message_id: &str) -> rusqlite::Result<Option<MessageView>> {
    conn.query_row(
        &format!("{VIEW_SELECT} WHERE m.id = ?1"),
        rusqlite::params![message_id],
        view_from_row,
    )
    .optional()
}

/// Fetch one raw message row, profiles unresolved.
fn fetch_message(conn: &Connection, message_id: &str) -> rusqlite::Result<Option<Message>> {
    conn.query_row(
        "SELECT id, sender_id, receiver_id, content, read, created_at
         FROM messages WHERE id = ?1",
        rusqlite::params![message_id],
        |row| {
            Ok(Message {
                id: row.get(0)?,
                sender_id: row.get(1)?,
                receiver_id: row.get(2)?,
                content: row.get(3)?,
                read: row.get(4)?,
                created_at: row.get(5)?,
            })
        },
    )
    .optional()
}

/// All messages between two users, oldest first.
pub fn conversation_between(
    conn: &Connection,
    user_a: &str,
    user_b: &str,
) -> rusqlite::Result<Vec<MessageView>> {
    let mut stmt = conn.prepare(&format!(
        "{VIEW_SELECT}
         WHERE (m.sender_id = ?1 AND m.receiver_id = ?2)
            OR (m.sender_id = ?2 AND m.receiver_id = ?1)
         ORDER BY m.created_at ASC, m.id ASC"
    ))?;
    let views = stmt
        .query_map(rusqlite::params![user_a, user_b], view_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(views)
}

/// Bulk-mark everything the counterpart sent to the reader as read.
/// Returns the number of rows that actually flipped — zero means the caller
/// must not emit a read receipt.
pub fn mark_conversation_read(
    conn: &Connection,
    reader_id: &str,
    counterpart_id: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE messages SET read = 1
         WHERE sender_id = ?1 AND receiver_id = ?2 AND read = 0",
        rusqlite::params![counterpart_id, reader_id],
    )
}

/// Mark a single message read. Only the receiver may do this; marking an
/// already-read message is a no-op reported through `newly_read`.
pub fn mark_message_read(
    conn: &Connection,
    message_id: &str,
    requester_id: &str,
) -> Result<ReadOutcome, ApiError> {
    let Some(message) = fetch_message(conn, message_id)? else {
        return Err(ApiError::NotFound("Message not found".to_string()));
    };
    if message.receiver_id != requester_id {
        return Err(ApiError::Forbidden(
            "Not authorized to mark this message as read".to_string(),
        ));
    }
    if message.read {
        return Ok(ReadOutcome {
            sender_id: message.sender_id,
            newly_read: false,
        });
    }

    conn.execute(
        "UPDATE messages SET read = 1 WHERE id = ?1",
        rusqlite::params![message_id],
    )?;
    Ok(ReadOutcome {
        sender_id: message.sender_id,
        newly_read: true,
    })
}

/// Delete a message. Only the sender may do this.
pub fn delete_message(
    conn: &Connection,
    message_id: &str,
    requester_id: &str,
) -> Result<DeleteOutcome, ApiError> {
    let Some(message) = fetch_message(conn, message_id)? else {
        return Err(ApiError::NotFound("Message not found".to_string()));
    };
    if message.sender_id != requester_id {
        return Err(ApiError::Forbidden(
            "Not authorized to delete this message".to_string(),
        ));
    }

    conn.execute(
        "DELETE FROM messages WHERE id = ?1",
        rusqlite::params![message_id],
    )?;
    Ok(DeleteOutcome {
        receiver_id: message.receiver_id,
    })
}

/// Derive the conversations listing for a user: one entry per counterpart,
/// carrying the most recent message and the count of unread messages
/// addressed to the user, ordered by last activity descending.
pub fn list_conversations(
    conn: &Connection,
    user_id: &str,
) -> rusqlite::Result<Vec<ConversationView>> {
    let mut stmt = conn.prepare(&format!(
        "{VIEW_SELECT}
         WHERE m.sender_id = ?1 OR m.receiver_id = ?1
         ORDER BY m.created_at DESC, m.id DESC"
    ))?;
    let rows = stmt.query_map(rusqlite::params![user_id], view_from_row)?;

    // Rows arrive newest-first, so the first row per counterpart is the last
    // message and fixes that conversation's position in the listing.
    let mut order: Vec<String> = Vec::new();
    let mut by_counterpart: HashMap<String, ConversationView> = HashMap::new();

    for view in rows {
        let view = view?;
        let (counterpart, unread_incoming) = if view.sender.id == user_id {
            (view.receiver.clone(), false)
        } else {
            (view.sender.clone(), !view.read)
        };

        match by_counterpart.get_mut(&counterpart.id) {
            Some(entry) => {
                if unread_incoming {
                    entry.unread_count += 1;
                }
            }
            None => {
                order.push(counterpart.id.clone());
                by_counterpart.insert(
                    counterpart.id.clone(),
                    ConversationView {
                        user: counterpart,
                        unread_count: unread_incoming as i64,
                        last_activity: view.created_at,
                        last_message: view,
                    },
                );
            }
        }
    }

    Ok(order
        .into_iter()
        .filter_map(|id| by_counterpart.remove(&id))
        .collect())
}
