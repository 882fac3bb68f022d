//! Realtime event vocabulary.
//!
//! Events travel as JSON text frames shaped `{"event": ..., "data": ...}`.
//! Client events carry whatever identity the client asserts; the router
//! decides what to trust and where to relay. Server events are transient —
//! none of them is persisted, and delivery is fire-and-forget.

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};

use crate::messages::store::MessageView;

/// Events a client may send over its connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    /// Presence announce: attaches the user identity to this connection.
    UserOnline(String),
    /// Explicit personal-channel join (reconnect flows announce and join separately).
    JoinChat { user_id: String },
    /// Explicit personal-channel leave.
    LeaveChat { user_id: String },
    /// Typing indicator aimed at one counterpart.
    Typing { receiver_id: String, is_typing: bool },
    /// Whole-conversation read notice: tell sender_id their messages were read.
    MarkAsRead {
        sender_id: String,
        receiver_id: String,
    },
    /// Single-message read notice: tell sender_id one message was read.
    MessageRead {
        message_id: String,
        sender_id: String,
    },
}

/// Events the server pushes to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Full set of currently-online user ids, broadcast on every presence change.
    UpdateOnlineUsers(Vec<String>),
    /// Relayed typing indicator; user_id is the typist.
    UserTyping { user_id: String, is_typing: bool },
    /// The counterpart id whose messages are now read.
    MessagesRead(String),
    /// A single message id transitioned to read.
    MessageReadUpdate(String),
    /// Live mirror of a freshly persisted message, profiles resolved.
    ReceiveMessage(MessageView),
    /// A message id the sender deleted.
    MessageDeleted(String),
}

impl ServerEvent {
    /// Encode as a WebSocket text frame. Serialization of these enums cannot
    /// fail in practice; a failure is logged and produces an empty frame that
    /// clients ignore.
    pub fn to_frame(&self) -> Message {
        match serde_json::to_string(self) {
            Ok(json) => Message::Text(json.into()),
            Err(err) => {
                tracing::error!(error = %err, "Failed to encode server event");
                Message::Text(String::new().into())
            }
        }
    }
}
