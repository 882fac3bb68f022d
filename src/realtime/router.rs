//! Inbound event routing.
//!
//! Each connection walks a small state machine: it starts unidentified,
//! becomes identified on its first `userOnline` announce, and is closed when
//! the transport drops (handled by the actor, which then purges presence).
//! Typing and read-notice relays only fire for identified connections where
//! they need a sender identity; everything else is validated per event.
//!
//! Malformed payloads and blank ids are never surfaced to the client as
//! errors — the action is simply skipped, mirroring the rest of the
//! fire-and-forget realtime path.

use crate::realtime::hub::Hub;
use crate::realtime::protocol::{ClientEvent, ServerEvent};
use crate::realtime::ConnectionId;

/// Identity state for one connection. `user_id` is set by the first announce
/// and names the identity used for typing relays.
#[derive(Debug, Default)]
pub struct ConnectionState {
    pub user_id: Option<String>,
}

/// Decode and dispatch one inbound text frame.
pub fn handle_frame(hub: &Hub, conn_id: ConnectionId, state: &mut ConnectionState, text: &str) {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(err) => {
            tracing::debug!(connection = %conn_id, error = %err, "Ignoring undecodable client event");
            return;
        }
    };
    dispatch(hub, conn_id, state, event);
}

fn dispatch(hub: &Hub, conn_id: ConnectionId, state: &mut ConnectionState, event: ClientEvent) {
    match event {
        ClientEvent::UserOnline(user_id) => {
            if user_id.is_empty() {
                return;
            }
            hub.announce(conn_id, &user_id);
            hub.join(conn_id, &user_id);
            state.user_id = Some(user_id);
        }
        ClientEvent::JoinChat { user_id } => {
            if user_id.is_empty() {
                return;
            }
            hub.join(conn_id, &user_id);
        }
        ClientEvent::LeaveChat { user_id } => {
            if user_id.is_empty() {
                return;
            }
            hub.leave(conn_id, &user_id);
        }
        ClientEvent::Typing {
            receiver_id,
            is_typing,
        } => {
            // Needs an announced identity to attribute the indicator to.
            let Some(sender_id) = state.user_id.as_ref() else {
                return;
            };
            if receiver_id.is_empty() {
                return;
            }
            hub.emit_to_user(
                &receiver_id,
                &ServerEvent::UserTyping {
                    user_id: sender_id.clone(),
                    is_typing,
                },
            );
        }
        ClientEvent::MarkAsRead {
            sender_id,
            receiver_id,
        } => {
            if sender_id.is_empty() {
                return;
            }
            hub.emit_to_user(&sender_id, &ServerEvent::MessagesRead(receiver_id));
        }
        ClientEvent::MessageRead {
            message_id,
            sender_id,
        } => {
            if sender_id.is_empty() {
                return;
            }
            hub.emit_to_user(&sender_id, &ServerEvent::MessageReadUpdate(message_id));
        }
    }
}
