//! Live-delivery notifier.
//!
//! The store writes; these functions decide what to mirror over the realtime
//! channel and to whose personal channel. Emission is best-effort: an offline
//! recipient simply means the event goes nowhere, and no caller treats that
//! as a failure.

use crate::realtime::hub::Hub;
use crate::realtime::protocol::ServerEvent;

use super::store::MessageView;

/// A freshly persisted message is mirrored to the receiver's channel.
pub fn message_sent(hub: &Hub, message: &MessageView) {
    hub.emit_to_user(
        &message.receiver.id,
        &ServerEvent::ReceiveMessage(message.clone()),
    );
}

/// After a bulk read-mark, tell the counterpart who read their messages.
pub fn conversation_read(hub: &Hub, counterpart_id: &str, reader_id: &str) {
    hub.emit_to_user(
        counterpart_id,
        &ServerEvent::MessagesRead(reader_id.to_string()),
    );
}

/// After a single message flips to read, tell its sender which one.
pub fn message_read(hub: &Hub, sender_id: &str, message_id: &str) {
    hub.emit_to_user(
        sender_id,
        &ServerEvent::MessageReadUpdate(message_id.to_string()),
    );
}

/// After a sender deletes a message, tell the receiver it is gone.
pub fn message_deleted(hub: &Hub, receiver_id: &str, message_id: &str) {
    hub.emit_to_user(
        receiver_id,
        &ServerEvent::MessageDeleted(message_id.to_string()),
    );
}
