//! The realtime hub: connection registry, presence, and per-user channels.
//!
//! All three maps are process-local. Presence is best-effort — a fleet of
//! server processes would need a shared presence store, which this design
//! deliberately does not have. The hub is the only owner of this state;
//! everything else goes through its methods.
//!
//! Presence is a single entry per user: a second announce for the same user
//! overwrites the first, and the earlier connection is orphaned from presence
//! lookup. Channel membership, by contrast, fans out to every joined
//! connection. Both behaviors are intentional.

use dashmap::DashMap;

use crate::realtime::protocol::ServerEvent;
use crate::realtime::{ConnectionId, ConnectionSender};

#[derive(Default)]
pub struct Hub {
    /// Every open connection, by id.
    connections: DashMap<ConnectionId, ConnectionSender>,
    /// user id -> the connection that most recently announced as that user.
    presence: DashMap<String, ConnectionId>,
    /// Reverse tag: connection -> the user it announced as.
    tags: DashMap<ConnectionId, String>,
    /// Personal channels: channel name (a user id) -> member connections.
    channels: DashMap<String, Vec<ConnectionId>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly opened connection. Called once per transport handshake.
    pub fn register_connection(&self, conn_id: ConnectionId, tx: ConnectionSender) {
        self.connections.insert(conn_id, tx);
        tracing::debug!(connection = %conn_id, total = self.connections.len(), "Connection registered");
    }

    /// Presence announce: record user -> connection (overwriting any prior
    /// entry for that user), tag the connection for reverse lookup, and
    /// broadcast the updated online set to everyone. Idempotent.
    pub fn announce(&self, conn_id: ConnectionId, user_id: &str) {
        self.presence.insert(user_id.to_string(), conn_id);
        self.tags.insert(conn_id, user_id.to_string());
        self.broadcast_online_users();
        tracing::debug!(user_id = %user_id, connection = %conn_id, "User announced online");
    }

    /// Pure presence read; None means offline.
    pub fn lookup(&self, user_id: &str) -> Option<ConnectionId> {
        self.presence.get(user_id).map(|entry| *entry.value())
    }

    /// Current set of online user ids.
    pub fn online_users(&self) -> Vec<String> {
        self.presence.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Transport close: drop the connection, evict it from every channel,
    /// and — if it ever announced — delete the presence entry and rebroadcast
    /// the online set. A connection that closed before announcing leaves
    /// presence untouched.
    pub fn remove_connection(&self, conn_id: ConnectionId) {
        self.connections.remove(&conn_id);

        self.channels.retain(|_, members| {
            members.retain(|member| *member != conn_id);
            !members.is_empty()
        });

        if let Some((_, user_id)) = self.tags.remove(&conn_id) {
            self.presence.remove(&user_id);
            self.broadcast_online_users();
            tracing::debug!(user_id = %user_id, connection = %conn_id, "User went offline");
        }
    }

    /// Join the personal channel named `user_id`. Joining does not leave any
    /// previously joined channel — leaves are always explicit.
    pub fn join(&self, conn_id: ConnectionId, user_id: &str) {
        let mut members = self.channels.entry(user_id.to_string()).or_default();
        if !members.contains(&conn_id) {
            members.push(conn_id);
        }
    }

    /// Leave the personal channel named `user_id`.
    pub fn leave(&self, conn_id: ConnectionId, user_id: &str) {
        if let Some(mut members) = self.channels.get_mut(user_id) {
            members.retain(|member| *member != conn_id);
        }
    }

    /// Deliver an event to every connection joined to `user_id`'s channel.
    /// Nobody joined means the event is silently dropped — durability comes
    /// from the message store, not this path.
    pub fn emit_to_user(&self, user_id: &str, event: &ServerEvent) {
        let Some(members) = self.channels.get(user_id) else {
            return;
        };
        let frame = event.to_frame();
        for conn_id in members.value() {
            if let Some(tx) = self.connections.get(conn_id) {
                let _ = tx.send(frame.clone());
            }
        }
    }

    /// Deliver an event to every open connection, announced or not.
    pub fn broadcast(&self, event: &ServerEvent) {
        let frame = event.to_frame();
        for entry in self.connections.iter() {
            let _ = entry.value().send(frame.clone());
        }
    }

    fn broadcast_online_users(&self) {
        self.broadcast(&ServerEvent::UpdateOnlineUsers(self.online_users()));
    }
}
