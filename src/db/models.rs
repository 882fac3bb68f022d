/// Database row types.
/// These correspond 1:1 to the SQLite schema defined in migrations.rs.
/// The users table is projected straight into `users::UserProfile` — the only
/// shape the rest of the system consumes.

/// Direct message record.
/// Mutated only by the send path (create), the read-mark paths
/// (read 0 -> 1), and the sender-only delete path.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub read: bool,
    /// Unix millis, assigned server-side at creation
    pub created_at: i64,
}
