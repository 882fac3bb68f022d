use std::sync::Arc;

use crate::db::DbPool;
use crate::realtime::hub::Hub;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// JWT signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// Realtime hub: connection registry, presence, and personal channels.
    /// One per process — presence is deliberately process-local.
    pub hub: Arc<Hub>,
}
