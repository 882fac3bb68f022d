pub mod actor;
pub mod handler;
pub mod hub;
pub mod protocol;
pub mod router;

use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque identifier for one WebSocket session, assigned at handshake.
pub type ConnectionId = Uuid;

/// Type alias for the sender half of a WebSocket connection's channel.
/// Other parts of the system can clone this to push messages to a specific client.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;
