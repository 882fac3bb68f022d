//! REST endpoints for direct messages.
//!
//! Every handler follows the same shape: validate before touching the store,
//! run the store operation on the blocking pool, then hand the outcome to the
//! notifier for a best-effort live push. The REST response never depends on
//! whether anyone was online to receive the mirror.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::middleware::Claims;
use crate::error::ApiError;
use crate::state::AppState;

use super::store::{self, ConversationView, MessageView};
use super::notify;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    // Optional so that missing fields produce our 400, not a decode rejection.
    pub receiver_id: Option<String>,
    pub content: Option<String>,
}

/// POST /api/messages/send — Create a message and mirror it live.
/// 400 missing fields or malformed receiver id, 404 unknown receiver.
pub async fn send_message(
    State(state): State<AppState>,
    claims: Claims,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageView>), ApiError> {
    let receiver_id = body.receiver_id.unwrap_or_default();
    let content = body.content.unwrap_or_default();
    let content = content.trim();

    if receiver_id.is_empty() || content.is_empty() {
        return Err(ApiError::Validation(
            "Content and receiver are required".to_string(),
        ));
    }
    if Uuid::parse_str(&receiver_id).is_err() {
        return Err(ApiError::Validation("Invalid receiver ID".to_string()));
    }

    let db = state.db.clone();
    let sender_id = claims.sub.clone();
    let content = content.to_string();

    let message = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| ApiError::Internal)?;
        store::create_message(&conn, &sender_id, &receiver_id, &content)
    })
    .await??;

    // Best-effort live mirror; an offline receiver still gets the durable row.
    notify::message_sent(&state.hub, &message);

    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /api/messages/conversations — Derived conversation listing for the
/// requester: last message and unread count per counterpart, most recent first.
pub async fn list_conversations(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<Vec<ConversationView>>, ApiError> {
    let db = state.db.clone();
    let user_id = claims.sub.clone();

    let conversations = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| ApiError::Internal)?;
        Ok::<_, ApiError>(store::list_conversations(&conn, &user_id)?)
    })
    .await??;

    Ok(Json(conversations))
}

/// GET /api/messages/{user_id} — Full two-party history, oldest first.
/// Side effect: everything the counterpart sent the requester is bulk-marked
/// read; if any row flipped, the counterpart gets exactly one `messagesRead`
/// carrying the requester's id.
pub async fn get_conversation(
    State(state): State<AppState>,
    claims: Claims,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<MessageView>>, ApiError> {
    if Uuid::parse_str(&user_id).is_err() {
        return Err(ApiError::Validation("Invalid user ID".to_string()));
    }

    let db = state.db.clone();
    let me = claims.sub.clone();
    let counterpart = user_id.clone();

    let (messages, flipped) = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| ApiError::Internal)?;
        let messages = store::conversation_between(&conn, &me, &counterpart)?;
        let flipped = store::mark_conversation_read(&conn, &me, &counterpart)?;
        Ok::<_, ApiError>((messages, flipped))
    })
    .await??;

    if flipped > 0 {
        notify::conversation_read(&state.hub, &user_id, &claims.sub);
    }

    Ok(Json(messages))
}

/// PUT /api/messages/read/{message_id} — Mark one message read.
/// Receiver-only (403 otherwise), 404 if missing. Re-marking an already-read
/// message succeeds without emitting a second receipt.
pub async fn mark_message_read(
    State(state): State<AppState>,
    claims: Claims,
    Path(message_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if Uuid::parse_str(&message_id).is_err() {
        return Err(ApiError::Validation("Invalid message ID".to_string()));
    }

    let db = state.db.clone();
    let requester = claims.sub.clone();
    let id_for_store = message_id.clone();

    let outcome = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| ApiError::Internal)?;
        store::mark_message_read(&conn, &id_for_store, &requester)
    })
    .await??;

    if outcome.newly_read {
        notify::message_read(&state.hub, &outcome.sender_id, &message_id);
    }

    Ok(Json(serde_json::json!({ "success": true })))
}

/// DELETE /api/messages/{message_id} — Sender-only delete (403 otherwise),
/// 404 if missing. The receiver's channel is told which id disappeared.
pub async fn delete_message(
    State(state): State<AppState>,
    claims: Claims,
    Path(message_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if Uuid::parse_str(&message_id).is_err() {
        return Err(ApiError::Validation("Invalid message ID".to_string()));
    }

    let db = state.db.clone();
    let requester = claims.sub.clone();
    let id_for_store = message_id.clone();

    let outcome = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| ApiError::Internal)?;
        store::delete_message(&conn, &id_for_store, &requester)
    })
    .await??;

    notify::message_deleted(&state.hub, &outcome.receiver_id, &message_id);

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Message deleted successfully"
    })))
}
