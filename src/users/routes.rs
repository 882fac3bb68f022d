//! Read-only profile endpoints consumed by the messaging UI
//! (picking a counterpart, resolving avatars).

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::auth::middleware::Claims;
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::store::{self, UserProfile};

/// GET /api/users — List all user profiles. JWT auth required.
pub async fn list_users(
    State(state): State<AppState>,
    _claims: Claims,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    let db = state.db.clone();

    let profiles = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| ApiError::Internal)?;
        Ok::<_, ApiError>(store::list_profiles(&conn)?)
    })
    .await??;

    Ok(Json(profiles))
}

/// GET /api/users/{user_id} — Fetch one profile. JWT auth required.
/// Rejects 400 on malformed id, 404 if the user does not exist.
pub async fn get_user(
    State(state): State<AppState>,
    _claims: Claims,
    Path(user_id): Path<String>,
) -> Result<Json<UserProfile>, ApiError> {
    if Uuid::parse_str(&user_id).is_err() {
        return Err(ApiError::Validation("Invalid user ID".to_string()));
    }

    let db = state.db.clone();
    let profile = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| ApiError::Internal)?;
        store::get_profile(&conn, &user_id)?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
    })
    .await??;

    Ok(Json(profile))
}
