//! User profile lookups.
//!
//! This crate does not own user lifecycle: registration, password handling,
//! and OAuth live in the account service. We keep a local users table so the
//! message paths can validate receivers and join profile fields into payloads,
//! plus an insert used by provisioning and tests.

use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public profile projection joined into message payloads and
/// returned by the user routes. Never includes credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
}

/// Insert a user and return its generated id.
pub fn insert_user(
    conn: &Connection,
    name: &str,
    email: &str,
    avatar: Option<&str>,
) -> rusqlite::Result<String> {
    let id = Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO users (id, name, email, avatar) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![id, name, email, avatar],
    )?;
    Ok(id)
}

/// Fetch a single profile; None if the user does not exist.
pub fn get_profile(conn: &Connection, user_id: &str) -> rusqlite::Result<Option<UserProfile>> {
    conn.query_row(
        "SELECT id, name, email, avatar FROM users WHERE id = ?1",
        rusqlite::params![user_id],
        |row| {
            Ok(UserProfile {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                avatar: row.get(3)?,
            })
        },
    )
    .optional()
}

/// True if a user row exists for the id.
pub fn user_exists(conn: &Connection, user_id: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE id = ?1",
        rusqlite::params![user_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// List all profiles, newest first.
pub fn list_profiles(conn: &Connection) -> rusqlite::Result<Vec<UserProfile>> {
    let mut stmt =
        conn.prepare("SELECT id, name, email, avatar FROM users ORDER BY created_at DESC, id DESC")?;
    let profiles = stmt
        .query_map([], |row| {
            Ok(UserProfile {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                avatar: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(profiles)
}
