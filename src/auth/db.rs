//! Database operations for users and sessions.
//!
//! Both tables live in tutor.db next to the learning data; the schema is
//! created by `crate::db::schema`.

use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result};
use serde::Serialize;

use crate::db::ts;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_STUDENT: &str = "student";

/// Create a new user, returns the user ID
pub fn create_user(conn: &Connection, username: &str, password_hash: &str, role: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO users (username, password_hash, role, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![username, password_hash, role, ts(&Utc::now())],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get user by username, returns (user_id, password_hash)
pub fn get_user_by_username(conn: &Connection, username: &str) -> Result<Option<(i64, String)>> {
    conn.query_row(
        "SELECT id, password_hash FROM users WHERE username = ?1",
        params![username],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
}

pub fn get_password_hash(conn: &Connection, user_id: i64) -> Result<Option<String>> {
    conn.query_row(
        "SELECT password_hash FROM users WHERE id = ?1",
        params![user_id],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_password_hash(conn: &Connection, user_id: i64, password_hash: &str) -> Result<()> {
    conn.execute(
        "UPDATE users SET password_hash = ?1 WHERE id = ?2",
        params![password_hash, user_id],
    )?;
    Ok(())
}

/// Check if a username already exists
pub fn username_exists(conn: &Connection, username: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE username = ?1",
        params![username],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Create a new session
pub fn create_session(
    conn: &Connection,
    user_id: i64,
    session_id: &str,
    duration_hours: i64,
) -> Result<()> {
    let now = Utc::now();
    let expires = now + Duration::hours(duration_hours);
    conn.execute(
        "INSERT INTO sessions (id, user_id, created_at, expires_at, last_access_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![session_id, user_id, ts(&now), ts(&expires), ts(&now)],
    )?;
    Ok(())
}

/// Validate session and get user info, returns (user_id, username, role)
pub fn get_session_user(conn: &Connection, session_id: &str) -> Result<Option<(i64, String, String)>> {
    let now = ts(&Utc::now());
    let user = conn
        .query_row(
            r#"
            SELECT u.id, u.username, u.role
            FROM sessions s
            JOIN users u ON s.user_id = u.id
            WHERE s.id = ?1 AND s.expires_at > ?2
            "#,
            params![session_id, now],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    if user.is_some() {
        // Update last access time
        let _ = conn.execute(
            "UPDATE sessions SET last_access_at = ?1 WHERE id = ?2",
            params![now, session_id],
        );
    }
    Ok(user)
}

/// Delete a session (logout)
pub fn delete_session(conn: &Connection, session_id: &str) -> Result<()> {
    conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
    Ok(())
}

/// Delete all sessions for a user except `keep`
pub fn delete_other_sessions(conn: &Connection, user_id: i64, keep: &str) -> Result<usize> {
    conn.execute(
        "DELETE FROM sessions WHERE user_id = ?1 AND id != ?2",
        params![user_id, keep],
    )
}

/// Sign a user out everywhere
pub fn delete_user_sessions(conn: &Connection, user_id: i64) -> Result<usize> {
    conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])
}

/// Delete a user; sessions, progress and mistakes go with it.
///
/// Returns false when no such user exists.
pub fn delete_user(conn: &Connection, user_id: i64) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
    Ok(deleted == 1)
}

pub fn count_admins(conn: &Connection) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM users WHERE role = ?1",
        params![ROLE_ADMIN],
        |row| row.get(0),
    )
}

/// Cleanup expired sessions, returns count of deleted sessions
pub fn cleanup_expired_sessions(conn: &Connection) -> Result<usize> {
    conn.execute(
        "DELETE FROM sessions WHERE expires_at < ?1",
        params![ts(&Utc::now())],
    )
}

/// Update user's last login timestamp
pub fn update_last_login(conn: &Connection, user_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE users SET last_login_at = ?1 WHERE id = ?2",
        params![ts(&Utc::now()), user_id],
    )?;
    Ok(())
}

pub fn get_user_count(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
}

/// User info for admin display
#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    pub id: i64,
    pub username: String,
    pub role: String,
    pub created_at: String,
    pub last_login_at: Option<String>,
}

fn row_to_user(row: &rusqlite::Row) -> Result<UserInfo> {
    Ok(UserInfo {
        id: row.get(0)?,
        username: row.get(1)?,
        role: row.get(2)?,
        created_at: row.get(3)?,
        last_login_at: row.get(4)?,
    })
}

/// Get all users for admin display
pub fn get_all_users(conn: &Connection) -> Result<Vec<UserInfo>> {
    let mut stmt = conn.prepare(
        "SELECT id, username, role, created_at, last_login_at FROM users ORDER BY created_at DESC",
    )?;
    let users = stmt.query_map([], row_to_user)?.collect::<Result<Vec<_>>>()?;
    Ok(users)
}

pub fn get_user_by_id(conn: &Connection, user_id: i64) -> Result<Option<UserInfo>> {
    conn.query_row(
        "SELECT id, username, role, created_at, last_login_at FROM users WHERE id = ?1",
        params![user_id],
        row_to_user,
    )
    .optional()
}
