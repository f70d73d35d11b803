//! Authentication handlers: login, logout, password change and user admin.

use axum::{
    extract::{Path, State},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use super::db::{self as auth_db, UserInfo, ROLE_ADMIN, ROLE_STUDENT};
use super::middleware::{AdminContext, AuthContext, SESSION_COOKIE_NAME};
use super::password::{self, MIN_PASSWORD_LEN};
use crate::config::AppConfig;
use crate::db::{try_lock, LogOnError};
use crate::error::{ok, ok_with_message, ApiError, ApiResponse, ApiResult};
use crate::state::AppState;

const MAX_USERNAME_LEN: usize = 32;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

/// The logged-in user as returned to clients
#[derive(Debug, Serialize)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub role: String,
    pub is_admin: bool,
}

impl From<&AuthContext> for CurrentUser {
    fn from(auth: &AuthContext) -> Self {
        Self {
            id: auth.user_id,
            username: auth.username.clone(),
            role: auth.role.clone(),
            is_admin: auth.is_admin(),
        }
    }
}

/// Generate a new session ID
pub fn generate_session_id() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    (0..32)
        .map(|_| {
            let idx = rng.random_range(0..36);
            if idx < 10 {
                (b'0' + idx) as char
            } else {
                (b'a' + idx - 10) as char
            }
        })
        .collect()
}

fn validate_username(username: &str) -> ApiResult<()> {
    if username.is_empty() || username.len() > MAX_USERNAME_LEN {
        return Err(ApiError::bad_request(format!(
            "Username must be 1-{} characters",
            MAX_USERNAME_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ApiError::bad_request(
            "Username may only contain letters, digits, '_' and '-'",
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> ApiResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn hash(password: &str) -> ApiResult<String> {
    password::hash_password(password)
        .map_err(|e| ApiError::internal(format!("Password hashing failed: {}", e)))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> ApiResult<(CookieJar, Json<ApiResponse<CurrentUser>>)> {
    let username = req.username.trim();
    if username.is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("Username and password are required"));
    }

    let conn = try_lock(&state.db)?;
    let (user_id, stored_hash) = auth_db::get_user_by_username(&conn, username)?
        .ok_or_else(|| ApiError::unauthorized("Invalid username or password"))?;

    if !password::verify_password(&req.password, &stored_hash) {
        tracing::info!("Failed login for {}", username);
        return Err(ApiError::unauthorized("Invalid username or password"));
    }

    auth_db::update_last_login(&conn, user_id).log_warn("Failed to update last login");
    auth_db::cleanup_expired_sessions(&conn).log_warn("Failed to clean up expired sessions");

    let session_id = generate_session_id();
    auth_db::create_session(&conn, user_id, &session_id, state.config.session_hours)?;
    let info = auth_db::get_user_by_id(&conn, user_id)?
        .ok_or_else(|| ApiError::internal("user vanished during login"))?;
    drop(conn);

    tracing::info!("User {} logged in", info.username);

    let session_cookie = Cookie::build((SESSION_COOKIE_NAME, session_id))
        .path("/")
        .http_only(true)
        .secure(false)
        .max_age(time::Duration::hours(state.config.session_hours))
        .build();

    let user = CurrentUser {
        id: info.id,
        is_admin: info.role == ROLE_ADMIN,
        username: info.username,
        role: info.role,
    };
    Ok((jar.add(session_cookie), ok(user)))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<ApiResponse<()>>) {
    if let Some(session_cookie) = jar.get(SESSION_COOKIE_NAME) {
        if let Ok(conn) = try_lock(&state.db) {
            auth_db::delete_session(&conn, session_cookie.value())
                .log_warn("Failed to delete session during logout");
        }
    }

    let session_cookie = Cookie::build((SESSION_COOKIE_NAME, ""))
        .path("/")
        .max_age(time::Duration::seconds(0))
        .build();

    (jar.remove(session_cookie), ok_with_message((), "Logged out"))
}

/// GET /api/auth/me
pub async fn me(auth: AuthContext) -> Json<ApiResponse<CurrentUser>> {
    ok(CurrentUser::from(&auth))
}

/// POST /api/user/change-password
///
/// Signs out every other session of the user.
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Json<ApiResponse<()>>> {
    validate_password(&req.new_password)?;

    let conn = try_lock(&state.db)?;
    let stored = auth_db::get_password_hash(&conn, auth.user_id)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    if !password::verify_password(&req.current_password, &stored) {
        return Err(ApiError::bad_request("Current password is incorrect"));
    }

    auth_db::set_password_hash(&conn, auth.user_id, &hash(&req.new_password)?)?;
    let revoked = auth_db::delete_other_sessions(&conn, auth.user_id, &auth.session_id)?;
    tracing::info!(revoked, "User {} changed password", auth.username);

    Ok(ok_with_message((), "Password changed"))
}

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminContext,
) -> ApiResult<Json<ApiResponse<Vec<UserInfo>>>> {
    let conn = try_lock(&state.db)?;
    Ok(ok(auth_db::get_all_users(&conn)?))
}

/// POST /api/admin/users
pub async fn create_user(
    State(state): State<AppState>,
    AdminContext(admin): AdminContext,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<Json<ApiResponse<UserInfo>>> {
    let username = req.username.trim();
    validate_username(username)?;
    validate_password(&req.password)?;
    let role = match req.role.as_deref().unwrap_or(ROLE_STUDENT) {
        ROLE_ADMIN => ROLE_ADMIN,
        ROLE_STUDENT => ROLE_STUDENT,
        other => return Err(ApiError::bad_request(format!("Unknown role: {}", other))),
    };

    let password_hash = hash(&req.password)?;
    let conn = try_lock(&state.db)?;
    if auth_db::username_exists(&conn, username)? {
        return Err(ApiError::bad_request("Username already taken"));
    }
    let id = auth_db::create_user(&conn, username, &password_hash, role)?;
    let info = auth_db::get_user_by_id(&conn, id)?
        .ok_or_else(|| ApiError::save("user missing after insert"))?;

    tracing::info!("{} created {} user {}", admin.username, role, username);
    Ok(ok(info))
}

/// GET /api/admin/users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse<UserInfo>>> {
    let conn = try_lock(&state.db)?;
    auth_db::get_user_by_id(&conn, id)?
        .map(ok)
        .ok_or_else(|| ApiError::not_found(format!("User {} not found", id)))
}

/// POST /api/admin/users/{id}/reset-password
///
/// Signs the user out of every session.
pub async fn reset_password(
    State(state): State<AppState>,
    AdminContext(admin): AdminContext,
    Path(id): Path<i64>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<Json<ApiResponse<()>>> {
    validate_password(&req.new_password)?;
    let password_hash = hash(&req.new_password)?;

    let conn = try_lock(&state.db)?;
    let user = auth_db::get_user_by_id(&conn, id)?
        .ok_or_else(|| ApiError::not_found(format!("User {} not found", id)))?;
    auth_db::set_password_hash(&conn, id, &password_hash)?;
    let revoked = auth_db::delete_user_sessions(&conn, id)?;

    tracing::info!(revoked, "{} reset the password of {}", admin.username, user.username);
    Ok(ok_with_message((), "Password reset"))
}

/// DELETE /api/admin/users/{id}
///
/// Admins cannot delete themselves, and the last admin cannot be deleted.
pub async fn delete_user(
    State(state): State<AppState>,
    AdminContext(admin): AdminContext,
    Path(id): Path<i64>,
) -> ApiResult<Json<ApiResponse<()>>> {
    if id == admin.user_id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    let conn = try_lock(&state.db)?;
    let user = auth_db::get_user_by_id(&conn, id)?
        .ok_or_else(|| ApiError::not_found(format!("User {} not found", id)))?;
    if user.role == ROLE_ADMIN && auth_db::count_admins(&conn)? <= 1 {
        return Err(ApiError::bad_request("The last admin account cannot be deleted"));
    }
    auth_db::delete_user(&conn, id)?;

    tracing::info!("{} deleted user {}", admin.username, user.username);
    Ok(ok_with_message((), format!("Deleted user {}", user.username)))
}

/// Create the configured admin account when the database has no users yet.
///
/// Returns the new user's id, or None when nothing was created.
pub fn bootstrap_admin(conn: &Connection, config: &AppConfig) -> ApiResult<Option<i64>> {
    let (Some(username), Some(password)) = (
        config.admin_username.as_deref().map(str::trim),
        config.admin_password.as_deref(),
    ) else {
        return Ok(None);
    };

    if auth_db::get_user_count(conn)? > 0 {
        return Ok(None);
    }
    validate_username(username)?;
    validate_password(password)?;

    let id = auth_db::create_user(conn, username, &hash(password)?, ROLE_ADMIN)?;
    tracing::info!("Created initial admin account '{}'", username);
    Ok(Some(id))
}
