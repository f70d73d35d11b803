//! Authentication extractors.

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::CookieJar;

use super::db as auth_db;
use crate::db::try_lock;
use crate::error::ApiError;
use crate::state::AppState;

pub const SESSION_COOKIE_NAME: &str = "tutor_session";

/// Authenticated request context.
/// Add this as a handler parameter to require a valid session.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub username: String,
    pub role: String,
    pub session_id: String,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == auth_db::ROLE_ADMIN
    }
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::unauthorized("Not logged in"))?;

        let session_id = jar
            .get(SESSION_COOKIE_NAME)
            .map(|c| c.value().to_string())
            .ok_or_else(|| ApiError::unauthorized("Not logged in"))?;

        let conn = try_lock(&state.db)?;
        let (user_id, username, role) = auth_db::get_session_user(&conn, &session_id)?
            .ok_or_else(|| ApiError::unauthorized("Session expired, please log in again"))?;

        Ok(AuthContext {
            user_id,
            username,
            role,
            session_id,
        })
    }
}

/// Admin-only extractor: 401 without a session, 403 for non-admins
#[derive(Debug, Clone)]
pub struct AdminContext(pub AuthContext);

impl FromRequestParts<AppState> for AdminContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = AuthContext::from_request_parts(parts, state).await?;
        if !auth.is_admin() {
            tracing::debug!(user = %auth.username, "Rejected non-admin request");
            return Err(ApiError::forbidden("Admin access required"));
        }
        Ok(AdminContext(auth))
    }
}
