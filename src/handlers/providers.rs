//! Admin management of AI provider credentials.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::auth::AdminContext;
use crate::db::providers::{self, NewProvider, ProviderUpdate, ProviderView};
use crate::db::try_lock;
use crate::error::{ok, ok_with_message, ApiError, ApiResponse, ApiResult};
use crate::state::AppState;

const TEST_PROMPT: &str = "Reply with the single word OK.";

type Reply<T> = ApiResult<Json<ApiResponse<T>>>;

fn not_found(id: i64) -> ApiError {
    ApiError::not_found(format!("AI provider {} not found", id))
}

fn view(state: &AppState, id: i64) -> ApiResult<ProviderView> {
    let conn = try_lock(&state.db)?;
    providers::get_provider(&conn, id)?
        .as_ref()
        .map(ProviderView::from)
        .ok_or_else(|| not_found(id))
}

/// GET /api/admin/ai-providers
pub async fn list_providers(State(state): State<AppState>, _admin: AdminContext) -> Reply<Vec<ProviderView>> {
    let conn = try_lock(&state.db)?;
    let rows = providers::list_providers(&conn)?;
    Ok(ok(rows.iter().map(ProviderView::from).collect()))
}

/// POST /api/admin/ai-providers
pub async fn create_provider(
    State(state): State<AppState>,
    AdminContext(admin): AdminContext,
    Json(input): Json<NewProvider>,
) -> Reply<ProviderView> {
    if input.model_name.trim().is_empty() || input.api_key.trim().is_empty() {
        return Err(ApiError::bad_request("model_name and api_key are required"));
    }
    let id = {
        let conn = try_lock(&state.db)?;
        providers::create_provider(&conn, &input)?
    };
    tracing::info!(
        provider = input.provider_name.as_str(),
        "{} added AI provider {}",
        admin.username,
        id
    );
    Ok(ok(view(&state, id)?))
}

/// PUT /api/admin/ai-providers/{id}
pub async fn update_provider(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(id): Path<i64>,
    Json(update): Json<ProviderUpdate>,
) -> Reply<ProviderView> {
    if update.model_name.as_deref().is_some_and(|m| m.trim().is_empty()) {
        return Err(ApiError::bad_request("model_name cannot be empty"));
    }
    let found = {
        let conn = try_lock(&state.db)?;
        providers::update_provider(&conn, id, &update)?
    };
    if !found {
        return Err(not_found(id));
    }
    Ok(ok(view(&state, id)?))
}

/// DELETE /api/admin/ai-providers/{id}
pub async fn delete_provider(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(id): Path<i64>,
) -> Reply<()> {
    let conn = try_lock(&state.db)?;
    if !providers::delete_provider(&conn, id)? {
        return Err(not_found(id));
    }
    Ok(ok_with_message((), "Provider deleted"))
}

/// POST /api/admin/ai-providers/{id}/activate
pub async fn activate_provider(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(id): Path<i64>,
) -> Reply<ProviderView> {
    let found = {
        let conn = try_lock(&state.db)?;
        providers::activate_provider(&conn, id)?
    };
    if !found {
        return Err(not_found(id));
    }
    Ok(ok(view(&state, id)?))
}

#[derive(Debug, Serialize)]
pub struct ProviderTestResult {
    pub provider_id: i64,
    pub reply: String,
    pub latency_ms: u128,
}

/// POST /api/admin/ai-providers/{id}/test
///
/// Sends a short prompt through this entry; does not count against the quota.
pub async fn test_provider(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(id): Path<i64>,
) -> Reply<ProviderTestResult> {
    let provider = {
        let conn = try_lock(&state.db)?;
        providers::get_provider(&conn, id)?.ok_or_else(|| not_found(id))?
    };

    let started = Instant::now();
    let reply = state.ai.generate_with(&provider, TEST_PROMPT).await?;
    Ok(ok_with_message(
        ProviderTestResult {
            provider_id: id,
            reply: reply.trim().to_string(),
            latency_ms: started.elapsed().as_millis(),
        },
        "Provider responded",
    ))
}
