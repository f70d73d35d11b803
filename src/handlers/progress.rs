//! Review progress: recording answers and serving due batches.

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::auth::AuthContext;
use crate::db::{progress, try_lock};
use crate::domain::{ItemKind, NewMistake};
use crate::error::{ok, ApiError, ApiResponse, ApiResult};
use crate::services::export::{self, ExportFormat, VocabularyExport};
use crate::services::review::{self, DueBatch, StatsView, SubmissionResult};
use crate::state::AppState;

/// One answer to a scheduled item
#[derive(Debug, Deserialize)]
pub struct OutcomeRequest {
    #[serde(alias = "word_id", alias = "transformation_id")]
    pub item_id: i64,
    pub is_correct: bool,
    /// Filed in the mistake book when the answer is wrong
    #[serde(default)]
    pub mistake: Option<NewMistake>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BatchQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

fn parse_kind(kind: &str) -> ApiResult<ItemKind> {
    ItemKind::from_str(kind).ok_or_else(|| ApiError::bad_request(format!("Unknown item kind: {}", kind)))
}

fn submit(state: &AppState, auth: &AuthContext, kind: ItemKind, req: &OutcomeRequest) -> ApiResult<SubmissionResult> {
    let conn = try_lock(&state.db)?;
    review::record_submission(
        &conn,
        auth.user_id,
        kind,
        req.item_id,
        req.is_correct,
        req.mistake.as_ref(),
        Utc::now(),
    )
}

fn batch(state: &AppState, auth: &AuthContext, kind: ItemKind, q: &BatchQuery) -> ApiResult<DueBatch> {
    let limit = state.config.batch_limit(q.limit);
    let conn = try_lock(&state.db)?;
    Ok(review::due_batch(&conn, auth.user_id, kind, Utc::now(), limit)?)
}

/// POST /api/progress/{kind}
pub async fn record_progress(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(kind): Path<String>,
    Json(req): Json<OutcomeRequest>,
) -> ApiResult<Json<ApiResponse<SubmissionResult>>> {
    let kind = parse_kind(&kind)?;
    Ok(ok(submit(&state, &auth, kind, &req)?))
}

/// GET /api/progress/{kind}/due
pub async fn due_items(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(kind): Path<String>,
    Query(q): Query<BatchQuery>,
) -> ApiResult<Json<ApiResponse<DueBatch>>> {
    let kind = parse_kind(&kind)?;
    Ok(ok(batch(&state, &auth, kind, &q)?))
}

/// POST /api/vocabulary/progress
pub async fn record_word_progress(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<OutcomeRequest>,
) -> ApiResult<Json<ApiResponse<SubmissionResult>>> {
    Ok(ok(submit(&state, &auth, ItemKind::Word, &req)?))
}

/// GET /api/vocabulary/batch
pub async fn word_batch(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<BatchQuery>,
) -> ApiResult<Json<ApiResponse<DueBatch>>> {
    Ok(ok(batch(&state, &auth, ItemKind::Word, &q)?))
}

/// GET /api/vocabulary/stats
pub async fn word_stats(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<ApiResponse<StatsView>>> {
    let conn = try_lock(&state.db)?;
    Ok(ok(review::progress_stats(&conn, auth.user_id, ItemKind::Word, Utc::now())?))
}

/// GET /api/vocabulary/transformations/progress
pub async fn transformation_due(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<BatchQuery>,
) -> ApiResult<Json<ApiResponse<DueBatch>>> {
    Ok(ok(batch(&state, &auth, ItemKind::Transformation, &q)?))
}

/// POST /api/vocabulary/transformations/progress
pub async fn record_transformation_progress(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<OutcomeRequest>,
) -> ApiResult<Json<ApiResponse<SubmissionResult>>> {
    Ok(ok(submit(&state, &auth, ItemKind::Transformation, &req)?))
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: ExportFormat,
}

/// GET /api/vocabulary/export?format=json|csv
///
/// Served as a download named after the learner and the date.
pub async fn export_vocabulary(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<ExportQuery>,
) -> ApiResult<Response> {
    let words = {
        let conn = try_lock(&state.db)?;
        progress::export_words(&conn, auth.user_id)?
    };
    let now = Utc::now();
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export::file_name(&auth.username, q.format, now)
    );

    Ok(match q.format {
        ExportFormat::Csv => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            export::to_csv(&words)?,
        )
            .into_response(),
        ExportFormat::Json => (
            [(header::CONTENT_DISPOSITION, disposition)],
            ok(VocabularyExport {
                username: auth.username.clone(),
                export_date: now,
                total_words: words.len(),
                words,
            }),
        )
            .into_response(),
    })
}
