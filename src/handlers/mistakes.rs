//! The learner's mistake book.

use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use super::{Pagination, Upload};
use crate::auth::AuthContext;
use crate::db::{mistakes, try_lock};
use crate::domain::MistakeRecord;
use crate::error::{ok, ok_with_message, ApiError, ApiResponse, ApiResult};
use crate::services::document::parse_document;
use crate::services::ingest::{self, MistakeSubmission, MistakeUploadReport};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct MistakeQuery {
    #[serde(default)]
    pub mastered: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct MistakeUpdate {
    pub mastered: bool,
}

/// GET /api/mistakes
pub async fn list_mistakes(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<MistakeQuery>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<ApiResponse<Vec<MistakeRecord>>>> {
    let conn = try_lock(&state.db)?;
    let rows = mistakes::list_mistakes(&conn, auth.user_id, q.mastered, page.limit(), page.offset())?;
    Ok(ok(rows))
}

/// POST /api/mistakes
pub async fn record_mistake(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(sub): Json<MistakeSubmission>,
) -> ApiResult<Json<ApiResponse<MistakeRecord>>> {
    let conn = try_lock(&state.db)?;
    let id = ingest::record_mistake_by_question(&conn, auth.user_id, &sub, Utc::now())?;
    mistakes::get_mistake(&conn, auth.user_id, id)?
        .map(ok)
        .ok_or_else(|| ApiError::save("mistake missing after upsert"))
}

/// PATCH /api/mistakes/{id}
pub async fn update_mistake(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(update): Json<MistakeUpdate>,
) -> ApiResult<Json<ApiResponse<MistakeRecord>>> {
    let conn = try_lock(&state.db)?;
    if !mistakes::set_mastered(&conn, auth.user_id, id, update.mastered)? {
        return Err(ApiError::not_found(format!("Mistake {} not found", id)));
    }
    mistakes::get_mistake(&conn, auth.user_id, id)?
        .map(ok)
        .ok_or_else(|| ApiError::not_found(format!("Mistake {} not found", id)))
}

/// POST /api/mistakes/upload
///
/// Multipart form with a `file` part holding one or more questions. A file
/// whose questions are all in the mistake book already is answered with 409.
pub async fn upload_mistakes(
    State(state): State<AppState>,
    auth: AuthContext,
    mut multipart: Multipart,
) -> ApiResult<Json<ApiResponse<MistakeUploadReport>>> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed upload: {}", e)))?
    {
        if field.name() == Some("file") {
            upload = Some(Upload::read(field).await?);
        }
    }
    let upload = upload.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    let items = parse_document(&upload.file_name, &upload.bytes)?;

    let conn = try_lock(&state.db)?;
    let report = ingest::upload_mistakes(&conn, auth.user_id, &items, Utc::now())?;
    let message = format!(
        "{} added, {} already in your mistake book",
        report.added.len(),
        report.duplicates.len()
    );
    Ok(ok_with_message(report, message))
}
