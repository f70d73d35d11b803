//! Admin content pipeline: exam uploads, the question bank, library imports
//! and AI quota.

use axum::extract::{Multipart, Query, State};
use axum::Json;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Pagination, Upload};
use crate::ai::quota::{quota_info, QuotaInfo};
use crate::auth::AdminContext;
use crate::db::import_tasks::{self, ImportTask};
use crate::db::questions::{self, PaperSummary};
use crate::db::try_lock;
use crate::dedup::{question_hash, MergeStrategy};
use crate::domain::{QuestionData, QuestionRecord};
use crate::error::{ok, ok_with_message, ApiError, ApiResponse, ApiResult};
use crate::services::document::parse_document;
use crate::services::ingest::{self, IngestResult, PaperIngestReport, PaperMeta};
use crate::services::library::{self, ImportOptions, LibraryImportReport};
use crate::state::AppState;

type Reply<T> = ApiResult<Json<ApiResponse<T>>>;

// ============================================================================
// Exam papers
// ============================================================================

/// Pull the `file` part and the optional text fields out of an upload
async fn read_upload(multipart: &mut Multipart) -> ApiResult<(Upload, PaperMeta)> {
    let mut upload = None;
    let mut name = None;
    let mut version = None;
    let mut description = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed upload: {}", e)))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => upload = Some(Upload::read(field).await?),
            "name" | "version" | "description" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read field {}: {}", field_name, e)))?;
                let text = Some(text.trim().to_string()).filter(|t| !t.is_empty());
                match field_name.as_str() {
                    "name" => name = text,
                    "version" => version = text,
                    _ => description = text,
                }
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    let stem = upload
        .file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(&upload.file_name)
        .to_string();
    let meta = PaperMeta {
        name: name.unwrap_or(stem),
        version: version.unwrap_or_else(|| "1".to_string()),
        description,
        file_name: Some(upload.file_name.clone()),
    };
    Ok((upload, meta))
}

/// POST /api/admin/exam/upload
///
/// Multipart form: `file` plus optional `name`, `version`, `description`.
pub async fn upload_exam(
    State(state): State<AppState>,
    AdminContext(admin): AdminContext,
    mut multipart: Multipart,
) -> Reply<PaperIngestReport> {
    let (upload, meta) = read_upload(&mut multipart).await?;
    let items = parse_document(&upload.file_name, &upload.bytes)?;
    if items.is_empty() {
        return Err(ApiError::bad_request("No questions found in the document"));
    }

    let conn = try_lock(&state.db)?;
    let report = ingest::ingest_paper(&conn, &meta, &items, Some(admin.user_id), Utc::now())?;
    let message = format!(
        "{} new, {} duplicate, {} failed",
        report.new_count, report.duplicate_count, report.failed_count
    );
    Ok(ok_with_message(report, message))
}

/// GET /api/admin/papers
pub async fn list_papers(
    State(state): State<AppState>,
    _admin: AdminContext,
    Query(page): Query<Pagination>,
) -> Reply<Vec<PaperSummary>> {
    let conn = try_lock(&state.db)?;
    Ok(ok(questions::list_papers(&conn, page.limit())?))
}

// ============================================================================
// Question bank
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    #[serde(flatten)]
    pub question: QuestionData,
    /// Answer 409 DUPLICATE_QUESTION instead of counting another appearance
    #[serde(default)]
    pub reject_duplicates: bool,
    #[serde(default)]
    pub paper_id: Option<i64>,
    /// Position within the paper, defaults to the end
    #[serde(default)]
    pub position: Option<i64>,
}

/// POST /api/admin/questions
pub async fn create_question(
    State(state): State<AppState>,
    _admin: AdminContext,
    Json(req): Json<QuestionRequest>,
) -> Reply<IngestResult> {
    let conn = try_lock(&state.db)?;

    if req.reject_duplicates {
        let hash = question_hash(&req.question);
        if let Some(existing) = questions::get_question_by_hash(&conn, &hash)? {
            return Err(ApiError::duplicate_question(format!(
                "Question already exists (id {}, seen {} times)",
                existing.id, existing.appearance_count
            )));
        }
    }

    let paper = match req.paper_id {
        Some(paper_id) => {
            if questions::get_paper(&conn, paper_id)?.is_none() {
                return Err(ApiError::not_found(format!("Paper {} not found", paper_id)));
            }
            let position = match req.position {
                Some(p) => p,
                None => questions::get_paper_questions(&conn, paper_id)?.len() as i64 + 1,
            };
            Some((paper_id, position))
        }
        None => None,
    };

    let tx = conn.unchecked_transaction()?;
    let result = ingest::ingest_question(&tx, &req.question, paper, Utc::now())?;
    if let Some((paper_id, _)) = paper {
        questions::set_paper_question_count(&tx, paper_id)?;
    }
    tx.commit()?;

    let message = if result.is_new {
        "Question added".to_string()
    } else {
        format!("Duplicate question, seen {} times", result.appearance_count)
    };
    Ok(ok_with_message(result, message))
}

#[derive(Debug, Default, Deserialize)]
pub struct QuestionQuery {
    /// Only questions seen at least this often
    #[serde(default)]
    pub min_appearances: Option<i64>,
}

/// GET /api/admin/questions
pub async fn list_questions(
    State(state): State<AppState>,
    _admin: AdminContext,
    Query(q): Query<QuestionQuery>,
    Query(page): Query<Pagination>,
) -> Reply<Vec<QuestionRecord>> {
    let conn = try_lock(&state.db)?;
    let rows = questions::list_questions(
        &conn,
        q.min_appearances.unwrap_or(1),
        page.limit(),
        page.offset(),
    )?;
    Ok(ok(rows))
}

// ============================================================================
// Library import
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LibraryKind {
    Word,
    Collocation,
    GrammarPoint,
}

#[derive(Debug, Deserialize)]
pub struct LibraryImportRequest {
    pub kind: LibraryKind,
    #[serde(default)]
    pub strategy: MergeStrategy,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    /// Overrides the configured fuzzy-match threshold
    #[serde(default)]
    pub similarity_threshold: Option<f64>,
    pub items: Value,
}

fn parse_items<T: DeserializeOwned>(items: Value) -> ApiResult<Vec<T>> {
    serde_json::from_value(items).map_err(|e| ApiError::bad_request(format!("Invalid items: {}", e)))
}

/// POST /api/admin/library/import
pub async fn import_library(
    State(state): State<AppState>,
    AdminContext(admin): AdminContext,
    Json(req): Json<LibraryImportRequest>,
) -> Reply<LibraryImportReport> {
    let opts = ImportOptions {
        strategy: req.strategy,
        source: req.source.clone(),
        similarity_threshold: req
            .similarity_threshold
            .unwrap_or(state.config.similarity_threshold)
            .clamp(0.0, 1.0),
        fuzzy_scan_limit: state.config.fuzzy_scan_limit,
        created_by: Some(admin.user_id),
        file_name: req.file_name.clone(),
    };

    let report = match req.kind {
        LibraryKind::Word => {
            let items = parse_items(req.items)?;
            library::import_words(&state.db, &state.ai, &items, &opts).await?
        }
        LibraryKind::Collocation => {
            let items = parse_items(req.items)?;
            library::import_collocations(&state.db, &state.ai, &items, &opts).await?
        }
        LibraryKind::GrammarPoint => {
            let items = parse_items(req.items)?;
            library::import_grammar_points(&state.db, &state.ai, &items, &opts).await?
        }
    };

    let message = format!(
        "{} created, {} merged, {} skipped, {} failed",
        report.created, report.merged, report.skipped, report.failed
    );
    Ok(ok_with_message(report, message))
}

/// GET /api/admin/import-tasks
pub async fn list_import_tasks(
    State(state): State<AppState>,
    _admin: AdminContext,
    Query(page): Query<Pagination>,
) -> Reply<Vec<ImportTask>> {
    let conn = try_lock(&state.db)?;
    Ok(ok(import_tasks::list_tasks(&conn, page.limit())?))
}

// ============================================================================
// Quota
// ============================================================================

/// GET /api/admin/quota
pub async fn quota(State(state): State<AppState>, _admin: AdminContext) -> Reply<QuotaInfo> {
    let conn = try_lock(&state.db)?;
    Ok(ok(quota_info(&conn, state.config.ai.daily_quota, Utc::now())?))
}
