//! Learning content: words, collocations, grammar points, word families,
//! transformation drills and reading articles.
//!
//! Anyone logged in may browse; creating content is admin-only.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use super::Pagination;
use crate::auth::{AdminContext, AuthContext};
use crate::db::content::{
    self, NewArticle, NewCollocation, NewGrammarPoint, NewTransformation, NewWord, NewWordFamily,
};
use crate::db::try_lock;
use crate::domain::{Article, Collocation, GrammarPoint, Word, WordFamily, WordTransformation};
use crate::error::{ok, ApiError, ApiResponse, ApiResult};
use crate::services::dictionary::{clean_word, DictionaryEntry};
use crate::state::AppState;

type Reply<T> = ApiResult<Json<ApiResponse<T>>>;

fn require(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{} is required", field)));
    }
    Ok(())
}

fn already_exists(what: &str, key: &str) -> ApiError {
    ApiError::bad_request(format!("{} '{}' already exists", what, key.trim()))
}

// ============================================================================
// Words
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct WordQuery {
    #[serde(default)]
    pub search: Option<String>,
}

/// GET /api/vocabulary/words
pub async fn list_words(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<WordQuery>,
    Query(page): Query<Pagination>,
) -> Reply<Vec<Word>> {
    let conn = try_lock(&state.db)?;
    let words = content::list_words(&conn, q.search.as_deref(), page.limit(), page.offset())?;
    Ok(ok(words))
}

/// POST /api/vocabulary/words
pub async fn create_word(
    State(state): State<AppState>,
    _admin: AdminContext,
    Json(input): Json<NewWord>,
) -> Reply<Word> {
    require("word", &input.word)?;
    require("meaning", &input.meaning)?;

    let conn = try_lock(&state.db)?;
    if content::find_word(&conn, &input.word)?.is_some() {
        return Err(already_exists("Word", &input.word));
    }
    let id = content::insert_word(&conn, &input)?;
    content::get_word(&conn, id)?
        .map(ok)
        .ok_or_else(|| ApiError::save("word missing after insert"))
}

/// GET /api/vocabulary/lookup/{word}
///
/// Dictionary lookups are cached; only plain letter words are sent out.
pub async fn lookup_word(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(word): Path<String>,
) -> Reply<DictionaryEntry> {
    if clean_word(&word).is_none() {
        return Err(ApiError::bad_request("Only single English words can be looked up"));
    }
    state
        .dictionary
        .lookup(&word)
        .await
        .map(ok)
        .ok_or_else(|| ApiError::not_found(format!("No dictionary entry for '{}'", word.trim())))
}

// ============================================================================
// Collocations
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct CollocationQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// GET /api/collocations
pub async fn list_collocations(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<CollocationQuery>,
    Query(page): Query<Pagination>,
) -> Reply<Vec<Collocation>> {
    let conn = try_lock(&state.db)?;
    let rows = content::list_collocations(
        &conn,
        q.search.as_deref(),
        q.category.as_deref(),
        page.limit(),
        page.offset(),
    )?;
    Ok(ok(rows))
}

/// POST /api/collocations
pub async fn create_collocation(
    State(state): State<AppState>,
    _admin: AdminContext,
    Json(input): Json<NewCollocation>,
) -> Reply<Collocation> {
    require("phrase", &input.phrase)?;
    require("meaning", &input.meaning)?;

    let conn = try_lock(&state.db)?;
    if content::find_collocation(&conn, &input.phrase)?.is_some() {
        return Err(already_exists("Collocation", &input.phrase));
    }
    let id = content::insert_collocation(&conn, &input)?;
    content::get_collocation(&conn, id)?
        .map(ok)
        .ok_or_else(|| ApiError::save("collocation missing after insert"))
}

// ============================================================================
// Grammar points
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct GrammarQuery {
    #[serde(default)]
    pub category: Option<String>,
}

/// GET /api/grammar/points
pub async fn list_grammar_points(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<GrammarQuery>,
    Query(page): Query<Pagination>,
) -> Reply<Vec<GrammarPoint>> {
    let conn = try_lock(&state.db)?;
    let rows = content::list_grammar_points(&conn, q.category.as_deref(), page.limit(), page.offset())?;
    Ok(ok(rows))
}

/// POST /api/grammar/points
pub async fn create_grammar_point(
    State(state): State<AppState>,
    _admin: AdminContext,
    Json(input): Json<NewGrammarPoint>,
) -> Reply<GrammarPoint> {
    require("name", &input.name)?;

    let conn = try_lock(&state.db)?;
    if content::find_grammar_point(&conn, &input.name)?.is_some() {
        return Err(already_exists("Grammar point", &input.name));
    }
    let id = content::insert_grammar_point(&conn, &input)?;
    content::get_grammar_point(&conn, id)?
        .map(ok)
        .ok_or_else(|| ApiError::save("grammar point missing after insert"))
}

// ============================================================================
// Word families
// ============================================================================

/// GET /api/word-families
pub async fn list_word_families(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(page): Query<Pagination>,
) -> Reply<Vec<WordFamily>> {
    let conn = try_lock(&state.db)?;
    Ok(ok(content::list_word_families(&conn, page.limit(), page.offset())?))
}

/// POST /api/word-families
pub async fn create_word_family(
    State(state): State<AppState>,
    _admin: AdminContext,
    Json(input): Json<NewWordFamily>,
) -> Reply<WordFamily> {
    require("root_word", &input.root_word)?;
    if input.members.iter().any(|m| m.word.trim().is_empty()) {
        return Err(ApiError::bad_request("Every family member needs a word"));
    }

    let conn = try_lock(&state.db)?;
    if content::find_word_family(&conn, &input.root_word)?.is_some() {
        return Err(already_exists("Word family", &input.root_word));
    }
    let id = content::insert_word_family(&conn, &input)?;
    content::get_word_family(&conn, id)?
        .map(ok)
        .ok_or_else(|| ApiError::save("word family missing after insert"))
}

// ============================================================================
// Transformation drills
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct TransformationQuery {
    #[serde(default)]
    pub difficulty: Option<i64>,
}

/// GET /api/vocabulary/transformations
pub async fn list_transformations(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<TransformationQuery>,
    Query(page): Query<Pagination>,
) -> Reply<Vec<WordTransformation>> {
    let conn = try_lock(&state.db)?;
    let rows = content::list_transformations(&conn, q.difficulty, page.limit(), page.offset())?;
    Ok(ok(rows))
}

/// POST /api/vocabulary/transformations
pub async fn create_transformation(
    State(state): State<AppState>,
    _admin: AdminContext,
    Json(input): Json<NewTransformation>,
) -> Reply<WordTransformation> {
    require("base_word", &input.base_word)?;
    require("base_meaning", &input.base_meaning)?;
    if input.transformations.is_empty() {
        return Err(ApiError::bad_request("At least one transformation is required"));
    }

    let conn = try_lock(&state.db)?;
    if content::find_transformation(&conn, &input.base_word)?.is_some() {
        return Err(already_exists("Transformation drill", &input.base_word));
    }
    let id = content::insert_transformation(&conn, &input)?;
    content::get_transformation(&conn, id)?
        .map(ok)
        .ok_or_else(|| ApiError::save("transformation missing after insert"))
}

// ============================================================================
// Reading
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ArticleQuery {
    #[serde(default)]
    pub level: Option<String>,
}

/// GET /api/reading/articles
pub async fn list_articles(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<ArticleQuery>,
    Query(page): Query<Pagination>,
) -> Reply<Vec<Article>> {
    let conn = try_lock(&state.db)?;
    let rows = content::list_articles(&conn, q.level.as_deref(), page.limit(), page.offset())?;
    Ok(ok(rows))
}

/// POST /api/reading/articles
pub async fn create_article(
    State(state): State<AppState>,
    _admin: AdminContext,
    Json(input): Json<NewArticle>,
) -> Reply<Article> {
    require("title", &input.title)?;
    require("content", &input.content)?;

    let conn = try_lock(&state.db)?;
    let id = content::insert_article(&conn, &input)?;
    content::get_article(&conn, id)?
        .map(ok)
        .ok_or_else(|| ApiError::save("article missing after insert"))
}
