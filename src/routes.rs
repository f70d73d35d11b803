//! URL layout of the JSON API.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, patch, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::handlers as auth;
use crate::handlers::{self, admin, content, mistakes, progress, providers};
use crate::state::AppState;

/// Largest accepted request body (exam uploads)
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        // Auth
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/user/change-password", post(auth::change_password))
        // Vocabulary
        .route("/api/vocabulary/words", get(content::list_words).post(content::create_word))
        .route("/api/vocabulary/lookup/{word}", get(content::lookup_word))
        .route("/api/vocabulary/progress", post(progress::record_word_progress))
        .route("/api/vocabulary/batch", get(progress::word_batch))
        .route("/api/vocabulary/stats", get(progress::word_stats))
        .route("/api/vocabulary/export", get(progress::export_vocabulary))
        .route(
            "/api/vocabulary/transformations",
            get(content::list_transformations).post(content::create_transformation),
        )
        .route(
            "/api/vocabulary/transformations/progress",
            get(progress::transformation_due).post(progress::record_transformation_progress),
        )
        // Other content
        .route("/api/collocations", get(content::list_collocations).post(content::create_collocation))
        .route("/api/grammar/points", get(content::list_grammar_points).post(content::create_grammar_point))
        .route("/api/word-families", get(content::list_word_families).post(content::create_word_family))
        .route("/api/reading/articles", get(content::list_articles).post(content::create_article))
        // Review for any item kind
        .route("/api/progress/{kind}", post(progress::record_progress))
        .route("/api/progress/{kind}/due", get(progress::due_items))
        // Mistake book
        .route("/api/mistakes", get(mistakes::list_mistakes).post(mistakes::record_mistake))
        .route("/api/mistakes/upload", post(mistakes::upload_mistakes))
        .route("/api/mistakes/{id}", patch(mistakes::update_mistake))
        // Admin
        .route("/api/admin/exam/upload", post(admin::upload_exam))
        .route("/api/admin/papers", get(admin::list_papers))
        .route("/api/admin/questions", get(admin::list_questions).post(admin::create_question))
        .route("/api/admin/library/import", post(admin::import_library))
        .route("/api/admin/import-tasks", get(admin::list_import_tasks))
        .route("/api/admin/quota", get(admin::quota))
        .route("/api/admin/users", get(auth::list_users).post(auth::create_user))
        .route("/api/admin/users/{id}", get(auth::get_user).delete(auth::delete_user))
        .route("/api/admin/users/{id}/reset-password", post(auth::reset_password))
        .route(
            "/api/admin/ai-providers",
            get(providers::list_providers).post(providers::create_provider),
        )
        .route(
            "/api/admin/ai-providers/{id}",
            put(providers::update_provider).delete(providers::delete_provider),
        )
        .route("/api/admin/ai-providers/{id}/activate", post(providers::activate_provider))
        .route("/api/admin/ai-providers/{id}/test", post(providers::test_provider))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
