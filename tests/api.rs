//! End-to-end tests of the JSON API over a temporary database.

use std::time::Duration;

use axum::http::StatusCode;
use axum_extra::extract::cookie::Cookie;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use serde_json::{json, Value};
use tempfile::TempDir;

use word_tutor::auth::db::{self as auth_db, ROLE_ADMIN, ROLE_STUDENT};
use word_tutor::auth::{password, SESSION_COOKIE_NAME};
use word_tutor::config::AppConfig;
use word_tutor::db;
use word_tutor::routes::router;
use word_tutor::services::dictionary::Dictionary;
use word_tutor::state::AppState;

struct TestApp {
    server: TestServer,
    _dir: TempDir,
}

fn setup() -> TestApp {
    let dir = TempDir::new().unwrap();
    let config = AppConfig {
        database_path: dir.path().join("tutor.db"),
        ..AppConfig::default()
    };
    let pool = db::init_db(&config.database_path).unwrap();
    {
        let conn = pool.lock().unwrap();
        for (name, role) in [("admin", ROLE_ADMIN), ("alice", ROLE_STUDENT), ("bob", ROLE_STUDENT)] {
            let hash = password::hash_password("password").unwrap();
            auth_db::create_user(&conn, name, &hash, role).unwrap();
        }
    }
    // Nothing listens on the discard port, so lookups fail fast instead of leaving the machine
    let dictionary = Dictionary::with_base_url("http://127.0.0.1:9", 10, Duration::from_secs(60));
    let state = AppState::with_dictionary(pool, config, dictionary);
    TestApp {
        server: TestServer::new(router(state)).unwrap(),
        _dir: dir,
    }
}

async fn login(server: &TestServer, username: &str, password: &str) -> Cookie<'static> {
    let response = server
        .post("/api/auth/login")
        .json(&json!({ "username": username, "password": password }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK, "login as {}", username);
    response.cookie(SESSION_COOKIE_NAME)
}

async fn create_word(server: &TestServer, admin: &Cookie<'static>, word: &str) -> i64 {
    let response = server
        .post("/api/vocabulary/words")
        .add_cookie(admin.clone())
        .json(&json!({ "word": word, "meaning": format!("meaning of {}", word) }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    response.json::<Value>()["data"]["id"].as_i64().unwrap()
}

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}

#[tokio::test]
async fn test_health() {
    let app = setup();
    let response = app.server.get("/api/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.json::<Value>();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn test_requests_without_session_are_unauthorized() {
    let app = setup();
    let response = app.server.get("/api/auth/me").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let body = response.json::<Value>();
    assert_eq!(body["success"], false);
    assert_eq!(error_code(&body), "UNAUTHORIZED");
}

#[tokio::test]
async fn test_login_me_logout() {
    let app = setup();

    let bad = app
        .server
        .post("/api/auth/login")
        .json(&json!({ "username": "alice", "password": "nope" }))
        .await;
    assert_eq!(bad.status_code(), StatusCode::UNAUTHORIZED);

    let cookie = login(&app.server, "alice", "password").await;
    let me = app.server.get("/api/auth/me").add_cookie(cookie.clone()).await;
    assert_eq!(me.status_code(), StatusCode::OK);
    let body = me.json::<Value>();
    assert_eq!(body["data"]["username"], "alice");
    assert_eq!(body["data"]["is_admin"], false);

    app.server.post("/api/auth/logout").add_cookie(cookie.clone()).await;
    let after = app.server.get("/api/auth/me").add_cookie(cookie).await;
    assert_eq!(after.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_password_signs_out_other_sessions() {
    let app = setup();
    let first = login(&app.server, "alice", "password").await;
    let second = login(&app.server, "alice", "password").await;

    let short = app
        .server
        .post("/api/user/change-password")
        .add_cookie(first.clone())
        .json(&json!({ "current_password": "password", "new_password": "123" }))
        .await;
    assert_eq!(short.status_code(), StatusCode::BAD_REQUEST);

    let changed = app
        .server
        .post("/api/user/change-password")
        .add_cookie(first.clone())
        .json(&json!({ "current_password": "password", "new_password": "new-secret" }))
        .await;
    assert_eq!(changed.status_code(), StatusCode::OK);

    let kept = app.server.get("/api/auth/me").add_cookie(first).await;
    assert_eq!(kept.status_code(), StatusCode::OK);
    let revoked = app.server.get("/api/auth/me").add_cookie(second).await;
    assert_eq!(revoked.status_code(), StatusCode::UNAUTHORIZED);

    login(&app.server, "alice", "new-secret").await;
}

#[tokio::test]
async fn test_content_creation_is_admin_only() {
    let app = setup();
    let student = login(&app.server, "alice", "password").await;
    let response = app
        .server
        .post("/api/vocabulary/words")
        .add_cookie(student.clone())
        .json(&json!({ "word": "apple", "meaning": "苹果" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(&response.json::<Value>()), "FORBIDDEN");

    let admin = login(&app.server, "admin", "password").await;
    create_word(&app.server, &admin, "apple").await;

    let dup = app
        .server
        .post("/api/vocabulary/words")
        .add_cookie(admin)
        .json(&json!({ "word": "Apple", "meaning": "again" }))
        .await;
    assert_eq!(dup.status_code(), StatusCode::BAD_REQUEST);

    let list = app.server.get("/api/vocabulary/words").add_cookie(student).await;
    assert_eq!(list.json::<Value>()["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_wrong_answer_schedules_review_and_files_mistake() {
    let app = setup();
    let admin = login(&app.server, "admin", "password").await;
    let word_id = create_word(&app.server, &admin, "abandon").await;
    let alice = login(&app.server, "alice", "password").await;

    let batch = app.server.get("/api/vocabulary/batch").add_cookie(alice.clone()).await;
    let body = batch.json::<Value>();
    assert_eq!(body["data"]["new_count"], 1);

    let response = app
        .server
        .post("/api/vocabulary/progress")
        .add_cookie(alice.clone())
        .json(&json!({
            "word_id": word_id,
            "is_correct": false,
            "mistake": { "question": "Translate: 放弃", "wrong_answer": "abondon", "correct_answer": "abandon" }
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.json::<Value>();
    assert_eq!(body["data"]["progress"]["mastery_level"], 0);
    assert_eq!(body["data"]["progress"]["error_count"], 1);
    let mistake_id = body["data"]["mistake_id"].as_i64().unwrap();

    let mistakes = app.server.get("/api/mistakes").add_cookie(alice.clone()).await;
    let list = mistakes.json::<Value>();
    assert_eq!(list["data"][0]["id"], mistake_id);
    assert_eq!(list["data"][0]["item_kind"], "word");

    let patched = app
        .server
        .patch(&format!("/api/mistakes/{}", mistake_id))
        .add_cookie(alice.clone())
        .json(&json!({ "mastered": true }))
        .await;
    assert_eq!(patched.json::<Value>()["data"]["mastered"], true);

    // Another learner cannot touch it
    let bob = login(&app.server, "bob", "password").await;
    let other = app
        .server
        .patch(&format!("/api/mistakes/{}", mistake_id))
        .add_cookie(bob)
        .json(&json!({ "mastered": false }))
        .await;
    assert_eq!(other.status_code(), StatusCode::NOT_FOUND);

    let stats = app.server.get("/api/vocabulary/stats").add_cookie(alice).await;
    let stats = stats.json::<Value>();
    assert_eq!(stats["data"]["studied"], 1);
    assert_eq!(stats["data"]["accuracy"], 0);
}

#[tokio::test]
async fn test_generic_progress_routes() {
    let app = setup();
    let admin = login(&app.server, "admin", "password").await;
    let created = app
        .server
        .post("/api/collocations")
        .add_cookie(admin)
        .json(&json!({ "phrase": "give up", "meaning": "放弃" }))
        .await;
    let id = created.json::<Value>()["data"]["id"].as_i64().unwrap();
    let alice = login(&app.server, "alice", "password").await;

    let recorded = app
        .server
        .post("/api/progress/collocation")
        .add_cookie(alice.clone())
        .json(&json!({ "item_id": id, "is_correct": true }))
        .await;
    assert_eq!(recorded.json::<Value>()["data"]["progress"]["mastery_level"], 1);

    let due = app.server.get("/api/progress/collocation/due").add_cookie(alice.clone()).await;
    let due = due.json::<Value>();
    assert_eq!(due["data"]["items"].as_array().unwrap().len(), 0);
    assert!(due["data"]["next_review_in"].is_string());

    let missing = app
        .server
        .post("/api/progress/collocation")
        .add_cookie(alice.clone())
        .json(&json!({ "item_id": id + 100, "is_correct": true }))
        .await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

    let unknown = app.server.get("/api/progress/article/due").add_cookie(alice).await;
    assert_eq!(unknown.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_question_ingest_counts_and_rejects_duplicates() {
    let app = setup();
    let admin = login(&app.server, "admin", "password").await;
    let question = json!({ "question": "She ___ to school.", "options": ["go", "goes"] });

    let first = app
        .server
        .post("/api/admin/questions")
        .add_cookie(admin.clone())
        .json(&question)
        .await;
    assert_eq!(first.json::<Value>()["data"]["is_new"], true);

    let reordered = json!({ "question": "She ___ to school.", "options": ["goes", "go"] });
    let second = app
        .server
        .post("/api/admin/questions")
        .add_cookie(admin.clone())
        .json(&reordered)
        .await;
    let body = second.json::<Value>();
    assert_eq!(body["data"]["is_new"], false);
    assert_eq!(body["data"]["appearance_count"], 2);

    let rejected = app
        .server
        .post("/api/admin/questions")
        .add_cookie(admin)
        .json(&json!({ "question": "She ___ to school.", "options": ["go", "goes"], "reject_duplicates": true }))
        .await;
    assert_eq!(rejected.status_code(), StatusCode::CONFLICT);
    assert_eq!(error_code(&rejected.json::<Value>()), "DUPLICATE_QUESTION");
}

#[tokio::test]
async fn test_exam_upload() {
    let app = setup();
    let admin = login(&app.server, "admin", "password").await;
    let text = "1. She ___ to school every day.\nA. go\nB. goes\nAnswer: B\n\n2. I have lived here ___ 2010.\nAnswer: since\n";

    let form = MultipartForm::new().add_text("name", "Mock exam 1").add_part(
        "file",
        Part::bytes(text.as_bytes().to_vec())
            .file_name("mock.txt")
            .mime_type("text/plain"),
    );
    let response = app
        .server
        .post("/api/admin/exam/upload")
        .add_cookie(admin.clone())
        .multipart(form)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.json::<Value>();
    assert_eq!(body["data"]["new_count"], 2);
    assert_eq!(body["data"]["duplicate_count"], 0);

    let papers = app.server.get("/api/admin/papers").add_cookie(admin.clone()).await;
    let papers = papers.json::<Value>();
    assert_eq!(papers["data"][0]["name"], "Mock exam 1");
    assert_eq!(papers["data"][0]["question_count"], 2);

    let pdf = MultipartForm::new().add_part(
        "file",
        Part::bytes(b"%PDF-1.4".to_vec())
            .file_name("scan.pdf")
            .mime_type("application/pdf"),
    );
    let rejected = app
        .server
        .post("/api/admin/exam/upload")
        .add_cookie(admin.clone())
        .multipart(pdf)
        .await;
    assert_eq!(rejected.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&rejected.json::<Value>()), "UNSUPPORTED_FORMAT");

    let tasks = app.server.get("/api/admin/import-tasks").add_cookie(admin).await;
    assert_eq!(tasks.json::<Value>()["data"][0]["task_type"], "exam_paper");
}

#[tokio::test]
async fn test_library_import_replace_and_skip() {
    let app = setup();
    let admin = login(&app.server, "admin", "password").await;
    app.server
        .post("/api/collocations")
        .add_cookie(admin.clone())
        .json(&json!({ "phrase": "give up", "meaning": "old" }))
        .await;

    let skipped = app
        .server
        .post("/api/admin/library/import")
        .add_cookie(admin.clone())
        .json(&json!({
            "kind": "collocation",
            "strategy": "skip",
            "items": [{ "phrase": "give up", "meaning": "放弃" }]
        }))
        .await;
    assert_eq!(skipped.json::<Value>()["data"]["skipped"], 1);

    let replaced = app
        .server
        .post("/api/admin/library/import")
        .add_cookie(admin.clone())
        .json(&json!({
            "kind": "collocation",
            "strategy": "replace",
            "items": [
                { "phrase": "give up", "meaning": "放弃" },
                { "phrase": "look forward to", "meaning": "期待" }
            ]
        }))
        .await;
    let report = replaced.json::<Value>();
    assert_eq!(report["data"]["merged"], 1);
    assert_eq!(report["data"]["created"], 1);

    let list = app
        .server
        .get("/api/collocations")
        .add_query_param("search", "give up")
        .add_cookie(admin)
        .await;
    let list = list.json::<Value>();
    assert_eq!(list["data"][0]["meaning"], "放弃");
}

#[tokio::test]
async fn test_ai_provider_admin() {
    let app = setup();
    let admin = login(&app.server, "admin", "password").await;

    let created = app
        .server
        .post("/api/admin/ai-providers")
        .add_cookie(admin.clone())
        .json(&json!({
            "provider_name": "deepseek",
            "model_name": "deepseek-chat",
            "api_key": "sk-1234567890abcdef"
        }))
        .await;
    assert_eq!(created.status_code(), StatusCode::OK);
    let body = created.json::<Value>();
    assert_eq!(body["data"]["is_active"], true);
    assert_eq!(body["data"]["api_key"], "sk-1****cdef");
    let id = body["data"]["id"].as_i64().unwrap();

    let list = app.server.get("/api/admin/ai-providers").add_cookie(admin.clone()).await;
    assert_eq!(list.json::<Value>()["data"][0]["api_key"], "sk-1****cdef");

    let quota = app.server.get("/api/admin/quota").add_cookie(admin.clone()).await;
    let quota = quota.json::<Value>();
    assert_eq!(quota["data"]["used"], 0);
    assert_eq!(quota["data"]["daily_limit"], 1500);

    let deleted = app
        .server
        .delete(&format!("/api/admin/ai-providers/{}", id))
        .add_cookie(admin.clone())
        .await;
    assert_eq!(deleted.status_code(), StatusCode::OK);
    let missing = app
        .server
        .post(&format!("/api/admin/ai-providers/{}/activate", id))
        .add_cookie(admin)
        .await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_creates_users() {
    let app = setup();
    let admin = login(&app.server, "admin", "password").await;

    let created = app
        .server
        .post("/api/admin/users")
        .add_cookie(admin.clone())
        .json(&json!({ "username": "carol", "password": "carol-pass" }))
        .await;
    assert_eq!(created.json::<Value>()["data"]["role"], "student");

    let taken = app
        .server
        .post("/api/admin/users")
        .add_cookie(admin.clone())
        .json(&json!({ "username": "carol", "password": "carol-pass" }))
        .await;
    assert_eq!(taken.status_code(), StatusCode::BAD_REQUEST);

    let users = app.server.get("/api/admin/users").add_cookie(admin).await;
    assert_eq!(users.json::<Value>()["data"].as_array().unwrap().len(), 4);

    login(&app.server, "carol", "carol-pass").await;
}

#[tokio::test]
async fn test_mistake_upload_rejects_repeat_questions() {
    let app = setup();
    let alice = login(&app.server, "alice", "password").await;
    let upload = |text: &str| {
        MultipartForm::new().add_part(
            "file",
            Part::bytes(text.as_bytes().to_vec())
                .file_name("my-mistakes.txt")
                .mime_type("text/plain"),
        )
    };

    let first = app
        .server
        .post("/api/mistakes/upload")
        .add_cookie(alice.clone())
        .multipart(upload("She ___ to school.\r\nA. go\r\nB. goes\r\nAnswer: B\r\n"))
        .await;
    assert_eq!(first.status_code(), StatusCode::OK);
    assert_eq!(first.json::<Value>()["data"]["added"].as_array().unwrap().len(), 1);

    let again = app
        .server
        .post("/api/mistakes/upload")
        .add_cookie(alice.clone())
        .multipart(upload("She ___ to school.\nA. goes\nB. go\nAnswer: A\n"))
        .await;
    assert_eq!(again.status_code(), StatusCode::CONFLICT);
    assert_eq!(error_code(&again.json::<Value>()), "DUPLICATE_QUESTION");

    let list = app.server.get("/api/mistakes").add_cookie(alice).await;
    let list = list.json::<Value>();
    assert_eq!(list["data"].as_array().unwrap().len(), 1);
    assert_eq!(list["data"][0]["correct_answer"], "B");

    let anonymous = app
        .server
        .post("/api/mistakes/upload")
        .multipart(upload("Q"))
        .await;
    assert_eq!(anonymous.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_vocabulary_export() {
    let app = setup();
    let admin = login(&app.server, "admin", "password").await;
    let word_id = create_word(&app.server, &admin, "zeal").await;
    create_word(&app.server, &admin, "apple").await;
    let alice = login(&app.server, "alice", "password").await;

    app.server
        .post("/api/vocabulary/progress")
        .add_cookie(alice.clone())
        .json(&json!({ "word_id": word_id, "is_correct": true }))
        .await;

    let json_export = app.server.get("/api/vocabulary/export").add_cookie(alice.clone()).await;
    assert_eq!(json_export.status_code(), StatusCode::OK);
    let disposition = json_export.header("content-disposition");
    let disposition = disposition.to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"vocabulary_alice_"));
    assert!(disposition.ends_with(".json\""));
    let body = json_export.json::<Value>();
    assert_eq!(body["data"]["total_words"], 2);
    assert_eq!(body["data"]["words"][0]["word"], "apple");
    assert_eq!(body["data"]["words"][0]["mastery_level"], 0);
    assert_eq!(body["data"]["words"][1]["word"], "zeal");
    assert_eq!(body["data"]["words"][1]["mastery_level"], 1);
    assert_eq!(body["data"]["words"][1]["review_count"], 1);

    let csv_export = app
        .server
        .get("/api/vocabulary/export")
        .add_query_param("format", "csv")
        .add_cookie(alice)
        .await;
    assert_eq!(csv_export.status_code(), StatusCode::OK);
    assert!(csv_export.header("content-type").to_str().unwrap().starts_with("text/csv"));
    let bytes = csv_export.as_bytes();
    assert_eq!(&bytes[..3], &[0xEF, 0xBB, 0xBF]);
    let text = std::str::from_utf8(&bytes[3..]).unwrap();
    assert_eq!(text.lines().count(), 3);
    assert!(text.lines().nth(2).unwrap().starts_with("zeal,,meaning of zeal,,,1,1,1,0,"));
}

#[tokio::test]
async fn test_admin_resets_and_deletes_users() {
    let app = setup();
    let admin = login(&app.server, "admin", "password").await;
    let alice = login(&app.server, "alice", "password").await;

    let users = app.server.get("/api/admin/users").add_cookie(admin.clone()).await;
    let users = users.json::<Value>();
    let id_of = |name: &str| {
        users["data"]
            .as_array()
            .unwrap()
            .iter()
            .find(|u| u["username"] == name)
            .unwrap()["id"]
            .as_i64()
            .unwrap()
    };
    let (admin_id, alice_id, bob_id) = (id_of("admin"), id_of("alice"), id_of("bob"));

    let forbidden = app
        .server
        .post(&format!("/api/admin/users/{}/reset-password", bob_id))
        .add_cookie(alice.clone())
        .json(&json!({ "new_password": "new-secret" }))
        .await;
    assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);

    let reset = app
        .server
        .post(&format!("/api/admin/users/{}/reset-password", alice_id))
        .add_cookie(admin.clone())
        .json(&json!({ "new_password": "new-secret" }))
        .await;
    assert_eq!(reset.status_code(), StatusCode::OK);

    // The old session is gone and only the new password works
    let me = app.server.get("/api/auth/me").add_cookie(alice).await;
    assert_eq!(me.status_code(), StatusCode::UNAUTHORIZED);
    let old = app
        .server
        .post("/api/auth/login")
        .json(&json!({ "username": "alice", "password": "password" }))
        .await;
    assert_eq!(old.status_code(), StatusCode::UNAUTHORIZED);
    login(&app.server, "alice", "new-secret").await;

    let detail = app
        .server
        .get(&format!("/api/admin/users/{}", bob_id))
        .add_cookie(admin.clone())
        .await;
    assert_eq!(detail.json::<Value>()["data"]["username"], "bob");

    let own = app
        .server
        .delete(&format!("/api/admin/users/{}", admin_id))
        .add_cookie(admin.clone())
        .await;
    assert_eq!(own.status_code(), StatusCode::BAD_REQUEST);

    let deleted = app
        .server
        .delete(&format!("/api/admin/users/{}", bob_id))
        .add_cookie(admin.clone())
        .await;
    assert_eq!(deleted.status_code(), StatusCode::OK);

    let missing = app
        .server
        .get(&format!("/api/admin/users/{}", bob_id))
        .add_cookie(admin)
        .await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_pagination_from_query_string() {
    let app = setup();
    let admin = login(&app.server, "admin", "password").await;
    for word in ["apple", "banana", "cherry"] {
        create_word(&app.server, &admin, word).await;
    }

    let page = app
        .server
        .get("/api/vocabulary/words")
        .add_query_param("limit", 2)
        .add_query_param("offset", 1)
        .add_cookie(admin)
        .await;
    assert_eq!(page.status_code(), StatusCode::OK);
    assert_eq!(page.json::<Value>()["data"].as_array().unwrap().len(), 2);
}
