//! Schema for tutor.db.
//!
//! Version-gated migrations: each step checks the recorded version, runs once,
//! then records itself in `db_version`. New databases walk every step in order.

use chrono::Utc;
use rusqlite::{params, Connection, Result};

/// Current schema version
/// Increment this when adding a new migration
pub const DB_VERSION: i32 = 4;

pub fn run_migrations(conn: &Connection) -> Result<()> {
  // Bootstrap: ensure db_version table exists (needed to check version)
  conn.execute_batch(
    r#"
    CREATE TABLE IF NOT EXISTS db_version (
      version INTEGER PRIMARY KEY,
      applied_at TEXT NOT NULL,
      description TEXT
    );
    "#,
  )?;

  let current_version = get_schema_version(conn)?;
  tracing::debug!("tutor.db schema version: {}", current_version);

  if current_version < 1 {
    migrate_v0_to_v1(conn)?;
  }
  if current_version < 2 {
    migrate_v1_to_v2(conn)?;
  }
  if current_version < 3 {
    migrate_v2_to_v3(conn)?;
  }
  if current_version < 4 {
    migrate_v3_to_v4(conn)?;
  }

  Ok(())
}

// ============================================================
// VERSION-GATED MIGRATIONS
// ============================================================

/// v0→v1: Users, sessions, learning content and per-user progress
fn migrate_v0_to_v1(conn: &Connection) -> Result<()> {
  tracing::info!("Running migration v0→v1: Create base tables");

  let tx = conn.unchecked_transaction()?;
  tx.execute_batch(
    r#"
    CREATE TABLE IF NOT EXISTS users (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      username TEXT NOT NULL UNIQUE COLLATE NOCASE,
      password_hash TEXT NOT NULL,
      role TEXT NOT NULL DEFAULT 'student',
      created_at TEXT NOT NULL,
      last_login_at TEXT
    );

    CREATE TABLE IF NOT EXISTS sessions (
      id TEXT PRIMARY KEY,
      user_id INTEGER NOT NULL,
      created_at TEXT NOT NULL,
      expires_at TEXT NOT NULL,
      last_access_at TEXT NOT NULL,
      FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS words (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      word TEXT NOT NULL UNIQUE COLLATE NOCASE,
      phonetic TEXT,
      meaning TEXT NOT NULL,
      example TEXT,
      example_translation TEXT,
      difficulty INTEGER NOT NULL DEFAULT 1,
      source TEXT,
      created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS collocations (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      phrase TEXT NOT NULL UNIQUE COLLATE NOCASE,
      meaning TEXT NOT NULL,
      example TEXT,
      category TEXT,
      difficulty INTEGER NOT NULL DEFAULT 1,
      source TEXT,
      created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS grammar_points (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      name TEXT NOT NULL UNIQUE COLLATE NOCASE,
      category TEXT,
      description TEXT,
      examples TEXT NOT NULL DEFAULT '[]',
      level INTEGER NOT NULL DEFAULT 1,
      source TEXT,
      created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS word_families (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      root_word TEXT NOT NULL UNIQUE COLLATE NOCASE,
      meaning TEXT,
      members TEXT NOT NULL DEFAULT '[]',
      created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS word_transformations (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      base_word TEXT NOT NULL UNIQUE COLLATE NOCASE,
      base_meaning TEXT NOT NULL,
      transformations TEXT NOT NULL DEFAULT '[]',
      difficulty INTEGER NOT NULL DEFAULT 1,
      created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS articles (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      title TEXT NOT NULL,
      content TEXT NOT NULL,
      level TEXT NOT NULL DEFAULT 'intermediate',
      word_count INTEGER NOT NULL DEFAULT 0,
      read_time INTEGER NOT NULL DEFAULT 1,
      category TEXT,
      questions TEXT NOT NULL DEFAULT '[]',
      created_at TEXT NOT NULL
    );

    -- One row per (learner, item); updated in place on every answer
    CREATE TABLE IF NOT EXISTS learning_progress (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      user_id INTEGER NOT NULL,
      item_kind TEXT NOT NULL,
      item_id INTEGER NOT NULL,
      mastery_level INTEGER NOT NULL DEFAULT 0,
      review_count INTEGER NOT NULL DEFAULT 0,
      correct_count INTEGER NOT NULL DEFAULT 0,
      error_count INTEGER NOT NULL DEFAULT 0,
      consecutive_correct INTEGER NOT NULL DEFAULT 0,
      last_review_at TEXT NOT NULL,
      next_review_at TEXT NOT NULL,
      created_at TEXT NOT NULL,
      updated_at TEXT NOT NULL,
      UNIQUE (user_id, item_kind, item_id),
      FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
    CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
    CREATE INDEX IF NOT EXISTS idx_progress_due ON learning_progress(user_id, item_kind, next_review_at);
    "#,
  )?;
  record_version(&tx, 1, "Create base tables (users, sessions, content, learning_progress)")?;
  tx.commit()
}

/// v1→v2: Question bank, papers and mistakes
fn migrate_v1_to_v2(conn: &Connection) -> Result<()> {
  tracing::info!("Running migration v1→v2: Add question bank");

  let tx = conn.unchecked_transaction()?;
  tx.execute_batch(
    r#"
    CREATE TABLE IF NOT EXISTS questions (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      question_hash TEXT NOT NULL UNIQUE,
      question TEXT NOT NULL,
      question_type TEXT NOT NULL DEFAULT 'choice',
      options TEXT NOT NULL DEFAULT '[]',
      correct_answer TEXT,
      explanation TEXT,
      appearance_count INTEGER NOT NULL DEFAULT 1,
      first_seen_at TEXT NOT NULL,
      last_seen_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS papers (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      name TEXT NOT NULL,
      version TEXT NOT NULL DEFAULT '1',
      description TEXT,
      file_name TEXT,
      created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS question_papers (
      question_id INTEGER NOT NULL,
      paper_id INTEGER NOT NULL,
      position INTEGER,
      PRIMARY KEY (question_id, paper_id),
      FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE,
      FOREIGN KEY (paper_id) REFERENCES papers(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS mistakes (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      user_id INTEGER NOT NULL,
      item_kind TEXT,
      item_id INTEGER,
      question_id INTEGER,
      question TEXT NOT NULL,
      wrong_answer TEXT,
      correct_answer TEXT,
      explanation TEXT,
      attempt_count INTEGER NOT NULL DEFAULT 1,
      mastered INTEGER NOT NULL DEFAULT 0,
      first_wrong_at TEXT NOT NULL,
      last_wrong_at TEXT NOT NULL,
      UNIQUE (user_id, question),
      FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
      FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE SET NULL
    );

    CREATE INDEX IF NOT EXISTS idx_question_papers_paper ON question_papers(paper_id);
    CREATE INDEX IF NOT EXISTS idx_mistakes_user ON mistakes(user_id, mastered);
    "#,
  )?;
  record_version(&tx, 2, "Add question bank (questions, papers, question_papers, mistakes)")?;
  tx.commit()
}

/// v2→v3: AI provider credentials and the persistent daily quota counter
fn migrate_v2_to_v3(conn: &Connection) -> Result<()> {
  tracing::info!("Running migration v2→v3: Add AI providers and quota");

  let tx = conn.unchecked_transaction()?;
  tx.execute_batch(
    r#"
    CREATE TABLE IF NOT EXISTS ai_providers (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      provider_name TEXT NOT NULL,
      model_name TEXT NOT NULL,
      api_key TEXT NOT NULL,
      base_url TEXT,
      is_active INTEGER NOT NULL DEFAULT 0,
      priority INTEGER NOT NULL DEFAULT 0,
      config TEXT NOT NULL DEFAULT '{}',
      created_at TEXT NOT NULL,
      updated_at TEXT NOT NULL
    );

    -- One row per UTC day
    CREATE TABLE IF NOT EXISTS ai_quota_usage (
      day TEXT PRIMARY KEY,
      call_count INTEGER NOT NULL DEFAULT 0,
      updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_ai_providers_active ON ai_providers(is_active, priority);
    "#,
  )?;
  record_version(&tx, 3, "Add ai_providers and ai_quota_usage")?;
  tx.commit()
}

/// v3→v4: Import audit log
fn migrate_v3_to_v4(conn: &Connection) -> Result<()> {
  tracing::info!("Running migration v3→v4: Add import tasks");

  let tx = conn.unchecked_transaction()?;
  tx.execute_batch(
    r#"
    CREATE TABLE IF NOT EXISTS import_tasks (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      task_type TEXT NOT NULL,
      file_name TEXT,
      strategy TEXT,
      status TEXT NOT NULL DEFAULT 'pending',
      total_items INTEGER NOT NULL DEFAULT 0,
      processed_items INTEGER NOT NULL DEFAULT 0,
      new_items INTEGER NOT NULL DEFAULT 0,
      duplicate_items INTEGER NOT NULL DEFAULT 0,
      failed_items INTEGER NOT NULL DEFAULT 0,
      error_message TEXT,
      created_by INTEGER,
      created_at TEXT NOT NULL,
      completed_at TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_import_tasks_created ON import_tasks(created_at);
    "#,
  )?;
  add_column_if_missing(&tx, "papers", "question_count", "INTEGER NOT NULL DEFAULT 0")?;
  record_version(&tx, 4, "Add import_tasks and papers.question_count")?;
  tx.commit()
}

// ============================================================
// MIGRATION HELPERS
// ============================================================

/// Record a schema version after successful migration
fn record_version(conn: &Connection, version: i32, description: &str) -> Result<()> {
  let now = Utc::now().to_rfc3339();
  conn.execute(
    "INSERT INTO db_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
    params![version, now, description],
  )?;
  tracing::info!("Recorded schema version {} - {}", version, description);
  Ok(())
}

/// Get current schema version (0 if no versions recorded)
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
  conn.query_row(
    "SELECT COALESCE(MAX(version), 0) FROM db_version",
    [],
    |row| row.get(0),
  )
}

/// Check if a column exists in a table
fn column_exists(conn: &Connection, table: &str, column: &str) -> bool {
  conn
    .prepare(&format!("SELECT {} FROM {} LIMIT 1", column, table))
    .is_ok()
}

/// Add a column if it doesn't already exist
fn add_column_if_missing(conn: &Connection, table: &str, column: &str, column_def: &str) -> Result<()> {
  if !column_exists(conn, table, column) {
    conn.execute(
      &format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, column_def),
      [],
    )?;
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_migrations_reach_latest_version() {
    let conn = Connection::open_in_memory().unwrap();
    run_migrations(&conn).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), DB_VERSION);
  }

  #[test]
  fn test_migrations_idempotent() {
    let conn = Connection::open_in_memory().unwrap();
    run_migrations(&conn).unwrap();
    run_migrations(&conn).unwrap();
    let rows: i64 = conn
      .query_row("SELECT COUNT(*) FROM db_version", [], |r| r.get(0))
      .unwrap();
    assert_eq!(rows, DB_VERSION as i64);
  }

  #[test]
  fn test_question_hash_is_unique() {
    let conn = Connection::open_in_memory().unwrap();
    run_migrations(&conn).unwrap();
    let insert = "INSERT INTO questions (question_hash, question, first_seen_at, last_seen_at) VALUES ('h', 'q', 'x', 'x')";
    conn.execute(insert, []).unwrap();
    assert!(conn.execute(insert, []).is_err());
  }
}
