//! Test utilities for database setup.
//!
//! Reuses the production schema initialization so tests never carry their
//! own copy of the table definitions.

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use crate::auth::{db as auth_db, password};
use crate::db::{self, DbPool};

/// Test environment with a file-backed tutor.db carrying the full schema.
///
/// The temporary directory is removed when dropped.
pub struct TestEnv {
    /// Temporary directory (kept alive for database file persistence)
    pub temp: TempDir,
    /// Connection with all migrations applied
    pub conn: Connection,
}

impl TestEnv {
    pub fn new() -> rusqlite::Result<Self> {
        let temp =
            TempDir::new().map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        let conn = db::open(&temp.path().join("tutor.db"))?;
        Ok(Self { temp, conn })
    }

    /// Get the temporary directory path for creating test files.
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Insert a learner and return its id
    pub fn user(&self, username: &str) -> i64 {
        create_test_user(&self.conn, username, "password", "student")
    }
}

/// In-memory pool with the production schema
pub fn memory_pool() -> DbPool {
    let conn = Connection::open_in_memory().expect("open in-memory database");
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .expect("enable foreign keys");
    db::run_migrations(&conn).expect("run migrations");
    Arc::new(Mutex::new(conn))
}

/// Create a user with a real password hash
pub fn create_test_user(conn: &Connection, username: &str, plain: &str, role: &str) -> i64 {
    let hash = password::hash_password(plain).expect("hash password");
    auth_db::create_user(conn, username, &hash, role).expect("create user")
}
