pub mod content;
pub mod import_tasks;
pub mod mistakes;
pub mod progress;
pub mod providers;
pub mod questions;
pub mod quota;
pub mod schema;
pub mod seed;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Result};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use schema::run_migrations;

pub type DbPool = Arc<Mutex<Connection>>;

/// Extension trait for logging errors before discarding them
pub trait LogOnError<T> {
    /// Log the error at warn level and return None
    fn log_warn(self, context: &str) -> Option<T>;
    /// Log the error at warn level and return the default
    fn log_warn_default(self, context: &str) -> T
    where
        T: Default;
}

impl<T, E: std::fmt::Display> LogOnError<T> for std::result::Result<T, E> {
    fn log_warn(self, context: &str) -> Option<T> {
        match self {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("{}: {}", context, e);
                None
            }
        }
    }

    fn log_warn_default(self, context: &str) -> T
    where
        T: Default,
    {
        match self {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("{}: {}", context, e);
                T::default()
            }
        }
    }
}

/// Error returned when database lock cannot be acquired
#[derive(Debug)]
pub struct DbLockError;

impl std::fmt::Display for DbLockError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "Database unavailable")
  }
}

impl std::error::Error for DbLockError {}

/// Try to acquire the database lock, returning an error if poisoned
pub fn try_lock(pool: &DbPool) -> std::result::Result<MutexGuard<'_, Connection>, DbLockError> {
  pool.lock().map_err(|_: PoisonError<_>| {
    tracing::error!("Database mutex poisoned - a thread panicked while holding the lock");
    DbLockError
  })
}

pub fn init_db(path: &Path) -> Result<DbPool> {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).ok();
  }

  // Create backup before migrations if database exists
  if path.exists() {
    let backup_path = path.with_extension("db.backup");
    if let Err(e) = std::fs::copy(path, &backup_path) {
      tracing::warn!("Could not create database backup: {}", e);
    }
  }

  let conn = open(path)?;
  Ok(Arc::new(Mutex::new(conn)))
}

/// Open a connection with foreign keys enabled and the schema up to date
pub fn open(path: &Path) -> Result<Connection> {
  let conn = Connection::open(path)?;
  conn.execute_batch("PRAGMA foreign_keys = ON;")?;
  run_migrations(&conn)?;
  Ok(conn)
}

/// Fixed-width UTC timestamp so that text comparison matches time order
pub fn ts(dt: &DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_ts(s: &str) -> DateTime<Utc> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .unwrap_or_else(|_| Utc::now())
}

/// Decode a JSON text column, falling back to the default for NULL or bad data
pub(crate) fn json_column<T: DeserializeOwned + Default>(raw: Option<String>) -> T {
  raw
    .and_then(|s| serde_json::from_str(&s).log_warn("Malformed JSON column"))
    .unwrap_or_default()
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> String {
  serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;

  #[test]
  fn test_ts_sorts_as_text() {
    let a = Utc::now();
    let b = a + Duration::milliseconds(1);
    let c = a + Duration::hours(30);
    assert!(ts(&a) < ts(&b));
    assert!(ts(&b) < ts(&c));
    assert_eq!(ts(&a).len(), ts(&c).len());
  }

  #[test]
  fn test_ts_roundtrip() {
    let now = Utc::now();
    let parsed = parse_ts(&ts(&now));
    assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
  }

  #[test]
  fn test_json_column_fallback() {
    let v: Vec<String> = json_column(Some("[\"a\",\"b\"]".into()));
    assert_eq!(v, vec!["a", "b"]);
    let v: Vec<String> = json_column(Some("not json".into()));
    assert!(v.is_empty());
    let v: Vec<String> = json_column(None);
    assert!(v.is_empty());
  }
}
