//! Audit log of content imports

use chrono::Utc;
use rusqlite::{params, Connection, Result};
use serde::Serialize;

use super::ts;

#[derive(Debug, Clone, Serialize)]
pub struct ImportTask {
  pub id: i64,
  pub task_type: String,
  pub file_name: Option<String>,
  pub strategy: Option<String>,
  pub status: String,
  pub total_items: i64,
  pub processed_items: i64,
  pub new_items: i64,
  pub duplicate_items: i64,
  pub failed_items: i64,
  pub error_message: Option<String>,
  pub created_by: Option<i64>,
  pub created_at: String,
  pub completed_at: Option<String>,
}

/// Final counts written when an import finishes
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportCounts {
  pub total: i64,
  pub new: i64,
  pub duplicate: i64,
  pub failed: i64,
}

pub fn start_task(
  conn: &Connection,
  task_type: &str,
  file_name: Option<&str>,
  strategy: Option<&str>,
  created_by: Option<i64>,
  total_items: i64,
) -> Result<i64> {
  conn.execute(
    r#"
    INSERT INTO import_tasks (task_type, file_name, strategy, status, total_items, created_by, created_at)
    VALUES (?1, ?2, ?3, 'processing', ?4, ?5, ?6)
    "#,
    params![task_type, file_name, strategy, total_items, created_by, ts(&Utc::now())],
  )?;
  Ok(conn.last_insert_rowid())
}

pub fn complete_task(conn: &Connection, id: i64, counts: ImportCounts, error: Option<&str>) -> Result<()> {
  let status = if error.is_some() { "failed" } else { "completed" };
  conn.execute(
    r#"
    UPDATE import_tasks
    SET status = ?1, total_items = ?2, processed_items = ?3, new_items = ?4, duplicate_items = ?5,
        failed_items = ?6, error_message = ?7, completed_at = ?8
    WHERE id = ?9
    "#,
    params![
      status,
      counts.total,
      counts.new + counts.duplicate + counts.failed,
      counts.new,
      counts.duplicate,
      counts.failed,
      error,
      ts(&Utc::now()),
      id,
    ],
  )?;
  Ok(())
}

pub fn list_tasks(conn: &Connection, limit: usize) -> Result<Vec<ImportTask>> {
  let mut stmt = conn.prepare(
    r#"SELECT id, task_type, file_name, strategy, status, total_items, processed_items, new_items,
              duplicate_items, failed_items, error_message, created_by, created_at, completed_at
       FROM import_tasks ORDER BY id DESC LIMIT ?1"#,
  )?;
  let rows = stmt
    .query_map(params![limit as i64], |row| {
      Ok(ImportTask {
        id: row.get(0)?,
        task_type: row.get(1)?,
        file_name: row.get(2)?,
        strategy: row.get(3)?,
        status: row.get(4)?,
        total_items: row.get(5)?,
        processed_items: row.get(6)?,
        new_items: row.get(7)?,
        duplicate_items: row.get(8)?,
        failed_items: row.get(9)?,
        error_message: row.get(10)?,
        created_by: row.get(11)?,
        created_at: row.get(12)?,
        completed_at: row.get(13)?,
      })
    })?
    .collect::<Result<Vec<_>>>()?;
  Ok(rows)
}
