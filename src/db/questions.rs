//! Deduplicated question bank and exam papers

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result};
use serde::Serialize;

use super::{json_column, parse_ts, to_json, ts};
use crate::domain::{Paper, QuestionData, QuestionRecord};

const QUESTION_COLUMNS: &str = r#"id, question_hash, question, question_type, options, correct_answer, explanation,
  appearance_count, first_seen_at, last_seen_at"#;

fn row_to_question(row: &rusqlite::Row) -> Result<QuestionRecord> {
  let first_seen: String = row.get(8)?;
  let last_seen: String = row.get(9)?;
  Ok(QuestionRecord {
    id: row.get(0)?,
    question_hash: row.get(1)?,
    question: row.get(2)?,
    question_type: row.get(3)?,
    options: json_column(row.get(4)?),
    correct_answer: row.get(5)?,
    explanation: row.get(6)?,
    appearance_count: row.get(7)?,
    first_seen_at: parse_ts(&first_seen),
    last_seen_at: parse_ts(&last_seen),
  })
}

/// Insert a question unless its hash is already stored.
///
/// Returns the new row id, or None when the unique hash constraint fired.
pub fn insert_question_if_absent(
  conn: &Connection,
  hash: &str,
  q: &QuestionData,
  now: DateTime<Utc>,
) -> Result<Option<i64>> {
  let now = ts(&now);
  let inserted = conn.execute(
    r#"
    INSERT INTO questions (question_hash, question, question_type, options, correct_answer, explanation,
                           appearance_count, first_seen_at, last_seen_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)
    ON CONFLICT(question_hash) DO NOTHING
    "#,
    params![
      hash,
      q.question.trim(),
      q.question_type.as_deref().unwrap_or("choice"),
      to_json(&q.options),
      q.answer,
      q.explanation,
      now,
    ],
  )?;
  Ok((inserted == 1).then(|| conn.last_insert_rowid()))
}

/// Count another sighting of an existing question, returns (id, appearance_count)
pub fn record_appearance(conn: &Connection, hash: &str, now: DateTime<Utc>) -> Result<Option<(i64, i64)>> {
  conn.execute(
    "UPDATE questions SET appearance_count = appearance_count + 1, last_seen_at = ?1 WHERE question_hash = ?2",
    params![ts(&now), hash],
  )?;
  conn
    .query_row(
      "SELECT id, appearance_count FROM questions WHERE question_hash = ?1",
      params![hash],
      |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()
}

pub fn get_question(conn: &Connection, id: i64) -> Result<Option<QuestionRecord>> {
  conn
    .query_row(
      &format!("SELECT {} FROM questions WHERE id = ?1", QUESTION_COLUMNS),
      params![id],
      row_to_question,
    )
    .optional()
}

pub fn get_question_by_hash(conn: &Connection, hash: &str) -> Result<Option<QuestionRecord>> {
  conn
    .query_row(
      &format!("SELECT {} FROM questions WHERE question_hash = ?1", QUESTION_COLUMNS),
      params![hash],
      row_to_question,
    )
    .optional()
}

/// Questions ordered by how often they appeared across papers
pub fn list_questions(
  conn: &Connection,
  min_appearances: i64,
  limit: usize,
  offset: usize,
) -> Result<Vec<QuestionRecord>> {
  let mut stmt = conn.prepare(&format!(
    r#"SELECT {} FROM questions WHERE appearance_count >= ?1
       ORDER BY appearance_count DESC, last_seen_at DESC LIMIT ?2 OFFSET ?3"#,
    QUESTION_COLUMNS
  ))?;
  let rows = stmt
    .query_map(params![min_appearances, limit as i64, offset as i64], row_to_question)?
    .collect::<Result<Vec<_>>>()?;
  Ok(rows)
}

// ==================== Papers ====================

fn row_to_paper(row: &rusqlite::Row) -> Result<Paper> {
  let created_at: String = row.get(5)?;
  Ok(Paper {
    id: row.get(0)?,
    name: row.get(1)?,
    version: row.get(2)?,
    description: row.get(3)?,
    file_name: row.get(4)?,
    created_at: parse_ts(&created_at),
  })
}

pub fn create_paper(
  conn: &Connection,
  name: &str,
  version: &str,
  description: Option<&str>,
  file_name: Option<&str>,
) -> Result<i64> {
  conn.execute(
    "INSERT INTO papers (name, version, description, file_name, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
    params![name, version, description, file_name, ts(&Utc::now())],
  )?;
  Ok(conn.last_insert_rowid())
}

pub fn get_paper(conn: &Connection, id: i64) -> Result<Option<Paper>> {
  conn
    .query_row(
      "SELECT id, name, version, description, file_name, created_at FROM papers WHERE id = ?1",
      params![id],
      row_to_paper,
    )
    .optional()
}

#[derive(Debug, Clone, Serialize)]
pub struct PaperSummary {
  #[serde(flatten)]
  pub paper: Paper,
  pub question_count: i64,
}

pub fn list_papers(conn: &Connection, limit: usize) -> Result<Vec<PaperSummary>> {
  let mut stmt = conn.prepare(
    r#"SELECT id, name, version, description, file_name, created_at, question_count
       FROM papers ORDER BY created_at DESC LIMIT ?1"#,
  )?;
  let rows = stmt
    .query_map(params![limit as i64], |row| {
      Ok(PaperSummary {
        paper: row_to_paper(row)?,
        question_count: row.get(6)?,
      })
    })?
    .collect::<Result<Vec<_>>>()?;
  Ok(rows)
}

/// Relate a question to a paper; repeated links are ignored
pub fn link_question_to_paper(conn: &Connection, question_id: i64, paper_id: i64, position: Option<i64>) -> Result<bool> {
  let inserted = conn.execute(
    "INSERT OR IGNORE INTO question_papers (question_id, paper_id, position) VALUES (?1, ?2, ?3)",
    params![question_id, paper_id, position],
  )?;
  Ok(inserted == 1)
}

pub fn set_paper_question_count(conn: &Connection, paper_id: i64) -> Result<()> {
  conn.execute(
    "UPDATE papers SET question_count = (SELECT COUNT(*) FROM question_papers WHERE paper_id = ?1) WHERE id = ?1",
    params![paper_id],
  )?;
  Ok(())
}

pub fn get_paper_questions(conn: &Connection, paper_id: i64) -> Result<Vec<QuestionRecord>> {
  let mut stmt = conn.prepare(
    r#"SELECT q.id, q.question_hash, q.question, q.question_type, q.options, q.correct_answer,
              q.explanation, q.appearance_count, q.first_seen_at, q.last_seen_at
       FROM questions q JOIN question_papers qp ON qp.question_id = q.id
       WHERE qp.paper_id = ?1 ORDER BY qp.position, q.id"#,
  )?;
  let rows = stmt
    .query_map(params![paper_id], row_to_question)?
    .collect::<Result<Vec<_>>>()?;
  Ok(rows)
}
