use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result};

use super::{parse_ts, ts};
use crate::domain::{ItemKind, MistakeRecord, NewMistake};

const MISTAKE_COLUMNS: &str = r#"id, user_id, item_kind, item_id, question_id, question, wrong_answer, correct_answer,
  explanation, attempt_count, mastered, first_wrong_at, last_wrong_at"#;

fn row_to_mistake(row: &rusqlite::Row) -> Result<MistakeRecord> {
  let kind: Option<String> = row.get(2)?;
  let mastered: i64 = row.get(10)?;
  let first: String = row.get(11)?;
  let last: String = row.get(12)?;
  Ok(MistakeRecord {
    id: row.get(0)?,
    user_id: row.get(1)?,
    item_kind: kind.as_deref().and_then(ItemKind::from_str),
    item_id: row.get(3)?,
    question_id: row.get(4)?,
    question: row.get(5)?,
    wrong_answer: row.get(6)?,
    correct_answer: row.get(7)?,
    explanation: row.get(8)?,
    attempt_count: row.get(9)?,
    mastered: mastered != 0,
    first_wrong_at: parse_ts(&first),
    last_wrong_at: parse_ts(&last),
  })
}

/// Record a wrong answer; repeats of the same question bump the attempt count
/// and reopen the mistake.
pub fn upsert_mistake(
  conn: &Connection,
  user_id: i64,
  item: Option<(ItemKind, i64)>,
  question_id: Option<i64>,
  m: &NewMistake,
  now: DateTime<Utc>,
) -> Result<i64> {
  let now = ts(&now);
  conn.execute(
    r#"
    INSERT INTO mistakes (user_id, item_kind, item_id, question_id, question, wrong_answer, correct_answer,
                          explanation, attempt_count, mastered, first_wrong_at, last_wrong_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, 0, ?9, ?9)
    ON CONFLICT(user_id, question) DO UPDATE SET
      attempt_count = attempt_count + 1,
      wrong_answer = excluded.wrong_answer,
      correct_answer = COALESCE(excluded.correct_answer, correct_answer),
      explanation = COALESCE(excluded.explanation, explanation),
      question_id = COALESCE(excluded.question_id, question_id),
      mastered = 0,
      last_wrong_at = excluded.last_wrong_at
    "#,
    params![
      user_id,
      item.map(|(k, _)| k.as_str()),
      item.map(|(_, id)| id),
      question_id,
      m.question.trim(),
      m.wrong_answer,
      m.correct_answer,
      m.explanation,
      now,
    ],
  )?;
  conn.query_row(
    "SELECT id FROM mistakes WHERE user_id = ?1 AND question = ?2",
    params![user_id, m.question.trim()],
    |row| row.get(0),
  )
}

/// The learner's mistake for a bank question, or for the same question text
pub fn find_mistake_id(conn: &Connection, user_id: i64, question_id: Option<i64>, question: &str) -> Result<Option<i64>> {
  conn
    .query_row(
      r#"SELECT id FROM mistakes
         WHERE user_id = ?1 AND ((?2 IS NOT NULL AND question_id = ?2) OR question = ?3)
         LIMIT 1"#,
      params![user_id, question_id, question.trim()],
      |row| row.get(0),
    )
    .optional()
}

pub fn get_mistake(conn: &Connection, user_id: i64, id: i64) -> Result<Option<MistakeRecord>> {
  conn
    .query_row(
      &format!("SELECT {} FROM mistakes WHERE id = ?1 AND user_id = ?2", MISTAKE_COLUMNS),
      params![id, user_id],
      row_to_mistake,
    )
    .optional()
}

pub fn list_mistakes(
  conn: &Connection,
  user_id: i64,
  mastered: Option<bool>,
  limit: usize,
  offset: usize,
) -> Result<Vec<MistakeRecord>> {
  let mut stmt = conn.prepare(&format!(
    r#"SELECT {} FROM mistakes WHERE user_id = ?1 AND (?2 IS NULL OR mastered = ?2)
       ORDER BY last_wrong_at DESC LIMIT ?3 OFFSET ?4"#,
    MISTAKE_COLUMNS
  ))?;
  let rows = stmt
    .query_map(
      params![user_id, mastered.map(i64::from), limit as i64, offset as i64],
      row_to_mistake,
    )?
    .collect::<Result<Vec<_>>>()?;
  Ok(rows)
}

/// Returns false when the mistake does not belong to the user
pub fn set_mastered(conn: &Connection, user_id: i64, id: i64, mastered: bool) -> Result<bool> {
  let updated = conn.execute(
    "UPDATE mistakes SET mastered = ?1 WHERE id = ?2 AND user_id = ?3",
    params![mastered, id, user_id],
  )?;
  Ok(updated == 1)
}
