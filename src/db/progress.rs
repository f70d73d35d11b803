//! Per-learner review progress and due-item queries

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result};
use serde::Serialize;

use super::{parse_ts, ts};
use crate::domain::{ItemKind, LearningItem, ProgressRecord, ProgressStats};
use crate::srs::{Transition, MAX_MASTERY};

const PROGRESS_COLUMNS: &str = r#"id, user_id, item_kind, item_id, mastery_level, review_count, correct_count,
  error_count, consecutive_correct, last_review_at, next_review_at, created_at, updated_at"#;

fn row_to_progress(row: &rusqlite::Row) -> Result<ProgressRecord> {
  let kind: String = row.get(2)?;
  let level: i64 = row.get(4)?;
  let last_review_at: String = row.get(9)?;
  let next_review_at: String = row.get(10)?;
  let created_at: String = row.get(11)?;
  let updated_at: String = row.get(12)?;

  Ok(ProgressRecord {
    id: row.get(0)?,
    user_id: row.get(1)?,
    item_kind: ItemKind::from_str(&kind).unwrap_or(ItemKind::Word),
    item_id: row.get(3)?,
    mastery_level: level.clamp(0, MAX_MASTERY as i64) as u8,
    review_count: row.get(5)?,
    correct_count: row.get(6)?,
    error_count: row.get(7)?,
    consecutive_correct: row.get(8)?,
    last_review_at: parse_ts(&last_review_at),
    next_review_at: parse_ts(&next_review_at),
    created_at: parse_ts(&created_at),
    updated_at: parse_ts(&updated_at),
  })
}

pub fn get_progress(conn: &Connection, user_id: i64, kind: ItemKind, item_id: i64) -> Result<Option<ProgressRecord>> {
  conn
    .query_row(
      &format!(
        "SELECT {} FROM learning_progress WHERE user_id = ?1 AND item_kind = ?2 AND item_id = ?3",
        PROGRESS_COLUMNS
      ),
      params![user_id, kind.as_str(), item_id],
      row_to_progress,
    )
    .optional()
}

/// Insert the first record for an item or overwrite the existing one with `t`.
///
/// The (user, kind, item) unique key keeps exactly one row per learner and item.
pub fn save_transition(
  conn: &Connection,
  user_id: i64,
  kind: ItemKind,
  item_id: i64,
  t: &Transition,
) -> Result<()> {
  let now = ts(&t.last_review_at);
  conn.execute(
    r#"
    INSERT INTO learning_progress (user_id, item_kind, item_id, mastery_level, review_count, correct_count,
                                   error_count, consecutive_correct, last_review_at, next_review_at,
                                   created_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?9, ?9)
    ON CONFLICT(user_id, item_kind, item_id) DO UPDATE SET
      mastery_level = excluded.mastery_level,
      review_count = excluded.review_count,
      correct_count = excluded.correct_count,
      error_count = excluded.error_count,
      consecutive_correct = excluded.consecutive_correct,
      last_review_at = excluded.last_review_at,
      next_review_at = excluded.next_review_at,
      updated_at = excluded.updated_at
    "#,
    params![
      user_id,
      kind.as_str(),
      item_id,
      t.mastery_level as i64,
      t.review_count,
      t.correct_count,
      t.error_count,
      t.consecutive_correct,
      now,
      ts(&t.next_review_at),
    ],
  )?;
  Ok(())
}

/// Items already studied whose review time has passed, earliest first
pub fn get_due_items(
  conn: &Connection,
  user_id: i64,
  kind: ItemKind,
  now: DateTime<Utc>,
  limit: usize,
) -> Result<Vec<LearningItem>> {
  let (headline, detail) = kind.summary_columns();
  let mut stmt = conn.prepare(&format!(
    r#"
    SELECT c.id, c.{headline}, c.{detail}, p.mastery_level, p.next_review_at
    FROM learning_progress p
    JOIN {table} c ON c.id = p.item_id
    WHERE p.user_id = ?1 AND p.item_kind = ?2 AND p.next_review_at <= ?3
    ORDER BY p.next_review_at ASC
    LIMIT ?4
    "#,
    table = kind.table(),
  ))?;

  let items = stmt
    .query_map(
      params![user_id, kind.as_str(), ts(&now), limit as i64],
      |row| {
        let level: i64 = row.get(3)?;
        let next: String = row.get(4)?;
        Ok(LearningItem {
          kind,
          id: row.get(0)?,
          headline: row.get(1)?,
          detail: row.get(2)?,
          mastery_level: Some(level.clamp(0, MAX_MASTERY as i64) as u8),
          next_review_at: Some(parse_ts(&next)),
        })
      },
    )?
    .collect::<Result<Vec<_>>>()?;
  Ok(items)
}

/// Items the learner has never answered, in insertion order
pub fn get_unstudied_items(conn: &Connection, user_id: i64, kind: ItemKind, limit: usize) -> Result<Vec<LearningItem>> {
  let (headline, detail) = kind.summary_columns();
  let mut stmt = conn.prepare(&format!(
    r#"
    SELECT c.id, c.{headline}, c.{detail}
    FROM {table} c
    LEFT JOIN learning_progress p
      ON p.item_id = c.id AND p.item_kind = ?2 AND p.user_id = ?1
    WHERE p.id IS NULL
    ORDER BY c.id ASC
    LIMIT ?3
    "#,
    table = kind.table(),
  ))?;

  let items = stmt
    .query_map(params![user_id, kind.as_str(), limit as i64], |row| {
      Ok(LearningItem {
        kind,
        id: row.get(0)?,
        headline: row.get(1)?,
        detail: row.get(2)?,
        mastery_level: None,
        next_review_at: None,
      })
    })?
    .collect::<Result<Vec<_>>>()?;
  Ok(items)
}

/// Earliest upcoming review for a learner and kind, if any
pub fn get_next_review_time(conn: &Connection, user_id: i64, kind: ItemKind) -> Result<Option<DateTime<Utc>>> {
  let next: Option<String> = conn.query_row(
    "SELECT MIN(next_review_at) FROM learning_progress WHERE user_id = ?1 AND item_kind = ?2",
    params![user_id, kind.as_str()],
    |row| row.get(0),
  )?;
  Ok(next.map(|s| parse_ts(&s)))
}

pub fn get_stats(conn: &Connection, user_id: i64, kind: ItemKind, now: DateTime<Utc>) -> Result<ProgressStats> {
  let total_items: i64 =
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", kind.table()), [], |row| row.get(0))?;

  let (studied, due_now, average_mastery, total_reviews, total_errors): (i64, i64, f64, i64, i64) = conn
    .query_row(
      r#"
      SELECT COUNT(*),
             COALESCE(SUM(CASE WHEN next_review_at <= ?3 THEN 1 ELSE 0 END), 0),
             COALESCE(AVG(mastery_level), 0.0),
             COALESCE(SUM(review_count), 0),
             COALESCE(SUM(error_count), 0)
      FROM learning_progress WHERE user_id = ?1 AND item_kind = ?2
      "#,
      params![user_id, kind.as_str(), ts(&now)],
      |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
    )?;

  let mut by_level = vec![0i64; MAX_MASTERY as usize + 1];
  let mut stmt = conn.prepare(
    r#"SELECT mastery_level, COUNT(*) FROM learning_progress
       WHERE user_id = ?1 AND item_kind = ?2 GROUP BY mastery_level"#,
  )?;
  let rows = stmt.query_map(params![user_id, kind.as_str()], |row| {
    Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
  })?;
  for row in rows {
    let (level, count) = row?;
    if let Some(slot) = by_level.get_mut(level.clamp(0, MAX_MASTERY as i64) as usize) {
      *slot += count;
    }
  }

  Ok(ProgressStats {
    total_items,
    studied,
    due_now,
    average_mastery: (average_mastery * 100.0).round() / 100.0,
    by_level,
    total_reviews,
    total_errors,
  })
}

/// One vocabulary word with the learner's progress on it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordExport {
  pub word: String,
  pub phonetic: Option<String>,
  pub meaning: String,
  pub example: Option<String>,
  pub example_translation: Option<String>,
  pub difficulty: i64,
  pub mastery_level: i64,
  pub review_count: i64,
  pub error_count: i64,
  pub last_review_at: Option<DateTime<Utc>>,
  pub next_review_at: Option<DateTime<Utc>>,
}

/// Every word in alphabetical order; unstudied words carry zero progress
pub fn export_words(conn: &Connection, user_id: i64) -> Result<Vec<WordExport>> {
  let mut stmt = conn.prepare(
    r#"
    SELECT w.word, w.phonetic, w.meaning, w.example, w.example_translation, w.difficulty,
           COALESCE(p.mastery_level, 0), COALESCE(p.review_count, 0), COALESCE(p.error_count, 0),
           p.last_review_at, p.next_review_at
    FROM words w
    LEFT JOIN learning_progress p
      ON p.item_id = w.id AND p.item_kind = ?1 AND p.user_id = ?2
    ORDER BY w.word COLLATE NOCASE
    "#,
  )?;
  let rows = stmt
    .query_map(params![ItemKind::Word.as_str(), user_id], |row| {
      let last: Option<String> = row.get(9)?;
      let next: Option<String> = row.get(10)?;
      Ok(WordExport {
        word: row.get(0)?,
        phonetic: row.get(1)?,
        meaning: row.get(2)?,
        example: row.get(3)?,
        example_translation: row.get(4)?,
        difficulty: row.get(5)?,
        mastery_level: row.get(6)?,
        review_count: row.get(7)?,
        error_count: row.get(8)?,
        last_review_at: last.as_deref().map(parse_ts),
        next_review_at: next.as_deref().map(parse_ts),
      })
    })?
    .collect::<Result<Vec<_>>>()?;
  Ok(rows)
}
