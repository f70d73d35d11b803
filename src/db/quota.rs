//! Persistent daily AI call counter

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result};

use super::ts;

pub fn day_key(now: DateTime<Utc>) -> String {
  now.format("%Y-%m-%d").to_string()
}

pub fn get_usage(conn: &Connection, now: DateTime<Utc>) -> Result<i64> {
  let count: Option<i64> = conn
    .query_row(
      "SELECT call_count FROM ai_quota_usage WHERE day = ?1",
      params![day_key(now)],
      |row| row.get(0),
    )
    .optional()?;
  Ok(count.unwrap_or(0))
}

/// Count one call unless today's limit is reached.
///
/// Returns the new count, or None when the limit was already hit. The check and
/// the increment are one statement.
pub fn try_increment(conn: &Connection, limit: i64, now: DateTime<Utc>) -> Result<Option<i64>> {
  if limit <= 0 {
    return Ok(None);
  }
  let day = day_key(now);
  let changed = conn.execute(
    r#"
    INSERT INTO ai_quota_usage (day, call_count, updated_at) VALUES (?1, 1, ?3)
    ON CONFLICT(day) DO UPDATE SET call_count = call_count + 1, updated_at = excluded.updated_at
    WHERE call_count < ?2
    "#,
    params![day, limit, ts(&now)],
  )?;
  if changed == 0 {
    return Ok(None);
  }
  get_usage(conn, now).map(Some)
}

/// Drop counters for days before `now`, returns rows removed
pub fn prune_old_days(conn: &Connection, now: DateTime<Utc>) -> Result<usize> {
  conn.execute("DELETE FROM ai_quota_usage WHERE day < ?1", params![day_key(now)])
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::TestEnv;
  use chrono::Duration;

  #[test]
  fn test_increment_until_limit() {
    let env = TestEnv::new().unwrap();
    let now = Utc::now();
    assert_eq!(try_increment(&env.conn, 2, now).unwrap(), Some(1));
    assert_eq!(try_increment(&env.conn, 2, now).unwrap(), Some(2));
    assert_eq!(try_increment(&env.conn, 2, now).unwrap(), None);
    assert_eq!(get_usage(&env.conn, now).unwrap(), 2);
  }

  #[test]
  fn test_new_day_starts_fresh() {
    let env = TestEnv::new().unwrap();
    let today = Utc::now();
    try_increment(&env.conn, 1, today).unwrap();
    let tomorrow = today + Duration::days(1);
    assert_eq!(get_usage(&env.conn, tomorrow).unwrap(), 0);
    assert_eq!(try_increment(&env.conn, 1, tomorrow).unwrap(), Some(1));
    assert_eq!(prune_old_days(&env.conn, tomorrow).unwrap(), 1);
  }
}
