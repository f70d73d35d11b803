use chrono::{DateTime, Duration, Utc};

use super::mastery::{next_state, MAX_MASTERY};
use crate::domain::ProgressRecord;

/// Review interval in hours, indexed by mastery level
pub const INTERVAL_HOURS: [i64; MAX_MASTERY as usize + 1] = [1, 24, 72, 168, 360, 720];

pub fn interval_for(level: u8) -> Duration {
  let idx = level.min(MAX_MASTERY) as usize;
  Duration::hours(INTERVAL_HOURS[idx])
}

pub fn next_review_at(level: u8, reviewed_at: DateTime<Utc>) -> DateTime<Utc> {
  reviewed_at + interval_for(level)
}

/// New counters and timestamps for a progress record after one answer
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
  pub mastery_level: u8,
  pub review_count: i64,
  pub correct_count: i64,
  pub error_count: i64,
  pub consecutive_correct: i64,
  pub last_review_at: DateTime<Utc>,
  pub next_review_at: DateTime<Utc>,
}

/// Compute the next state of a record, or the initial state when `current` is None
pub fn transition(current: Option<&ProgressRecord>, is_correct: bool, now: DateTime<Utc>) -> Transition {
  let (level, reviews, correct, errors, streak) = match current {
    Some(r) => (
      r.mastery_level,
      r.review_count,
      r.correct_count,
      r.error_count,
      r.consecutive_correct,
    ),
    None => (0, 0, 0, 0, 0),
  };

  let mastery_level = next_state(level, is_correct);
  let (correct_count, error_count, consecutive_correct) = if is_correct {
    (correct + 1, errors, streak + 1)
  } else {
    (correct, errors + 1, 0)
  };

  Transition {
    mastery_level,
    review_count: reviews + 1,
    correct_count,
    error_count,
    consecutive_correct,
    last_review_at: now,
    next_review_at: next_review_at(mastery_level, now),
  }
}

/// Items without a scheduled time are always due
pub fn is_due(next_review_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
  next_review_at.is_none_or(|t| t <= now)
}

pub fn format_relative(dt: DateTime<Utc>, now: DateTime<Utc>) -> String {
  let duration = dt.signed_duration_since(now);

  let minutes = duration.num_minutes();
  let hours = duration.num_hours();
  let days = duration.num_days();

  if minutes < 1 {
    "now".to_string()
  } else if minutes < 60 {
    format!("in {} minute{}", minutes, if minutes == 1 { "" } else { "s" })
  } else if hours < 24 {
    format!("in {} hour{}", hours, if hours == 1 { "" } else { "s" })
  } else if days == 1 {
    "tomorrow".to_string()
  } else if days < 7 {
    format!("in {} days", days)
  } else if days < 30 {
    let weeks = days / 7;
    format!("in {} week{}", weeks, if weeks == 1 { "" } else { "s" })
  } else {
    let months = days / 30;
    format!("in {} month{}", months, if months == 1 { "" } else { "s" })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::ItemKind;

  fn record(level: u8, now: DateTime<Utc>) -> ProgressRecord {
    ProgressRecord {
      id: 1,
      user_id: 1,
      item_kind: ItemKind::Word,
      item_id: 7,
      mastery_level: level,
      review_count: 4,
      correct_count: 3,
      error_count: 1,
      consecutive_correct: 2,
      last_review_at: now - Duration::days(1),
      next_review_at: now,
      created_at: now - Duration::days(10),
      updated_at: now - Duration::days(1),
    }
  }

  #[test]
  fn test_intervals_grow_with_level() {
    for level in 1..=MAX_MASTERY {
      assert!(interval_for(level) > interval_for(level - 1));
    }
    assert_eq!(interval_for(0), Duration::hours(1));
    assert_eq!(interval_for(MAX_MASTERY), Duration::days(30));
  }

  #[test]
  fn test_first_correct_answer() {
    let now = Utc::now();
    let t = transition(None, true, now);
    assert_eq!(t.mastery_level, 1);
    assert_eq!(t.review_count, 1);
    assert_eq!(t.correct_count, 1);
    assert_eq!(t.error_count, 0);
    assert_eq!(t.next_review_at, now + Duration::hours(24));
  }

  #[test]
  fn test_first_wrong_answer() {
    let now = Utc::now();
    let t = transition(None, false, now);
    assert_eq!(t.mastery_level, 0);
    assert_eq!(t.review_count, 1);
    assert_eq!(t.error_count, 1);
    assert_eq!(t.next_review_at, now + Duration::hours(1));
  }

  #[test]
  fn test_correct_moves_review_forward() {
    let now = Utc::now();
    let r = record(2, now);
    let t = transition(Some(&r), true, now);
    assert!(t.mastery_level >= r.mastery_level);
    assert!(t.next_review_at > t.last_review_at);
    assert_eq!(t.review_count, 5);
    assert_eq!(t.consecutive_correct, 3);
  }

  #[test]
  fn test_wrong_resets_streak_and_level() {
    let now = Utc::now();
    let t = transition(Some(&record(4, now)), false, now);
    assert_eq!(t.mastery_level, 0);
    assert_eq!(t.consecutive_correct, 0);
    assert_eq!(t.error_count, 2);
    assert_eq!(t.correct_count, 3);
  }

  #[test]
  fn test_is_due() {
    let now = Utc::now();
    assert!(is_due(None, now));
    assert!(is_due(Some(now), now));
    assert!(!is_due(Some(now + Duration::minutes(1)), now));
  }

  #[test]
  fn test_format_relative() {
    let now = Utc::now();
    assert_eq!(format_relative(now, now), "now");
    assert_eq!(format_relative(now + Duration::minutes(5), now), "in 5 minutes");
    assert_eq!(format_relative(now + Duration::hours(1), now), "in 1 hour");
    assert_eq!(format_relative(now + Duration::hours(30), now), "tomorrow");
    assert_eq!(format_relative(now + Duration::days(3), now), "in 3 days");
    assert_eq!(format_relative(now + Duration::days(14), now), "in 2 weeks");
    assert_eq!(format_relative(now + Duration::days(30), now), "in 1 month");
  }
}
