use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ItemKind;

/// One learner's review state for one item.
///
/// Created on first interaction and updated on every later one; never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
  pub id: i64,
  pub user_id: i64,
  pub item_kind: ItemKind,
  pub item_id: i64,
  /// 0..=MAX_MASTERY
  pub mastery_level: u8,
  pub review_count: i64,
  pub correct_count: i64,
  pub error_count: i64,
  pub consecutive_correct: i64,
  pub last_review_at: DateTime<Utc>,
  pub next_review_at: DateTime<Utc>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Aggregate progress for one learner and one kind
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgressStats {
  pub total_items: i64,
  pub studied: i64,
  pub due_now: i64,
  pub average_mastery: f64,
  /// Count of records per mastery level, index = level
  pub by_level: Vec<i64>,
  pub total_reviews: i64,
  pub total_errors: i64,
}

impl ProgressStats {
  /// Share of reviews answered correctly, 0-100
  pub fn accuracy(&self) -> i64 {
    if self.total_reviews > 0 {
      ((self.total_reviews - self.total_errors) * 100) / self.total_reviews
    } else {
      0
    }
  }
}
