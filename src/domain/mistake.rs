use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ItemKind;

/// A learner's wrong answer, unique per (user, exact question text)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MistakeRecord {
  pub id: i64,
  pub user_id: i64,
  pub item_kind: Option<ItemKind>,
  pub item_id: Option<i64>,
  pub question_id: Option<i64>,
  pub question: String,
  pub wrong_answer: Option<String>,
  pub correct_answer: Option<String>,
  pub explanation: Option<String>,
  pub attempt_count: i64,
  pub mastered: bool,
  pub first_wrong_at: DateTime<Utc>,
  pub last_wrong_at: DateTime<Utc>,
}

/// Fields needed to record a wrong answer
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewMistake {
  pub question: String,
  #[serde(default)]
  pub wrong_answer: Option<String>,
  #[serde(default)]
  pub correct_answer: Option<String>,
  #[serde(default)]
  pub explanation: Option<String>,
}
