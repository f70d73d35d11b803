use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A parsed question as it arrives from an uploaded document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionData {
  pub question: String,
  #[serde(default)]
  pub options: Vec<String>,
  #[serde(default, rename = "type")]
  pub question_type: Option<String>,
  #[serde(default)]
  pub answer: Option<String>,
  #[serde(default)]
  pub explanation: Option<String>,
}

impl QuestionData {
  pub fn new(question: impl Into<String>, options: &[&str]) -> Self {
    Self {
      question: question.into(),
      options: options.iter().map(|o| o.to_string()).collect(),
      ..Default::default()
    }
  }
}

/// Canonical deduplicated question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
  pub id: i64,
  pub question_hash: String,
  pub question: String,
  pub question_type: String,
  pub options: Vec<String>,
  pub correct_answer: Option<String>,
  pub explanation: Option<String>,
  pub appearance_count: i64,
  pub first_seen_at: DateTime<Utc>,
  pub last_seen_at: DateTime<Utc>,
}

/// An uploaded document (exam paper) that questions were seen in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
  pub id: i64,
  pub name: String,
  pub version: String,
  pub description: Option<String>,
  pub file_name: Option<String>,
  pub created_at: DateTime<Utc>,
}
