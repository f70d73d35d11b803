use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of schedulable learning content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
  Word,
  Collocation,
  GrammarPoint,
  WordFamily,
  Transformation,
}

impl ItemKind {
  pub const ALL: [ItemKind; 5] = [
    Self::Word,
    Self::Collocation,
    Self::GrammarPoint,
    Self::WordFamily,
    Self::Transformation,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Word => "word",
      Self::Collocation => "collocation",
      Self::GrammarPoint => "grammar_point",
      Self::WordFamily => "word_family",
      Self::Transformation => "transformation",
    }
  }

  pub fn from_str(s: &str) -> Option<Self> {
    match s {
      "word" | "words" => Some(Self::Word),
      "collocation" | "collocations" => Some(Self::Collocation),
      "grammar_point" | "grammar" => Some(Self::GrammarPoint),
      "word_family" | "word-family" => Some(Self::WordFamily),
      "transformation" | "transformations" => Some(Self::Transformation),
      _ => None,
    }
  }

  /// Content table backing this kind
  pub fn table(&self) -> &'static str {
    match self {
      Self::Word => "words",
      Self::Collocation => "collocations",
      Self::GrammarPoint => "grammar_points",
      Self::WordFamily => "word_families",
      Self::Transformation => "word_transformations",
    }
  }

  /// (headline, detail) columns used when summarizing an item
  pub fn summary_columns(&self) -> (&'static str, &'static str) {
    match self {
      Self::Word => ("word", "meaning"),
      Self::Collocation => ("phrase", "meaning"),
      Self::GrammarPoint => ("name", "description"),
      Self::WordFamily => ("root_word", "meaning"),
      Self::Transformation => ("base_word", "base_meaning"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
  pub id: i64,
  pub word: String,
  pub phonetic: Option<String>,
  pub meaning: String,
  pub example: Option<String>,
  pub example_translation: Option<String>,
  pub difficulty: i64,
  pub source: Option<String>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collocation {
  pub id: i64,
  pub phrase: String,
  pub meaning: String,
  pub example: Option<String>,
  pub category: Option<String>,
  pub difficulty: i64,
  pub source: Option<String>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrammarPoint {
  pub id: i64,
  pub name: String,
  pub category: Option<String>,
  pub description: Option<String>,
  pub examples: Vec<String>,
  pub level: i64,
  pub source: Option<String>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyMember {
  pub word: String,
  #[serde(default)]
  pub part_of_speech: Option<String>,
  #[serde(default)]
  pub meaning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordFamily {
  pub id: i64,
  pub root_word: String,
  pub meaning: Option<String>,
  pub members: Vec<FamilyMember>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationForm {
  pub word: String,
  #[serde(default)]
  pub part_of_speech: Option<String>,
  #[serde(default)]
  pub meaning: Option<String>,
  /// Gap-fill sentence that requires this form
  #[serde(default)]
  pub sentence: Option<String>,
  #[serde(default)]
  pub answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTransformation {
  pub id: i64,
  pub base_word: String,
  pub base_meaning: String,
  pub transformations: Vec<TransformationForm>,
  pub difficulty: i64,
  pub created_at: DateTime<Utc>,
}

/// Reading article (not scheduled, CRUD only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
  pub id: i64,
  pub title: String,
  pub content: String,
  pub level: String,
  pub word_count: i64,
  pub read_time: i64,
  pub category: Option<String>,
  pub questions: serde_json::Value,
  pub created_at: DateTime<Utc>,
}

impl Article {
  /// Word count and estimated minutes of reading (200 wpm, at least one minute)
  pub fn measure(content: &str) -> (i64, i64) {
    let words = content.split_whitespace().count() as i64;
    let minutes = ((words + 199) / 200).max(1);
    (words, minutes)
  }
}

/// Summary of any schedulable item, as returned by review queries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningItem {
  pub kind: ItemKind,
  pub id: i64,
  pub headline: String,
  pub detail: Option<String>,
  /// None when the learner has never studied this item
  pub mastery_level: Option<u8>,
  pub next_review_at: Option<DateTime<Utc>>,
}
