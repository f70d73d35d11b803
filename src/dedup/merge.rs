//! Resolution of a detected duplicate: replace, append, skip or model-assisted merge.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::ai::LanguageModel;
use crate::domain::{Collocation, GrammarPoint, Word};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
  Replace,
  #[default]
  Append,
  SmartMerge,
  Skip,
}

impl MergeStrategy {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Replace => "replace",
      Self::Append => "append",
      Self::SmartMerge => "smart_merge",
      Self::Skip => "skip",
    }
  }

  pub fn from_str(s: &str) -> Option<Self> {
    match s {
      "replace" => Some(Self::Replace),
      "append" => Some(Self::Append),
      "smart_merge" => Some(Self::SmartMerge),
      "skip" => Some(Self::Skip),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeAction {
  Replaced,
  Appended,
  SmartMerged,
  /// Smart merge failed and append was used instead
  FellBack,
  Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeOutcome<T> {
  pub merged: T,
  pub action: MergeAction,
  pub reason: String,
  /// False when `merged` equals the stored record and no write is needed
  pub changed: bool,
}

impl<T: PartialEq> MergeOutcome<T> {
  fn new(existing: &T, merged: T, action: MergeAction, reason: impl Into<String>) -> Self {
    let changed = &merged != existing;
    Self {
      merged,
      action,
      reason: reason.into(),
      changed,
    }
  }
}

/// A stored record that can absorb a duplicate incoming record.
///
/// Implementations keep the existing identity (id, key, created_at).
pub trait Mergeable: Clone + PartialEq + Send + Sync {
  /// Incoming fields win where present
  fn replace(existing: &Self, incoming: &Self) -> Self;
  /// Existing fields win where present; lists are unioned and sources joined
  fn append(existing: &Self, incoming: &Self) -> Self;
  fn merge_prompt(existing: &Self, incoming: &Self) -> String;
  /// Build the merged record from a model reply; None if the reply is unusable
  fn apply_model_proposal(existing: &Self, incoming: &Self, proposal: &Value) -> Option<Self>;
}

/// Apply a strategy that needs no model
pub fn merge_local<T: Mergeable>(strategy: MergeStrategy, existing: &T, incoming: &T) -> MergeOutcome<T> {
  match strategy {
    MergeStrategy::Replace => MergeOutcome::new(
      existing,
      T::replace(existing, incoming),
      MergeAction::Replaced,
      "Replaced with incoming content",
    ),
    MergeStrategy::Skip => MergeOutcome {
      merged: existing.clone(),
      action: MergeAction::Skipped,
      reason: "Skipped, existing content kept".to_string(),
      changed: false,
    },
    MergeStrategy::Append | MergeStrategy::SmartMerge => MergeOutcome::new(
      existing,
      T::append(existing, incoming),
      MergeAction::Appended,
      "Appended incoming content to existing",
    ),
  }
}

/// Apply any strategy; smart merge consults `model` and falls back to append
pub async fn merge<T: Mergeable, M: LanguageModel>(
  strategy: MergeStrategy,
  model: &M,
  existing: &T,
  incoming: &T,
) -> MergeOutcome<T> {
  match strategy {
    MergeStrategy::SmartMerge => smart_merge(model, existing, incoming).await,
    other => merge_local(other, existing, incoming),
  }
}

pub async fn smart_merge<T: Mergeable, M: LanguageModel>(model: &M, existing: &T, incoming: &T) -> MergeOutcome<T> {
  let prompt = T::merge_prompt(existing, incoming);
  let failure = match model.complete(&prompt).await {
    Ok(reply) => {
      let proposal = parse_model_json(&reply);
      match proposal
        .as_ref()
        .and_then(|p| T::apply_model_proposal(existing, incoming, p))
      {
        Some(merged) => {
          let reason = proposal
            .as_ref()
            .and_then(|p| p.get("reason"))
            .and_then(Value::as_str)
            .filter(|r| !r.trim().is_empty())
            .unwrap_or("Merged with model assistance")
            .to_string();
          return MergeOutcome::new(existing, merged, MergeAction::SmartMerged, reason);
        }
        None => "model reply was not a usable JSON object".to_string(),
      }
    }
    Err(e) => e.to_string(),
  };

  warn!("Smart merge failed ({}), falling back to append", failure);
  MergeOutcome::new(
    existing,
    T::append(existing, incoming),
    MergeAction::FellBack,
    format!("Smart merge failed, appended instead: {}", failure),
  )
}

/// Extract a JSON object from a model reply, tolerating code fences and prose
pub fn parse_model_json(reply: &str) -> Option<Value> {
  let trimmed = reply.trim();
  let unfenced = trimmed
    .strip_prefix("```json")
    .or_else(|| trimmed.strip_prefix("```"))
    .map(|s| s.trim_end().trim_end_matches("```"))
    .unwrap_or(trimmed);

  let start = unfenced.find('{')?;
  let end = unfenced.rfind('}')?;
  if end < start {
    return None;
  }
  let value: Value = serde_json::from_str(&unfenced[start..=end]).ok()?;
  value.is_object().then_some(value)
}

fn non_empty(s: &Option<String>) -> Option<&String> {
  s.as_ref().filter(|v| !v.trim().is_empty())
}

/// First non-empty of the two
fn prefer(first: &Option<String>, second: &Option<String>) -> Option<String> {
  non_empty(first).or_else(|| non_empty(second)).cloned()
}

fn prefer_str(first: &str, second: &str) -> String {
  if first.trim().is_empty() {
    second.to_string()
  } else {
    first.to_string()
  }
}

fn proposal_str(proposal: &Value, key: &str) -> Option<String> {
  proposal
    .get(key)
    .and_then(Value::as_str)
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_string)
}

/// Join source labels as "a, b" without repeating a label
pub fn merge_sources(existing: &Option<String>, incoming: &Option<String>) -> Option<String> {
  let mut labels: Vec<String> = Vec::new();
  for raw in [existing, incoming].into_iter().flatten() {
    for label in raw.split(',').map(str::trim).filter(|l| !l.is_empty()) {
      if !labels.iter().any(|l| l == label) {
        labels.push(label.to_string());
      }
    }
  }
  (!labels.is_empty()).then(|| labels.join(", "))
}

/// Existing items first, then unseen incoming ones
pub fn union(existing: &[String], incoming: &[String]) -> Vec<String> {
  let mut out = existing.to_vec();
  for item in incoming {
    if !item.trim().is_empty() && !out.iter().any(|e| e.trim() == item.trim()) {
      out.push(item.clone());
    }
  }
  out
}

fn or_none(s: &Option<String>) -> &str {
  non_empty(s).map(String::as_str).unwrap_or("(none)")
}

impl Mergeable for Collocation {
  fn replace(existing: &Self, incoming: &Self) -> Self {
    Self {
      meaning: prefer_str(&incoming.meaning, &existing.meaning),
      example: prefer(&incoming.example, &existing.example),
      category: prefer(&incoming.category, &existing.category),
      difficulty: incoming.difficulty,
      source: prefer(&incoming.source, &existing.source),
      ..existing.clone()
    }
  }

  fn append(existing: &Self, incoming: &Self) -> Self {
    Self {
      meaning: prefer_str(&existing.meaning, &incoming.meaning),
      example: prefer(&existing.example, &incoming.example),
      category: prefer(&existing.category, &incoming.category),
      source: merge_sources(&existing.source, &incoming.source),
      ..existing.clone()
    }
  }

  fn merge_prompt(existing: &Self, incoming: &Self) -> String {
    format!(
      r#"Merge these two entries for the same English collocation into one.

Entry 1 (existing):
Phrase: {}
Meaning: {}
Example: {}

Entry 2 (new):
Phrase: {}
Meaning: {}
Example: {}

Reply with JSON only:
{{"phrase": "...", "meaning": "combined meaning without repetition", "example": "the most representative example", "category": "...", "reason": "why"}}

Keep the more accurate phrase. If both say the same thing, keep the more detailed version."#,
      existing.phrase,
      existing.meaning,
      or_none(&existing.example),
      incoming.phrase,
      incoming.meaning,
      or_none(&incoming.example),
    )
  }

  fn apply_model_proposal(existing: &Self, incoming: &Self, proposal: &Value) -> Option<Self> {
    proposal.as_object()?;
    Some(Self {
      meaning: proposal_str(proposal, "meaning").unwrap_or_else(|| prefer_str(&existing.meaning, &incoming.meaning)),
      example: proposal_str(proposal, "example").or_else(|| prefer(&existing.example, &incoming.example)),
      category: proposal_str(proposal, "category").or_else(|| prefer(&existing.category, &incoming.category)),
      source: merge_sources(&existing.source, &incoming.source),
      ..existing.clone()
    })
  }
}

impl Mergeable for GrammarPoint {
  fn replace(existing: &Self, incoming: &Self) -> Self {
    Self {
      category: prefer(&incoming.category, &existing.category),
      description: prefer(&incoming.description, &existing.description),
      examples: if incoming.examples.is_empty() {
        existing.examples.clone()
      } else {
        incoming.examples.clone()
      },
      level: incoming.level,
      source: prefer(&incoming.source, &existing.source),
      ..existing.clone()
    }
  }

  fn append(existing: &Self, incoming: &Self) -> Self {
    Self {
      category: prefer(&incoming.category, &existing.category),
      description: prefer(&existing.description, &incoming.description),
      examples: union(&existing.examples, &incoming.examples),
      source: merge_sources(&existing.source, &incoming.source),
      ..existing.clone()
    }
  }

  fn merge_prompt(existing: &Self, incoming: &Self) -> String {
    let examples = |e: &[String]| {
      if e.is_empty() {
        "(none)".to_string()
      } else {
        e.join("; ")
      }
    };
    format!(
      r#"Merge these two entries for the same English grammar point into one.

Entry 1 (existing):
Name: {}
Category: {}
Description: {}
Examples: {}

Entry 2 (new):
Name: {}
Category: {}
Description: {}
Examples: {}

Reply with JSON only:
{{"name": "...", "category": "...", "description": "combined description without repetition", "examples": ["..."], "reason": "why"}}

Keep the most accurate name, drop duplicate examples and keep the most representative ones."#,
      existing.name,
      or_none(&existing.category),
      or_none(&existing.description),
      examples(&existing.examples),
      incoming.name,
      or_none(&incoming.category),
      or_none(&incoming.description),
      examples(&incoming.examples),
    )
  }

  fn apply_model_proposal(existing: &Self, incoming: &Self, proposal: &Value) -> Option<Self> {
    proposal.as_object()?;
    let examples = proposal
      .get("examples")
      .and_then(Value::as_array)
      .map(|items| {
        items
          .iter()
          .filter_map(Value::as_str)
          .map(str::to_string)
          .collect::<Vec<_>>()
      })
      .filter(|e| !e.is_empty())
      .unwrap_or_else(|| union(&existing.examples, &incoming.examples));
    Some(Self {
      category: proposal_str(proposal, "category").or_else(|| prefer(&incoming.category, &existing.category)),
      description: proposal_str(proposal, "description")
        .or_else(|| prefer(&existing.description, &incoming.description)),
      examples,
      source: merge_sources(&existing.source, &incoming.source),
      ..existing.clone()
    })
  }
}

impl Mergeable for Word {
  fn replace(existing: &Self, incoming: &Self) -> Self {
    Self {
      phonetic: prefer(&incoming.phonetic, &existing.phonetic),
      meaning: prefer_str(&incoming.meaning, &existing.meaning),
      example: prefer(&incoming.example, &existing.example),
      example_translation: prefer(&incoming.example_translation, &existing.example_translation),
      difficulty: incoming.difficulty,
      source: prefer(&incoming.source, &existing.source),
      ..existing.clone()
    }
  }

  fn append(existing: &Self, incoming: &Self) -> Self {
    Self {
      phonetic: prefer(&existing.phonetic, &incoming.phonetic),
      meaning: prefer_str(&existing.meaning, &incoming.meaning),
      example: prefer(&existing.example, &incoming.example),
      example_translation: prefer(&existing.example_translation, &incoming.example_translation),
      source: merge_sources(&existing.source, &incoming.source),
      ..existing.clone()
    }
  }

  fn merge_prompt(existing: &Self, incoming: &Self) -> String {
    format!(
      r#"Merge these two dictionary entries for the English word "{}" into one.

Entry 1 (existing):
Phonetic: {}
Meaning: {}
Example: {}

Entry 2 (new):
Phonetic: {}
Meaning: {}
Example: {}

Reply with JSON only:
{{"phonetic": "...", "meaning": "combined meaning without repetition", "example": "...", "example_translation": "...", "reason": "why"}}"#,
      existing.word,
      or_none(&existing.phonetic),
      existing.meaning,
      or_none(&existing.example),
      or_none(&incoming.phonetic),
      incoming.meaning,
      or_none(&incoming.example),
    )
  }

  fn apply_model_proposal(existing: &Self, incoming: &Self, proposal: &Value) -> Option<Self> {
    proposal.as_object()?;
    Some(Self {
      phonetic: proposal_str(proposal, "phonetic").or_else(|| prefer(&existing.phonetic, &incoming.phonetic)),
      meaning: proposal_str(proposal, "meaning").unwrap_or_else(|| prefer_str(&existing.meaning, &incoming.meaning)),
      example: proposal_str(proposal, "example").or_else(|| prefer(&existing.example, &incoming.example)),
      example_translation: proposal_str(proposal, "example_translation")
        .or_else(|| prefer(&existing.example_translation, &incoming.example_translation)),
      source: merge_sources(&existing.source, &incoming.source),
      ..existing.clone()
    })
  }
}
