//! Content fingerprints for exam questions.

use std::collections::HashMap;

use serde::Serialize;
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

use crate::domain::QuestionData;

/// NFC, trimmed, internal whitespace runs collapsed to one space
pub fn normalize_text(s: &str) -> String {
  let composed: String = s.nfc().collect();
  composed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Stable fingerprint of a question and its option set.
///
/// Option order does not matter; empty options are ignored.
pub fn question_hash(q: &QuestionData) -> String {
  let mut options: Vec<String> = q
    .options
    .iter()
    .map(|o| normalize_text(o))
    .filter(|o| !o.is_empty())
    .collect();
  options.sort();

  let canonical = format!("{}|||{}", normalize_text(&q.question), options.join("|"));
  hex::encode(Sha256::digest(canonical.as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
  pub hash: String,
  pub count: usize,
  /// Positions in the analyzed batch
  pub indices: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicationReport {
  pub total: usize,
  pub unique: usize,
  pub duplicates: usize,
  /// Percentage of entries that repeat an earlier one, two decimals
  pub duplication_rate: f64,
  pub groups: Vec<DuplicateGroup>,
}

/// Duplicate statistics for a batch of question hashes
pub fn analyze_duplication(hashes: &[String]) -> DuplicationReport {
  let mut positions: HashMap<&str, Vec<usize>> = HashMap::new();
  let mut order: Vec<&str> = Vec::new();
  for (i, h) in hashes.iter().enumerate() {
    let entry = positions.entry(h.as_str()).or_default();
    if entry.is_empty() {
      order.push(h.as_str());
    }
    entry.push(i);
  }

  let total = hashes.len();
  let unique = order.len();
  let duplicates = total - unique;
  let duplication_rate = if total > 0 {
    ((duplicates as f64 / total as f64) * 10000.0).round() / 100.0
  } else {
    0.0
  };

  let groups = order
    .into_iter()
    .filter_map(|h| {
      let indices = positions.remove(h)?;
      (indices.len() > 1).then(|| DuplicateGroup {
        hash: h.to_string(),
        count: indices.len(),
        indices,
      })
    })
    .collect();

  DuplicationReport {
    total,
    unique,
    duplicates,
    duplication_rate,
    groups,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_hash_is_idempotent() {
    let q = QuestionData::new("Choose the correct word.", &["affect", "effect"]);
    assert_eq!(question_hash(&q), question_hash(&q));
    assert_eq!(question_hash(&q).len(), 64);
  }

  #[test]
  fn test_hash_ignores_option_order() {
    let a = QuestionData::new("Pick one", &["A. go", "B. went", "C. gone"]);
    let b = QuestionData::new("Pick one", &["C. gone", "A. go", "B. went"]);
    assert_eq!(question_hash(&a), question_hash(&b));
  }

  #[test]
  fn test_hash_ignores_whitespace_noise() {
    let a = QuestionData::new("  She   ___ to school.\n", &[" goes ", "go"]);
    let b = QuestionData::new("She ___ to school.", &["go", "goes", ""]);
    assert_eq!(question_hash(&a), question_hash(&b));
  }

  #[test]
  fn test_hash_distinguishes_content() {
    let a = QuestionData::new("She ___ to school.", &["go", "goes"]);
    let b = QuestionData::new("He ___ to school.", &["go", "goes"]);
    let c = QuestionData::new("She ___ to school.", &["go", "went"]);
    assert_ne!(question_hash(&a), question_hash(&b));
    assert_ne!(question_hash(&a), question_hash(&c));
  }

  #[test]
  fn test_hash_unicode_composition() {
    let composed = QuestionData::new("caf\u{e9}", &[]);
    let decomposed = QuestionData::new("cafe\u{301}", &[]);
    assert_eq!(question_hash(&composed), question_hash(&decomposed));
  }

  #[test]
  fn test_hash_keeps_case_and_width() {
    let plain = question_hash(&QuestionData::new("Choose ABC", &[]));
    assert_ne!(plain, question_hash(&QuestionData::new("choose abc", &[])));
    assert_ne!(plain, question_hash(&QuestionData::new("Choose \u{ff21}\u{ff22}\u{ff23}", &[])));
  }

  #[test]
  fn test_analyze_duplication() {
    let hashes: Vec<String> = ["a", "b", "a", "c", "a", "b"].iter().map(|s| s.to_string()).collect();
    let report = analyze_duplication(&hashes);
    assert_eq!(report.total, 6);
    assert_eq!(report.unique, 3);
    assert_eq!(report.duplicates, 3);
    assert_eq!(report.duplication_rate, 50.0);
    assert_eq!(report.groups.len(), 2);
    assert_eq!(report.groups[0].hash, "a");
    assert_eq!(report.groups[0].indices, vec![0, 2, 4]);
  }

  #[test]
  fn test_analyze_empty() {
    let report = analyze_duplication(&[]);
    assert_eq!(report.total, 0);
    assert_eq!(report.duplication_rate, 0.0);
    assert!(report.groups.is_empty());
  }
}
