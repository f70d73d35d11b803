//! Fuzzy text similarity used to catch near-duplicates that hashing misses.

use std::collections::HashMap;

/// Lowercased word tokens, punctuation stripped, single characters dropped
fn tokens(s: &str) -> Vec<String> {
  s.to_lowercase()
    .split(|c: char| !c.is_alphanumeric())
    .filter(|t| t.chars().count() > 1)
    .map(str::to_string)
    .collect()
}

/// Cosine similarity of term-frequency vectors, 0.0..=1.0
pub fn token_cosine(a: &str, b: &str) -> f64 {
  let mut freq_a: HashMap<String, f64> = HashMap::new();
  for t in tokens(a) {
    *freq_a.entry(t).or_default() += 1.0;
  }
  let mut freq_b: HashMap<String, f64> = HashMap::new();
  for t in tokens(b) {
    *freq_b.entry(t).or_default() += 1.0;
  }
  if freq_a.is_empty() || freq_b.is_empty() {
    return 0.0;
  }

  let dot: f64 = freq_a
    .iter()
    .filter_map(|(t, x)| freq_b.get(t).map(|y| x * y))
    .sum();
  let norm_a = freq_a.values().map(|x| x * x).sum::<f64>().sqrt();
  let norm_b = freq_b.values().map(|x| x * x).sum::<f64>().sqrt();
  dot / (norm_a * norm_b)
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
  let mut prev: Vec<usize> = (0..=b.len()).collect();
  let mut curr = vec![0; b.len() + 1];
  for (i, ca) in a.iter().enumerate() {
    curr[0] = i + 1;
    for (j, cb) in b.iter().enumerate() {
      let cost = usize::from(ca != cb);
      curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
    }
    std::mem::swap(&mut prev, &mut curr);
  }
  prev[b.len()]
}

/// Normalized edit-distance ratio for short strings (phrases, names)
pub fn name_similarity(a: &str, b: &str) -> f64 {
  let a: Vec<char> = a.trim().to_lowercase().chars().collect();
  let b: Vec<char> = b.trim().to_lowercase().chars().collect();
  let longest = a.len().max(b.len());
  if longest == 0 {
    return 1.0;
  }
  1.0 - levenshtein(&a, &b) as f64 / longest as f64
}

/// Highest-scoring candidate at or above `threshold`
pub fn find_best_match<'a, T>(
  candidates: &'a [T],
  key: impl Fn(&T) -> &str,
  target: &str,
  threshold: f64,
) -> Option<(&'a T, f64)> {
  candidates
    .iter()
    .map(|c| {
      let k = key(c);
      (c, name_similarity(k, target).max(token_cosine(k, target)))
    })
    .filter(|(_, score)| *score >= threshold)
    .max_by(|a, b| a.1.total_cmp(&b.1))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_token_cosine_identical() {
    let s = "She has lived here since 2010.";
    assert!((token_cosine(s, s) - 1.0).abs() < 1e-9);
  }

  #[test]
  fn test_token_cosine_ignores_case_and_punctuation() {
    let a = "Have you ever been to London?";
    let b = "have you ever been to london";
    assert!((token_cosine(a, b) - 1.0).abs() < 1e-9);
  }

  #[test]
  fn test_token_cosine_disjoint() {
    assert_eq!(token_cosine("apple banana", "cherry durian"), 0.0);
    assert_eq!(token_cosine("", "anything"), 0.0);
  }

  #[test]
  fn test_name_similarity() {
    assert_eq!(name_similarity("give up", "Give Up"), 1.0);
    assert!(name_similarity("give up", "gave up") > 0.8);
    assert!(name_similarity("give up", "take off") < 0.5);
  }

  #[test]
  fn test_find_best_match() {
    let names = vec!["present perfect".to_string(), "past simple".to_string()];
    let (hit, score) = find_best_match(&names, |s| s.as_str(), "Present Perfect ", 0.8).unwrap();
    assert_eq!(hit, "present perfect");
    assert!(score >= 0.99);
    assert!(find_best_match(&names, |s| s.as_str(), "future continuous", 0.8).is_none());
  }
}
