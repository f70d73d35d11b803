//! Starter content for a fresh database

use rusqlite::{Connection, Result};

use super::content::{
  self, NewArticle, NewCollocation, NewGrammarPoint, NewTransformation, NewWord, NewWordFamily,
};
use crate::domain::{FamilyMember, ItemKind, TransformationForm};

const SEED_SOURCE: &str = "starter";

fn word(word: &str, phonetic: &str, meaning: &str, example: &str, difficulty: i64) -> NewWord {
  NewWord {
    word: word.to_string(),
    phonetic: Some(phonetic.to_string()),
    meaning: meaning.to_string(),
    example: Some(example.to_string()),
    example_translation: None,
    difficulty,
    source: Some(SEED_SOURCE.to_string()),
  }
}

fn collocation(phrase: &str, meaning: &str, example: &str, category: &str) -> NewCollocation {
  NewCollocation {
    phrase: phrase.to_string(),
    meaning: meaning.to_string(),
    example: Some(example.to_string()),
    category: Some(category.to_string()),
    difficulty: 1,
    source: Some(SEED_SOURCE.to_string()),
  }
}

fn member(word: &str, pos: &str, meaning: &str) -> FamilyMember {
  FamilyMember {
    word: word.to_string(),
    part_of_speech: Some(pos.to_string()),
    meaning: Some(meaning.to_string()),
  }
}

fn form(word: &str, pos: &str, sentence: &str) -> TransformationForm {
  TransformationForm {
    word: word.to_string(),
    part_of_speech: Some(pos.to_string()),
    meaning: None,
    sentence: Some(sentence.to_string()),
    answer: Some(word.to_string()),
  }
}

/// Insert starter content into every empty content table.
///
/// Returns the number of rows written.
pub fn seed_content(conn: &Connection) -> Result<usize> {
  let mut inserted = 0;

  if content::count_items(conn, ItemKind::Word)? == 0 {
    let words = [
      word("abandon", "/əˈbændən/", "放弃；抛弃", "They had to abandon the car in the snow.", 2),
      word("benefit", "/ˈbenɪfɪt/", "好处；受益", "Regular exercise has many benefits.", 1),
      word("curious", "/ˈkjʊəriəs/", "好奇的", "Children are naturally curious.", 1),
      word("determine", "/dɪˈtɜːmɪn/", "决定；确定", "Tests will determine the cause.", 2),
      word("efficient", "/ɪˈfɪʃnt/", "高效的", "The new engine is more efficient.", 2),
    ];
    for w in &words {
      content::insert_word(conn, w)?;
    }
    inserted += words.len();
  }

  if content::count_items(conn, ItemKind::Collocation)? == 0 {
    let collocations = [
      collocation("give up", "放弃", "Don't give up on your dreams.", "phrasal_verb"),
      collocation("make a decision", "做决定", "She made a decision to study abroad.", "verb_noun"),
      collocation("take part in", "参加", "Over 200 students took part in the race.", "phrasal_verb"),
      collocation("heavy rain", "大雨", "Heavy rain delayed the match.", "adj_noun"),
    ];
    for c in &collocations {
      content::insert_collocation(conn, c)?;
    }
    inserted += collocations.len();
  }

  if content::count_items(conn, ItemKind::GrammarPoint)? == 0 {
    let points = [
      NewGrammarPoint {
        name: "Present perfect".to_string(),
        category: Some("tense".to_string()),
        description: Some("have/has + past participle for past actions linked to now".to_string()),
        examples: vec![
          "I have lived here since 2010.".to_string(),
          "She has already finished her homework.".to_string(),
        ],
        level: 2,
        source: Some(SEED_SOURCE.to_string()),
      },
      NewGrammarPoint {
        name: "Defining relative clauses".to_string(),
        category: Some("clause".to_string()),
        description: Some("who/which/that clauses that identify the noun".to_string()),
        examples: vec!["The book that I borrowed is overdue.".to_string()],
        level: 3,
        source: Some(SEED_SOURCE.to_string()),
      },
    ];
    for g in &points {
      content::insert_grammar_point(conn, g)?;
    }
    inserted += points.len();
  }

  if content::count_items(conn, ItemKind::WordFamily)? == 0 {
    content::insert_word_family(
      conn,
      &NewWordFamily {
        root_word: "act".to_string(),
        meaning: Some("行动".to_string()),
        members: vec![
          member("action", "noun", "行动"),
          member("active", "adjective", "积极的"),
          member("actively", "adverb", "积极地"),
          member("activity", "noun", "活动"),
        ],
      },
    )?;
    inserted += 1;
  }

  if content::count_items(conn, ItemKind::Transformation)? == 0 {
    content::insert_transformation(
      conn,
      &NewTransformation {
        base_word: "decide".to_string(),
        base_meaning: "决定".to_string(),
        transformations: vec![
          form("decision", "noun", "It was a difficult ___ to make."),
          form("decisive", "adjective", "We need a ___ leader."),
        ],
        difficulty: 2,
      },
    )?;
    inserted += 1;
  }

  let articles: i64 = conn.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
  if articles == 0 {
    content::insert_article(
      conn,
      &NewArticle {
        title: "A Morning Walk".to_string(),
        content: "Every morning Tom walks his dog in the park. He enjoys the fresh air \
                  and often meets friends on the way. Walking helps him start the day with energy."
          .to_string(),
        level: "beginner".to_string(),
        category: Some("daily_life".to_string()),
        questions: serde_json::json!([
          { "question": "What does Tom do every morning?", "answer": "He walks his dog." }
        ]),
      },
    )?;
    inserted += 1;
  }

  if inserted > 0 {
    tracing::info!("Seeded {} starter content rows", inserted);
  }
  Ok(inserted)
}
