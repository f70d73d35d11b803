//! CRUD for learning content (words, collocations, grammar, families, drills, articles)

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result};
use serde::Deserialize;

use super::{json_column, parse_ts, to_json, ts};
use crate::domain::{
  Article, Collocation, FamilyMember, GrammarPoint, ItemKind, TransformationForm, Word,
  WordFamily, WordTransformation,
};

fn default_difficulty() -> i64 {
  1
}

fn default_level() -> String {
  "intermediate".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewWord {
  pub word: String,
  #[serde(default)]
  pub phonetic: Option<String>,
  pub meaning: String,
  #[serde(default)]
  pub example: Option<String>,
  #[serde(default)]
  pub example_translation: Option<String>,
  #[serde(default = "default_difficulty")]
  pub difficulty: i64,
  #[serde(default)]
  pub source: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCollocation {
  pub phrase: String,
  pub meaning: String,
  #[serde(default)]
  pub example: Option<String>,
  #[serde(default)]
  pub category: Option<String>,
  #[serde(default = "default_difficulty")]
  pub difficulty: i64,
  #[serde(default)]
  pub source: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewGrammarPoint {
  pub name: String,
  #[serde(default)]
  pub category: Option<String>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub examples: Vec<String>,
  #[serde(default = "default_difficulty")]
  pub level: i64,
  #[serde(default)]
  pub source: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewWordFamily {
  pub root_word: String,
  #[serde(default)]
  pub meaning: Option<String>,
  #[serde(default)]
  pub members: Vec<FamilyMember>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTransformation {
  pub base_word: String,
  pub base_meaning: String,
  #[serde(default)]
  pub transformations: Vec<TransformationForm>,
  #[serde(default = "default_difficulty")]
  pub difficulty: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewArticle {
  pub title: String,
  pub content: String,
  #[serde(default = "default_level")]
  pub level: String,
  #[serde(default)]
  pub category: Option<String>,
  #[serde(default)]
  pub questions: serde_json::Value,
}

/// Whether an item of the given kind exists
pub fn item_exists(conn: &Connection, kind: ItemKind, id: i64) -> Result<bool> {
  let found: Option<i64> = conn
    .query_row(
      &format!("SELECT id FROM {} WHERE id = ?1", kind.table()),
      params![id],
      |row| row.get(0),
    )
    .optional()?;
  Ok(found.is_some())
}

pub fn count_items(conn: &Connection, kind: ItemKind) -> Result<i64> {
  conn.query_row(&format!("SELECT COUNT(*) FROM {}", kind.table()), [], |row| row.get(0))
}

fn like_pattern(search: Option<&str>) -> String {
  match search.map(str::trim).filter(|s| !s.is_empty()) {
    Some(s) => format!("%{}%", s),
    None => "%".to_string(),
  }
}

// ==================== Words ====================

const WORD_COLUMNS: &str =
  "id, word, phonetic, meaning, example, example_translation, difficulty, source, created_at";

fn row_to_word(row: &rusqlite::Row) -> Result<Word> {
  let created_at: String = row.get(8)?;
  Ok(Word {
    id: row.get(0)?,
    word: row.get(1)?,
    phonetic: row.get(2)?,
    meaning: row.get(3)?,
    example: row.get(4)?,
    example_translation: row.get(5)?,
    difficulty: row.get(6)?,
    source: row.get(7)?,
    created_at: parse_ts(&created_at),
  })
}

pub fn insert_word(conn: &Connection, w: &NewWord) -> Result<i64> {
  conn.execute(
    r#"
    INSERT INTO words (word, phonetic, meaning, example, example_translation, difficulty, source, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
    "#,
    params![
      w.word.trim(),
      w.phonetic,
      w.meaning,
      w.example,
      w.example_translation,
      w.difficulty,
      w.source,
      ts(&Utc::now()),
    ],
  )?;
  Ok(conn.last_insert_rowid())
}

pub fn update_word(conn: &Connection, w: &Word) -> Result<()> {
  conn.execute(
    r#"
    UPDATE words SET phonetic = ?1, meaning = ?2, example = ?3, example_translation = ?4,
                     difficulty = ?5, source = ?6
    WHERE id = ?7
    "#,
    params![w.phonetic, w.meaning, w.example, w.example_translation, w.difficulty, w.source, w.id],
  )?;
  Ok(())
}

pub fn get_word(conn: &Connection, id: i64) -> Result<Option<Word>> {
  conn
    .query_row(
      &format!("SELECT {} FROM words WHERE id = ?1", WORD_COLUMNS),
      params![id],
      row_to_word,
    )
    .optional()
}

/// Case-insensitive exact lookup
pub fn find_word(conn: &Connection, word: &str) -> Result<Option<Word>> {
  conn
    .query_row(
      &format!("SELECT {} FROM words WHERE word = ?1 COLLATE NOCASE", WORD_COLUMNS),
      params![word.trim()],
      row_to_word,
    )
    .optional()
}

pub fn list_words(conn: &Connection, search: Option<&str>, limit: usize, offset: usize) -> Result<Vec<Word>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {} FROM words WHERE word LIKE ?1 OR meaning LIKE ?1 ORDER BY word LIMIT ?2 OFFSET ?3",
    WORD_COLUMNS
  ))?;
  let words = stmt
    .query_map(params![like_pattern(search), limit as i64, offset as i64], row_to_word)?
    .collect::<Result<Vec<_>>>()?;
  Ok(words)
}

// ==================== Collocations ====================

const COLLOCATION_COLUMNS: &str = "id, phrase, meaning, example, category, difficulty, source, created_at";

fn row_to_collocation(row: &rusqlite::Row) -> Result<Collocation> {
  let created_at: String = row.get(7)?;
  Ok(Collocation {
    id: row.get(0)?,
    phrase: row.get(1)?,
    meaning: row.get(2)?,
    example: row.get(3)?,
    category: row.get(4)?,
    difficulty: row.get(5)?,
    source: row.get(6)?,
    created_at: parse_ts(&created_at),
  })
}

pub fn insert_collocation(conn: &Connection, c: &NewCollocation) -> Result<i64> {
  conn.execute(
    r#"
    INSERT INTO collocations (phrase, meaning, example, category, difficulty, source, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    "#,
    params![
      c.phrase.trim(),
      c.meaning,
      c.example,
      c.category,
      c.difficulty,
      c.source,
      ts(&Utc::now()),
    ],
  )?;
  Ok(conn.last_insert_rowid())
}

pub fn update_collocation(conn: &Connection, c: &Collocation) -> Result<()> {
  conn.execute(
    r#"
    UPDATE collocations SET meaning = ?1, example = ?2, category = ?3, difficulty = ?4, source = ?5
    WHERE id = ?6
    "#,
    params![c.meaning, c.example, c.category, c.difficulty, c.source, c.id],
  )?;
  Ok(())
}

pub fn get_collocation(conn: &Connection, id: i64) -> Result<Option<Collocation>> {
  conn
    .query_row(
      &format!("SELECT {} FROM collocations WHERE id = ?1", COLLOCATION_COLUMNS),
      params![id],
      row_to_collocation,
    )
    .optional()
}

pub fn find_collocation(conn: &Connection, phrase: &str) -> Result<Option<Collocation>> {
  conn
    .query_row(
      &format!(
        "SELECT {} FROM collocations WHERE phrase = ?1 COLLATE NOCASE",
        COLLOCATION_COLUMNS
      ),
      params![phrase.trim()],
      row_to_collocation,
    )
    .optional()
}

pub fn list_collocations(
  conn: &Connection,
  search: Option<&str>,
  category: Option<&str>,
  limit: usize,
  offset: usize,
) -> Result<Vec<Collocation>> {
  let mut stmt = conn.prepare(&format!(
    r#"SELECT {} FROM collocations
       WHERE (phrase LIKE ?1 OR meaning LIKE ?1) AND (?2 IS NULL OR category = ?2)
       ORDER BY phrase LIMIT ?3 OFFSET ?4"#,
    COLLOCATION_COLUMNS
  ))?;
  let rows = stmt
    .query_map(
      params![like_pattern(search), category, limit as i64, offset as i64],
      row_to_collocation,
    )?
    .collect::<Result<Vec<_>>>()?;
  Ok(rows)
}

// ==================== Grammar points ====================

const GRAMMAR_COLUMNS: &str = "id, name, category, description, examples, level, source, created_at";

fn row_to_grammar_point(row: &rusqlite::Row) -> Result<GrammarPoint> {
  let created_at: String = row.get(7)?;
  Ok(GrammarPoint {
    id: row.get(0)?,
    name: row.get(1)?,
    category: row.get(2)?,
    description: row.get(3)?,
    examples: json_column(row.get(4)?),
    level: row.get(5)?,
    source: row.get(6)?,
    created_at: parse_ts(&created_at),
  })
}

pub fn insert_grammar_point(conn: &Connection, g: &NewGrammarPoint) -> Result<i64> {
  conn.execute(
    r#"
    INSERT INTO grammar_points (name, category, description, examples, level, source, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    "#,
    params![
      g.name.trim(),
      g.category,
      g.description,
      to_json(&g.examples),
      g.level,
      g.source,
      ts(&Utc::now()),
    ],
  )?;
  Ok(conn.last_insert_rowid())
}

pub fn update_grammar_point(conn: &Connection, g: &GrammarPoint) -> Result<()> {
  conn.execute(
    r#"
    UPDATE grammar_points SET category = ?1, description = ?2, examples = ?3, level = ?4, source = ?5
    WHERE id = ?6
    "#,
    params![g.category, g.description, to_json(&g.examples), g.level, g.source, g.id],
  )?;
  Ok(())
}

pub fn get_grammar_point(conn: &Connection, id: i64) -> Result<Option<GrammarPoint>> {
  conn
    .query_row(
      &format!("SELECT {} FROM grammar_points WHERE id = ?1", GRAMMAR_COLUMNS),
      params![id],
      row_to_grammar_point,
    )
    .optional()
}

pub fn find_grammar_point(conn: &Connection, name: &str) -> Result<Option<GrammarPoint>> {
  conn
    .query_row(
      &format!("SELECT {} FROM grammar_points WHERE name = ?1 COLLATE NOCASE", GRAMMAR_COLUMNS),
      params![name.trim()],
      row_to_grammar_point,
    )
    .optional()
}

pub fn list_grammar_points(
  conn: &Connection,
  category: Option<&str>,
  limit: usize,
  offset: usize,
) -> Result<Vec<GrammarPoint>> {
  let mut stmt = conn.prepare(&format!(
    r#"SELECT {} FROM grammar_points WHERE (?1 IS NULL OR category = ?1)
       ORDER BY level, name LIMIT ?2 OFFSET ?3"#,
    GRAMMAR_COLUMNS
  ))?;
  let rows = stmt
    .query_map(params![category, limit as i64, offset as i64], row_to_grammar_point)?
    .collect::<Result<Vec<_>>>()?;
  Ok(rows)
}

// ==================== Word families ====================

fn row_to_word_family(row: &rusqlite::Row) -> Result<WordFamily> {
  let created_at: String = row.get(4)?;
  Ok(WordFamily {
    id: row.get(0)?,
    root_word: row.get(1)?,
    meaning: row.get(2)?,
    members: json_column(row.get(3)?),
    created_at: parse_ts(&created_at),
  })
}

pub fn insert_word_family(conn: &Connection, f: &NewWordFamily) -> Result<i64> {
  conn.execute(
    "INSERT INTO word_families (root_word, meaning, members, created_at) VALUES (?1, ?2, ?3, ?4)",
    params![f.root_word.trim(), f.meaning, to_json(&f.members), ts(&Utc::now())],
  )?;
  Ok(conn.last_insert_rowid())
}

pub fn get_word_family(conn: &Connection, id: i64) -> Result<Option<WordFamily>> {
  conn
    .query_row(
      "SELECT id, root_word, meaning, members, created_at FROM word_families WHERE id = ?1",
      params![id],
      row_to_word_family,
    )
    .optional()
}

pub fn find_word_family(conn: &Connection, root_word: &str) -> Result<Option<WordFamily>> {
  conn
    .query_row(
      "SELECT id, root_word, meaning, members, created_at FROM word_families WHERE root_word = ?1 COLLATE NOCASE",
      params![root_word.trim()],
      row_to_word_family,
    )
    .optional()
}

pub fn list_word_families(conn: &Connection, limit: usize, offset: usize) -> Result<Vec<WordFamily>> {
  let mut stmt = conn.prepare(
    "SELECT id, root_word, meaning, members, created_at FROM word_families ORDER BY root_word LIMIT ?1 OFFSET ?2",
  )?;
  let rows = stmt
    .query_map(params![limit as i64, offset as i64], row_to_word_family)?
    .collect::<Result<Vec<_>>>()?;
  Ok(rows)
}

// ==================== Word transformations ====================

fn row_to_transformation(row: &rusqlite::Row) -> Result<WordTransformation> {
  let created_at: String = row.get(5)?;
  Ok(WordTransformation {
    id: row.get(0)?,
    base_word: row.get(1)?,
    base_meaning: row.get(2)?,
    transformations: json_column(row.get(3)?),
    difficulty: row.get(4)?,
    created_at: parse_ts(&created_at),
  })
}

pub fn insert_transformation(conn: &Connection, t: &NewTransformation) -> Result<i64> {
  conn.execute(
    r#"
    INSERT INTO word_transformations (base_word, base_meaning, transformations, difficulty, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5)
    "#,
    params![
      t.base_word.trim(),
      t.base_meaning,
      to_json(&t.transformations),
      t.difficulty,
      ts(&Utc::now()),
    ],
  )?;
  Ok(conn.last_insert_rowid())
}

pub fn get_transformation(conn: &Connection, id: i64) -> Result<Option<WordTransformation>> {
  conn
    .query_row(
      "SELECT id, base_word, base_meaning, transformations, difficulty, created_at FROM word_transformations WHERE id = ?1",
      params![id],
      row_to_transformation,
    )
    .optional()
}

pub fn find_transformation(conn: &Connection, base_word: &str) -> Result<Option<WordTransformation>> {
  conn
    .query_row(
      "SELECT id, base_word, base_meaning, transformations, difficulty, created_at FROM word_transformations WHERE base_word = ?1 COLLATE NOCASE",
      params![base_word.trim()],
      row_to_transformation,
    )
    .optional()
}

pub fn list_transformations(
  conn: &Connection,
  difficulty: Option<i64>,
  limit: usize,
  offset: usize,
) -> Result<Vec<WordTransformation>> {
  let mut stmt = conn.prepare(
    r#"SELECT id, base_word, base_meaning, transformations, difficulty, created_at
       FROM word_transformations WHERE (?1 IS NULL OR difficulty = ?1)
       ORDER BY base_word LIMIT ?2 OFFSET ?3"#,
  )?;
  let rows = stmt
    .query_map(params![difficulty, limit as i64, offset as i64], row_to_transformation)?
    .collect::<Result<Vec<_>>>()?;
  Ok(rows)
}

// ==================== Articles ====================

fn row_to_article(row: &rusqlite::Row) -> Result<Article> {
  let created_at: String = row.get(8)?;
  let questions: Option<String> = row.get(7)?;
  Ok(Article {
    id: row.get(0)?,
    title: row.get(1)?,
    content: row.get(2)?,
    level: row.get(3)?,
    word_count: row.get(4)?,
    read_time: row.get(5)?,
    category: row.get(6)?,
    questions: questions
      .and_then(|q| serde_json::from_str(&q).ok())
      .unwrap_or(serde_json::Value::Array(Vec::new())),
    created_at: parse_ts(&created_at),
  })
}

pub fn insert_article(conn: &Connection, a: &NewArticle) -> Result<i64> {
  let (word_count, read_time) = Article::measure(&a.content);
  let questions = if a.questions.is_null() {
    serde_json::Value::Array(Vec::new())
  } else {
    a.questions.clone()
  };
  conn.execute(
    r#"
    INSERT INTO articles (title, content, level, word_count, read_time, category, questions, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
    "#,
    params![
      a.title.trim(),
      a.content,
      a.level,
      word_count,
      read_time,
      a.category,
      questions.to_string(),
      ts(&Utc::now()),
    ],
  )?;
  Ok(conn.last_insert_rowid())
}

pub fn get_article(conn: &Connection, id: i64) -> Result<Option<Article>> {
  conn
    .query_row(
      "SELECT id, title, content, level, word_count, read_time, category, questions, created_at FROM articles WHERE id = ?1",
      params![id],
      row_to_article,
    )
    .optional()
}

pub fn list_articles(conn: &Connection, level: Option<&str>, limit: usize, offset: usize) -> Result<Vec<Article>> {
  let mut stmt = conn.prepare(
    r#"SELECT id, title, content, level, word_count, read_time, category, questions, created_at
       FROM articles WHERE (?1 IS NULL OR level = ?1)
       ORDER BY created_at DESC LIMIT ?2 OFFSET ?3"#,
  )?;
  let rows = stmt
    .query_map(params![level, limit as i64, offset as i64], row_to_article)?
    .collect::<Result<Vec<_>>>()?;
  Ok(rows)
}
