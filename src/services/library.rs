//! Library imports: new content is inserted, duplicates are resolved with a merge strategy.

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::ai::LanguageModel;
use crate::db::content::{self, NewCollocation, NewGrammarPoint, NewWord};
use crate::db::import_tasks::{self, ImportCounts};
use crate::db::{try_lock, DbPool};
use crate::dedup::{find_best_match, merge, MergeAction, MergeStrategy, Mergeable};
use crate::domain::{Collocation, GrammarPoint, Word};
use crate::error::ApiResult;

/// A content table that library imports can target
pub trait LibraryEntry: Mergeable + Serialize {
    type Input: Send + Sync;

    const TASK_TYPE: &'static str;

    fn id(&self) -> i64;
    fn key(&self) -> &str;
    fn input_key(input: &Self::Input) -> &str;
    fn validate(input: &Self::Input) -> Result<(), String>;
    /// Exact, case-insensitive key lookup
    fn find(conn: &Connection, key: &str) -> rusqlite::Result<Option<Self>>;
    /// Candidates for fuzzy matching
    fn scan(conn: &Connection, limit: usize) -> rusqlite::Result<Vec<Self>>;
    fn insert(conn: &Connection, input: &Self::Input, source: Option<&str>) -> rusqlite::Result<Option<Self>>;
    /// The incoming record shaped like `existing` so the two can be merged
    fn incoming(input: &Self::Input, existing: &Self, source: Option<&str>) -> Self;
    fn update(conn: &Connection, merged: &Self) -> rusqlite::Result<()>;
}

fn source_or(own: &Option<String>, fallback: Option<&str>) -> Option<String> {
    own.clone()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| fallback.map(str::to_string))
}

impl LibraryEntry for Collocation {
    type Input = NewCollocation;

    const TASK_TYPE: &'static str = "collocations";

    fn id(&self) -> i64 {
        self.id
    }

    fn key(&self) -> &str {
        &self.phrase
    }

    fn input_key(input: &NewCollocation) -> &str {
        &input.phrase
    }

    fn validate(input: &NewCollocation) -> Result<(), String> {
        if input.phrase.trim().is_empty() || input.meaning.trim().is_empty() {
            return Err("phrase and meaning are required".to_string());
        }
        Ok(())
    }

    fn find(conn: &Connection, key: &str) -> rusqlite::Result<Option<Self>> {
        content::find_collocation(conn, key)
    }

    fn scan(conn: &Connection, limit: usize) -> rusqlite::Result<Vec<Self>> {
        content::list_collocations(conn, None, None, limit, 0)
    }

    fn insert(conn: &Connection, input: &NewCollocation, source: Option<&str>) -> rusqlite::Result<Option<Self>> {
        let input = NewCollocation {
            source: source_or(&input.source, source),
            ..input.clone()
        };
        let id = content::insert_collocation(conn, &input)?;
        content::get_collocation(conn, id)
    }

    fn incoming(input: &NewCollocation, existing: &Self, source: Option<&str>) -> Self {
        Self {
            meaning: input.meaning.clone(),
            example: input.example.clone(),
            category: input.category.clone(),
            difficulty: input.difficulty,
            source: source_or(&input.source, source),
            ..existing.clone()
        }
    }

    fn update(conn: &Connection, merged: &Self) -> rusqlite::Result<()> {
        content::update_collocation(conn, merged)
    }
}

impl LibraryEntry for GrammarPoint {
    type Input = NewGrammarPoint;

    const TASK_TYPE: &'static str = "grammar_points";

    fn id(&self) -> i64 {
        self.id
    }

    fn key(&self) -> &str {
        &self.name
    }

    fn input_key(input: &NewGrammarPoint) -> &str {
        &input.name
    }

    fn validate(input: &NewGrammarPoint) -> Result<(), String> {
        if input.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        Ok(())
    }

    fn find(conn: &Connection, key: &str) -> rusqlite::Result<Option<Self>> {
        content::find_grammar_point(conn, key)
    }

    fn scan(conn: &Connection, limit: usize) -> rusqlite::Result<Vec<Self>> {
        content::list_grammar_points(conn, None, limit, 0)
    }

    fn insert(conn: &Connection, input: &NewGrammarPoint, source: Option<&str>) -> rusqlite::Result<Option<Self>> {
        let input = NewGrammarPoint {
            source: source_or(&input.source, source),
            ..input.clone()
        };
        let id = content::insert_grammar_point(conn, &input)?;
        content::get_grammar_point(conn, id)
    }

    fn incoming(input: &NewGrammarPoint, existing: &Self, source: Option<&str>) -> Self {
        Self {
            category: input.category.clone(),
            description: input.description.clone(),
            examples: input.examples.clone(),
            level: input.level,
            source: source_or(&input.source, source),
            ..existing.clone()
        }
    }

    fn update(conn: &Connection, merged: &Self) -> rusqlite::Result<()> {
        content::update_grammar_point(conn, merged)
    }
}

impl LibraryEntry for Word {
    type Input = NewWord;

    const TASK_TYPE: &'static str = "words";

    fn id(&self) -> i64 {
        self.id
    }

    fn key(&self) -> &str {
        &self.word
    }

    fn input_key(input: &NewWord) -> &str {
        &input.word
    }

    fn validate(input: &NewWord) -> Result<(), String> {
        if input.word.trim().is_empty() || input.meaning.trim().is_empty() {
            return Err("word and meaning are required".to_string());
        }
        Ok(())
    }

    fn find(conn: &Connection, key: &str) -> rusqlite::Result<Option<Self>> {
        content::find_word(conn, key)
    }

    /// Words are matched exactly only; near-identical spellings are different words
    fn scan(_conn: &Connection, _limit: usize) -> rusqlite::Result<Vec<Self>> {
        Ok(Vec::new())
    }

    fn insert(conn: &Connection, input: &NewWord, source: Option<&str>) -> rusqlite::Result<Option<Self>> {
        let input = NewWord {
            source: source_or(&input.source, source),
            ..input.clone()
        };
        let id = content::insert_word(conn, &input)?;
        content::get_word(conn, id)
    }

    fn incoming(input: &NewWord, existing: &Self, source: Option<&str>) -> Self {
        Self {
            phonetic: input.phonetic.clone(),
            meaning: input.meaning.clone(),
            example: input.example.clone(),
            example_translation: input.example_translation.clone(),
            difficulty: input.difficulty,
            source: source_or(&input.source, source),
            ..existing.clone()
        }
    }

    fn update(conn: &Connection, merged: &Self) -> rusqlite::Result<()> {
        content::update_word(conn, merged)
    }
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub strategy: MergeStrategy,
    /// Source label stamped on items that carry none
    pub source: Option<String>,
    pub similarity_threshold: f64,
    pub fuzzy_scan_limit: usize,
    pub created_by: Option<i64>,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Created,
    Merged,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportItemOutcome {
    pub index: usize,
    pub key: String,
    pub status: ImportStatus,
    pub id: Option<i64>,
    pub action: Option<MergeAction>,
    /// 1.0 for an exact key match
    pub similarity: Option<f64>,
    pub matched_key: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LibraryImportReport {
    pub task_id: i64,
    pub strategy: MergeStrategy,
    pub total: usize,
    pub created: usize,
    pub merged: usize,
    pub skipped: usize,
    pub failed: usize,
    pub items: Vec<ImportItemOutcome>,
}

impl LibraryImportReport {
    fn counts(&self) -> ImportCounts {
        ImportCounts {
            total: self.total as i64,
            new: self.created as i64,
            duplicate: (self.merged + self.skipped) as i64,
            failed: self.failed as i64,
        }
    }

    fn push(&mut self, outcome: ImportItemOutcome) {
        match outcome.status {
            ImportStatus::Created => self.created += 1,
            ImportStatus::Merged => self.merged += 1,
            ImportStatus::Skipped => self.skipped += 1,
            ImportStatus::Failed => self.failed += 1,
        }
        self.items.push(outcome);
    }
}

enum Lookup<T> {
    Created(T),
    Duplicate(T, f64),
}

/// Import a batch of entries of one kind.
///
/// The database lock is released while a smart merge waits on the model.
/// The import task is always completed, with the error message when a
/// database failure stops the batch part way.
pub async fn import_items<T, M>(
    pool: &DbPool,
    model: &M,
    inputs: &[T::Input],
    opts: &ImportOptions,
) -> ApiResult<LibraryImportReport>
where
    T: LibraryEntry,
    M: LanguageModel,
{
    let task_id = {
        let conn = try_lock(pool)?;
        import_tasks::start_task(
            &conn,
            T::TASK_TYPE,
            opts.file_name.as_deref(),
            Some(opts.strategy.as_str()),
            opts.created_by,
            inputs.len() as i64,
        )?
    };

    let mut report = LibraryImportReport {
        task_id,
        strategy: opts.strategy,
        total: inputs.len(),
        created: 0,
        merged: 0,
        skipped: 0,
        failed: 0,
        items: Vec::with_capacity(inputs.len()),
    };

    let result = run_import::<T, M>(pool, model, inputs, opts, &mut report).await;
    let error = result.as_ref().err().map(|e| e.message().to_string());
    {
        let conn = try_lock(pool)?;
        import_tasks::complete_task(&conn, task_id, report.counts(), error.as_deref())?;
    }
    if let Err(e) = result {
        tracing::error!(task_id, kind = T::TASK_TYPE, "Library import aborted: {}", e.message());
        return Err(e);
    }

    tracing::info!(
        task_id,
        kind = T::TASK_TYPE,
        strategy = opts.strategy.as_str(),
        created = report.created,
        merged = report.merged,
        skipped = report.skipped,
        failed = report.failed,
        at = %Utc::now(),
        "Library import finished"
    );
    Ok(report)
}

async fn run_import<T, M>(
    pool: &DbPool,
    model: &M,
    inputs: &[T::Input],
    opts: &ImportOptions,
    report: &mut LibraryImportReport,
) -> ApiResult<()>
where
    T: LibraryEntry,
    M: LanguageModel,
{
    let source = opts.source.as_deref();
    let mut candidates = {
        let conn = try_lock(pool)?;
        T::scan(&conn, opts.fuzzy_scan_limit)?
    };

    for (index, input) in inputs.iter().enumerate() {
        let key = T::input_key(input).trim().to_string();
        let failed = |reason: String| ImportItemOutcome {
            index,
            key: key.clone(),
            status: ImportStatus::Failed,
            id: None,
            action: None,
            similarity: None,
            matched_key: None,
            reason: Some(reason),
        };

        if let Err(reason) = T::validate(input) {
            report.push(failed(reason));
            continue;
        }

        let lookup = {
            let conn = try_lock(pool)?;
            match T::find(&conn, &key)? {
                Some(existing) => Lookup::Duplicate(existing, 1.0),
                None => match find_best_match(&candidates, |c| c.key(), &key, opts.similarity_threshold) {
                    Some((existing, score)) => Lookup::Duplicate(existing.clone(), score),
                    None => match T::insert(&conn, input, source) {
                        Ok(Some(created)) => Lookup::Created(created),
                        Ok(None) => {
                            report.push(failed("row missing after insert".to_string()));
                            continue;
                        }
                        Err(e) => {
                            tracing::warn!("Library import of '{}' failed: {}", key, e);
                            report.push(failed(e.to_string()));
                            continue;
                        }
                    },
                },
            }
        };

        let (existing, similarity) = match lookup {
            Lookup::Created(created) => {
                report.push(ImportItemOutcome {
                    index,
                    key: key.clone(),
                    status: ImportStatus::Created,
                    id: Some(created.id()),
                    action: None,
                    similarity: None,
                    matched_key: None,
                    reason: None,
                });
                candidates.push(created);
                continue;
            }
            Lookup::Duplicate(existing, similarity) => (existing, similarity),
        };

        let incoming = T::incoming(input, &existing, source);
        let outcome = merge(opts.strategy, model, &existing, &incoming).await;

        if outcome.changed {
            let conn = try_lock(pool)?;
            if let Err(e) = T::update(&conn, &outcome.merged) {
                tracing::warn!("Saving merged '{}' failed: {}", key, e);
                report.push(failed(e.to_string()));
                continue;
            }
        }

        let id = outcome.merged.id();
        if let Some(slot) = candidates.iter_mut().find(|c| c.id() == id) {
            *slot = outcome.merged.clone();
        }
        report.push(ImportItemOutcome {
            index,
            key: key.clone(),
            status: if outcome.action == MergeAction::Skipped {
                ImportStatus::Skipped
            } else {
                ImportStatus::Merged
            },
            id: Some(id),
            action: Some(outcome.action),
            similarity: Some((similarity * 100.0).round() / 100.0),
            matched_key: Some(existing.key().to_string()),
            reason: Some(outcome.reason),
        });
    }
    Ok(())
}

pub async fn import_collocations<M: LanguageModel>(
    pool: &DbPool,
    model: &M,
    items: &[NewCollocation],
    opts: &ImportOptions,
) -> ApiResult<LibraryImportReport> {
    import_items::<Collocation, M>(pool, model, items, opts).await
}

pub async fn import_grammar_points<M: LanguageModel>(
    pool: &DbPool,
    model: &M,
    items: &[NewGrammarPoint],
    opts: &ImportOptions,
) -> ApiResult<LibraryImportReport> {
    import_items::<GrammarPoint, M>(pool, model, items, opts).await
}

pub async fn import_words<M: LanguageModel>(
    pool: &DbPool,
    model: &M,
    items: &[NewWord],
    opts: &ImportOptions,
) -> ApiResult<LibraryImportReport> {
    import_items::<Word, M>(pool, model, items, opts).await
}
