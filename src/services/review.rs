//! Recording answers and assembling review batches.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::{content, mistakes, progress};
use crate::domain::{ItemKind, LearningItem, NewMistake, ProgressRecord, ProgressStats};
use crate::error::{ApiError, ApiResult};
use crate::srs::{format_relative, transition};

/// Apply one answer to the learner's record for an item, creating it on first contact
pub fn record_outcome(
    conn: &Connection,
    user_id: i64,
    kind: ItemKind,
    item_id: i64,
    is_correct: bool,
    now: DateTime<Utc>,
) -> ApiResult<ProgressRecord> {
    if !content::item_exists(conn, kind, item_id)? {
        return Err(ApiError::not_found(format!("{} {} not found", kind.as_str(), item_id)));
    }

    let current = progress::get_progress(conn, user_id, kind, item_id)?;
    let next = transition(current.as_ref(), is_correct, now);
    progress::save_transition(conn, user_id, kind, item_id, &next)?;

    tracing::debug!(
        user_id,
        kind = kind.as_str(),
        item_id,
        is_correct,
        mastery = next.mastery_level,
        "Recorded review outcome"
    );

    progress::get_progress(conn, user_id, kind, item_id)?
        .ok_or_else(|| ApiError::save("progress row missing after upsert"))
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionResult {
    pub progress: ProgressRecord,
    /// Set when the wrong answer was filed in the mistake book
    pub mistake_id: Option<i64>,
}

/// Record an answer and, when it is wrong, file the mistake.
///
/// Both writes share one transaction: either both land or neither does.
pub fn record_submission(
    conn: &Connection,
    user_id: i64,
    kind: ItemKind,
    item_id: i64,
    is_correct: bool,
    mistake: Option<&NewMistake>,
    now: DateTime<Utc>,
) -> ApiResult<SubmissionResult> {
    let tx = conn.unchecked_transaction()?;

    let progress = record_outcome(&tx, user_id, kind, item_id, is_correct, now)?;
    let mistake_id = match mistake.filter(|m| !is_correct && !m.question.trim().is_empty()) {
        Some(m) => Some(mistakes::upsert_mistake(
            &tx,
            user_id,
            Some((kind, item_id)),
            None,
            m,
            now,
        )?),
        None => None,
    };

    tx.commit()?;
    Ok(SubmissionResult {
        progress,
        mistake_id,
    })
}

/// Due items (earliest first) topped up with never-studied items, at most `limit`
pub fn get_due_items(
    conn: &Connection,
    user_id: i64,
    kind: ItemKind,
    now: DateTime<Utc>,
    limit: usize,
) -> rusqlite::Result<Vec<LearningItem>> {
    let mut items = progress::get_due_items(conn, user_id, kind, now, limit)?;
    if items.len() < limit {
        items.extend(progress::get_unstudied_items(conn, user_id, kind, limit - items.len())?);
    }
    Ok(items)
}

#[derive(Debug, Clone, Serialize)]
pub struct DueBatch {
    pub items: Vec<LearningItem>,
    pub due_count: usize,
    pub new_count: usize,
    /// Earliest scheduled review, shown when nothing is due
    pub next_review_at: Option<DateTime<Utc>>,
    pub next_review_in: Option<String>,
}

pub fn due_batch(
    conn: &Connection,
    user_id: i64,
    kind: ItemKind,
    now: DateTime<Utc>,
    limit: usize,
) -> rusqlite::Result<DueBatch> {
    let items = get_due_items(conn, user_id, kind, now, limit)?;
    let new_count = items.iter().filter(|i| i.mastery_level.is_none()).count();
    let next_review_at = progress::get_next_review_time(conn, user_id, kind)?;

    Ok(DueBatch {
        due_count: items.len() - new_count,
        new_count,
        next_review_in: next_review_at.map(|t| format_relative(t, now)),
        next_review_at,
        items,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsView {
    #[serde(flatten)]
    pub stats: ProgressStats,
    pub accuracy: i64,
    pub next_review_in: Option<String>,
}

pub fn progress_stats(
    conn: &Connection,
    user_id: i64,
    kind: ItemKind,
    now: DateTime<Utc>,
) -> rusqlite::Result<StatsView> {
    let stats = progress::get_stats(conn, user_id, kind, now)?;
    let next = progress::get_next_review_time(conn, user_id, kind)?;
    Ok(StatsView {
        accuracy: stats.accuracy(),
        next_review_in: next.map(|t| format_relative(t, now)),
        stats,
    })
}
