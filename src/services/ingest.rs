//! Question bank ingestion with hash-based deduplication.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::import_tasks::{self, ImportCounts};
use crate::db::{mistakes, questions};
use crate::dedup::{analyze_duplication, question_hash, DuplicationReport};
use crate::domain::{NewMistake, QuestionData};
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestResult {
    pub is_new: bool,
    pub id: i64,
    pub question_hash: String,
    pub appearance_count: i64,
}

/// Store a question unless an identical one exists, in which case count the sighting.
///
/// `paper` is (paper_id, position) and links the question to the paper it came from.
pub fn ingest_question(
    conn: &Connection,
    q: &QuestionData,
    paper: Option<(i64, i64)>,
    now: DateTime<Utc>,
) -> ApiResult<IngestResult> {
    if q.question.trim().is_empty() {
        return Err(ApiError::bad_request("Question text is empty"));
    }

    let hash = question_hash(q);
    let (id, appearance_count, is_new) = match questions::insert_question_if_absent(conn, &hash, q, now)? {
        Some(id) => (id, 1, true),
        None => {
            let (id, count) = questions::record_appearance(conn, &hash, now)?
                .ok_or_else(|| ApiError::save(format!("question {} vanished during ingest", hash)))?;
            (id, count, false)
        }
    };

    if let Some((paper_id, position)) = paper {
        questions::link_question_to_paper(conn, id, paper_id, Some(position))?;
    }

    Ok(IngestResult {
        is_new,
        id,
        question_hash: hash,
        appearance_count,
    })
}

fn default_version() -> String {
    "1".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaperMeta {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionOutcome {
    pub index: usize,
    #[serde(flatten)]
    pub result: Option<IngestResult>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaperIngestReport {
    pub paper_id: i64,
    pub task_id: i64,
    pub total: usize,
    pub new_count: usize,
    pub duplicate_count: usize,
    pub failed_count: usize,
    /// Repeats inside the uploaded document itself
    pub batch_duplication: DuplicationReport,
    pub questions: Vec<QuestionOutcome>,
}

/// Create a paper and ingest all of its questions in one transaction.
///
/// Questions that fail validation are reported and skipped; a database error
/// aborts the whole paper.
pub fn ingest_paper(
    conn: &Connection,
    meta: &PaperMeta,
    items: &[QuestionData],
    created_by: Option<i64>,
    now: DateTime<Utc>,
) -> ApiResult<PaperIngestReport> {
    let name = meta.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("Paper name is required"));
    }

    let task_id = import_tasks::start_task(
        conn,
        "exam_paper",
        meta.file_name.as_deref(),
        None,
        created_by,
        items.len() as i64,
    )?;

    let tx = conn.unchecked_transaction()?;
    let paper_id = questions::create_paper(
        &tx,
        name,
        &meta.version,
        meta.description.as_deref(),
        meta.file_name.as_deref(),
    )?;

    let mut outcomes = Vec::with_capacity(items.len());
    let mut counts = ImportCounts {
        total: items.len() as i64,
        ..Default::default()
    };
    for (index, q) in items.iter().enumerate() {
        match ingest_question(&tx, q, Some((paper_id, index as i64 + 1)), now) {
            Ok(result) => {
                if result.is_new {
                    counts.new += 1;
                } else {
                    counts.duplicate += 1;
                }
                outcomes.push(QuestionOutcome {
                    index,
                    result: Some(result),
                    error: None,
                });
            }
            Err(e) if e.code() == crate::error::ErrorCode::BadRequest => {
                counts.failed += 1;
                outcomes.push(QuestionOutcome {
                    index,
                    result: None,
                    error: Some(e.message().to_string()),
                });
            }
            Err(e) => {
                drop(tx);
                import_tasks::complete_task(conn, task_id, counts, Some(e.message()))?;
                return Err(e);
            }
        }
    }
    questions::set_paper_question_count(&tx, paper_id)?;
    tx.commit()?;

    import_tasks::complete_task(conn, task_id, counts, None)?;
    tracing::info!(
        paper_id,
        new = counts.new,
        duplicate = counts.duplicate,
        failed = counts.failed,
        "Ingested paper '{}'",
        name
    );

    let hashes: Vec<String> = items
        .iter()
        .filter(|q| !q.question.trim().is_empty())
        .map(question_hash)
        .collect();

    Ok(PaperIngestReport {
        paper_id,
        task_id,
        total: items.len(),
        new_count: counts.new as usize,
        duplicate_count: counts.duplicate as usize,
        failed_count: counts.failed as usize,
        batch_duplication: analyze_duplication(&hashes),
        questions: outcomes,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MistakeSubmission {
    #[serde(default)]
    pub question_id: Option<i64>,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub wrong_answer: Option<String>,
    #[serde(default)]
    pub correct_answer: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// File a wrong answer against a bank question, finding or creating it by hash.
///
/// A lookup does not count as a new appearance.
pub fn record_mistake_by_question(
    conn: &Connection,
    user_id: i64,
    sub: &MistakeSubmission,
    now: DateTime<Utc>,
) -> ApiResult<i64> {
    let tx = conn.unchecked_transaction()?;

    let question = match (sub.question_id, sub.question.as_deref().map(str::trim)) {
        (Some(id), _) => questions::get_question(&tx, id)?
            .ok_or_else(|| ApiError::not_found(format!("question {} not found", id)))?,
        (None, Some(text)) if !text.is_empty() => {
            let data = QuestionData {
                question: text.to_string(),
                options: sub.options.clone(),
                question_type: Some("unknown".to_string()),
                answer: sub.correct_answer.clone(),
                explanation: sub.explanation.clone(),
            };
            let hash = question_hash(&data);
            questions::insert_question_if_absent(&tx, &hash, &data, now)?;
            questions::get_question_by_hash(&tx, &hash)?
                .ok_or_else(|| ApiError::save("question missing after insert"))?
        }
        _ => {
            return Err(ApiError::bad_request(
                "Provide the question text or a question id",
            ))
        }
    };

    let mistake = NewMistake {
        question: question.question.clone(),
        wrong_answer: sub.wrong_answer.clone(),
        correct_answer: sub.correct_answer.clone().or(question.correct_answer.clone()),
        explanation: sub.explanation.clone().or(question.explanation.clone()),
    };
    let id = mistakes::upsert_mistake(&tx, user_id, None, Some(question.id), &mistake, now)?;
    tx.commit()?;
    Ok(id)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MistakeUploadReport {
    pub total: usize,
    /// Ids of the mistakes filed by this upload
    pub added: Vec<i64>,
    /// Positions of questions that were already in the mistake book
    pub duplicates: Vec<usize>,
}

/// File every question of an uploaded document in the learner's mistake book.
///
/// Questions land in the bank without counting a new appearance. Ones already
/// in the book are left alone, and an upload with nothing new is refused with
/// DUPLICATE_QUESTION.
pub fn upload_mistakes(
    conn: &Connection,
    user_id: i64,
    items: &[QuestionData],
    now: DateTime<Utc>,
) -> ApiResult<MistakeUploadReport> {
    let tx = conn.unchecked_transaction()?;
    let mut report = MistakeUploadReport {
        total: items.len(),
        ..Default::default()
    };

    for (index, q) in items.iter().enumerate() {
        if q.question.trim().is_empty() {
            continue;
        }
        let hash = question_hash(q);
        questions::insert_question_if_absent(&tx, &hash, q, now)?;
        let record = questions::get_question_by_hash(&tx, &hash)?
            .ok_or_else(|| ApiError::save("question missing after insert"))?;

        if mistakes::find_mistake_id(&tx, user_id, Some(record.id), &record.question)?.is_some() {
            report.duplicates.push(index);
            continue;
        }
        let mistake = NewMistake {
            question: record.question.clone(),
            wrong_answer: None,
            correct_answer: q.answer.clone().or(record.correct_answer.clone()),
            explanation: q.explanation.clone().or(record.explanation.clone()),
        };
        report
            .added
            .push(mistakes::upsert_mistake(&tx, user_id, None, Some(record.id), &mistake, now)?);
    }

    if report.added.is_empty() {
        return Err(if report.duplicates.is_empty() {
            ApiError::bad_request("No questions found in the document")
        } else {
            ApiError::duplicate_question("These questions are already in your mistake book")
        });
    }
    tx.commit()?;

    tracing::info!(
        user_id,
        added = report.added.len(),
        duplicates = report.duplicates.len(),
        "Mistake upload filed"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::testing::TestEnv;

    fn paper(name: &str) -> PaperMeta {
        PaperMeta {
            name: name.to_string(),
            version: "1".to_string(),
            description: None,
            file_name: Some(format!("{}.json", name)),
        }
    }

    #[test]
    fn test_same_question_twice_counts_two_appearances() {
        let env = TestEnv::new().unwrap();
        let q = QuestionData::new("She ___ to school every day.", &["go", "goes", "went"]);

        let first = ingest_question(&env.conn, &q, None, Utc::now()).unwrap();
        assert!(first.is_new);
        assert_eq!(first.appearance_count, 1);

        let shuffled = QuestionData::new("She ___ to school every day.", &["went", "go", "goes"]);
        let second = ingest_question(&env.conn, &shuffled, None, Utc::now()).unwrap();
        assert!(!second.is_new);
        assert_eq!(second.id, first.id);
        assert_eq!(second.appearance_count, 2);

        let count: i64 = env
            .conn
            .query_row("SELECT COUNT(*) FROM questions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_empty_question_rejected() {
        let env = TestEnv::new().unwrap();
        let err = ingest_question(&env.conn, &QuestionData::new("   ", &[]), None, Utc::now()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadRequest);
    }

    #[test]
    fn test_ingest_paper_links_and_counts() {
        let env = TestEnv::new().unwrap();
        let shared = QuestionData::new("Choose the synonym of 'big'.", &["large", "tiny"]);
        ingest_paper(&env.conn, &paper("mock-1"), &[shared.clone()], None, Utc::now()).unwrap();

        let items = vec![
            shared.clone(),
            QuestionData::new("", &[]),
            QuestionData::new("Fill in: I have ___ finished.", &["already", "yet"]),
            QuestionData::new("Fill in: I have ___ finished.", &["yet", "already"]),
        ];
        let report = ingest_paper(&env.conn, &paper("mock-2"), &items, None, Utc::now()).unwrap();

        assert_eq!(report.total, 4);
        assert_eq!(report.new_count, 1);
        assert_eq!(report.duplicate_count, 2);
        assert_eq!(report.failed_count, 1);
        assert_eq!(report.batch_duplication.duplicates, 1);
        assert!(report.questions[1].error.is_some());

        let linked = questions::get_paper_questions(&env.conn, report.paper_id).unwrap();
        assert_eq!(linked.len(), 2);
        let shared_record = linked.iter().find(|q| q.question.contains("synonym")).unwrap();
        assert_eq!(shared_record.appearance_count, 2);

        let papers = questions::list_papers(&env.conn, 10).unwrap();
        let summary = papers.iter().find(|p| p.paper.id == report.paper_id).unwrap();
        assert_eq!(summary.question_count, 2);

        let tasks = import_tasks::list_tasks(&env.conn, 10).unwrap();
        assert_eq!(tasks[0].id, report.task_id);
        assert_eq!(tasks[0].status, "completed");
        assert_eq!(tasks[0].failed_items, 1);
    }

    #[test]
    fn test_reordered_uploads_count_as_one_question() {
        let env = TestEnv::new().unwrap();
        let first = crate::services::document::parse_document(
            "mock-1.txt",
            b"1. She ___ to school.\nA. go\nB. goes\nC. went\nAnswer: B",
        )
        .unwrap();
        let second = crate::services::document::parse_document(
            "mock-2.txt",
            b"7. She ___ to school.\r\nA. went\r\nB. go\r\nC. goes\r\nAnswer: C\r\n",
        )
        .unwrap();

        ingest_paper(&env.conn, &paper("mock-1"), &first, None, Utc::now()).unwrap();
        let report = ingest_paper(&env.conn, &paper("mock-2"), &second, None, Utc::now()).unwrap();

        assert_eq!(report.new_count, 0);
        assert_eq!(report.duplicate_count, 1);
        let result = report.questions[0].result.as_ref().unwrap();
        assert_eq!(result.appearance_count, 2);
    }

    #[test]
    fn test_mistake_by_question_reuses_bank_entry() {
        let env = TestEnv::new().unwrap();
        let user = env.user("alice");
        let q = QuestionData::new("Pick the past tense of 'go'.", &["goed", "went"]);
        let ingested = ingest_question(&env.conn, &q, None, Utc::now()).unwrap();

        let sub = MistakeSubmission {
            question: Some(q.question.clone()),
            options: q.options.clone(),
            wrong_answer: Some("goed".into()),
            ..Default::default()
        };
        let first = record_mistake_by_question(&env.conn, user, &sub, Utc::now()).unwrap();
        let again = record_mistake_by_question(&env.conn, user, &sub, Utc::now()).unwrap();
        assert_eq!(first, again);

        let stored = mistakes::get_mistake(&env.conn, user, first).unwrap().unwrap();
        assert_eq!(stored.question_id, Some(ingested.id));
        assert_eq!(stored.attempt_count, 2);

        let bank = questions::get_question(&env.conn, ingested.id).unwrap().unwrap();
        assert_eq!(bank.appearance_count, 1);
    }

    #[test]
    fn test_upload_mistakes_refuses_repeat_upload() {
        let env = TestEnv::new().unwrap();
        let user = env.user("alice");
        let items = crate::services::document::parse_text(
            "1. Pick the past tense of 'go'.\nA. goed\nB. went\nAnswer: B\n\n2. I have lived here ___ 2010.\nAnswer: since",
        );

        let report = upload_mistakes(&env.conn, user, &items, Utc::now()).unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.added.len(), 2);
        assert!(report.duplicates.is_empty());

        let stored = mistakes::get_mistake(&env.conn, user, report.added[0]).unwrap().unwrap();
        assert_eq!(stored.correct_answer.as_deref(), Some("B"));
        assert!(stored.question_id.is_some());

        let err = upload_mistakes(&env.conn, user, &items, Utc::now()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::DuplicateQuestion);

        // Same question with reordered options is still a repeat; the new one is filed
        let mixed = crate::services::document::parse_text(
            "Pick the past tense of 'go'.\nA. went\nB. goed\n\nChoose the synonym of 'big'.\nA. large\nB. tiny",
        );
        let report = upload_mistakes(&env.conn, user, &mixed, Utc::now()).unwrap();
        assert_eq!(report.added.len(), 1);
        assert_eq!(report.duplicates, vec![0]);
    }

    #[test]
    fn test_upload_mistakes_is_per_learner() {
        let env = TestEnv::new().unwrap();
        let alice = env.user("alice");
        let bob = env.user("bob");
        let items = vec![QuestionData::new("Choose the antonym of 'early'.", &["late", "soon"])];

        upload_mistakes(&env.conn, alice, &items, Utc::now()).unwrap();
        let report = upload_mistakes(&env.conn, bob, &items, Utc::now()).unwrap();
        assert_eq!(report.added.len(), 1);

        let count: i64 = env
            .conn
            .query_row("SELECT COUNT(*) FROM questions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_upload_mistakes_empty_document() {
        let env = TestEnv::new().unwrap();
        let user = env.user("alice");
        let err = upload_mistakes(&env.conn, user, &[QuestionData::new(" ", &[])], Utc::now()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadRequest);
    }

    #[test]
    fn test_mistake_needs_question() {
        let env = TestEnv::new().unwrap();
        let user = env.user("alice");
        let err = record_mistake_by_question(&env.conn, user, &MistakeSubmission::default(), Utc::now())
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadRequest);

        let sub = MistakeSubmission {
            question_id: Some(42),
            ..Default::default()
        };
        let err = record_mistake_by_question(&env.conn, user, &sub, Utc::now()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }
}
