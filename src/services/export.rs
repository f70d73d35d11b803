//! Vocabulary exports with the learner's progress, as JSON or CSV.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::progress::WordExport;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VocabularyExport {
    pub username: String,
    pub export_date: DateTime<Utc>,
    pub total_words: usize,
    pub words: Vec<WordExport>,
}

const CSV_HEADERS: [&str; 11] = [
    "word",
    "phonetic",
    "meaning",
    "example",
    "example_translation",
    "difficulty",
    "mastery_level",
    "review_count",
    "error_count",
    "last_review_at",
    "next_review_at",
];

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// `vocabulary_<user>_<yyyy-mm-dd>.<ext>`
pub fn file_name(username: &str, format: ExportFormat, now: DateTime<Utc>) -> String {
    format!(
        "vocabulary_{}_{}.{}",
        username,
        now.format("%Y-%m-%d"),
        format.extension()
    )
}

fn csv_error(e: impl std::fmt::Display) -> ApiError {
    ApiError::internal(format!("CSV export failed: {}", e))
}

/// CSV with a leading byte order mark so spreadsheet apps read it as UTF-8
pub fn to_csv(rows: &[WordExport]) -> ApiResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(UTF8_BOM.to_vec());
    writer.write_record(CSV_HEADERS).map_err(csv_error)?;

    let opt = |s: &Option<String>| s.clone().unwrap_or_default();
    let time = |t: &Option<DateTime<Utc>>| t.map(|t| t.to_rfc3339()).unwrap_or_default();
    for row in rows {
        writer
            .write_record([
                row.word.clone(),
                opt(&row.phonetic),
                row.meaning.clone(),
                opt(&row.example),
                opt(&row.example_translation),
                row.difficulty.to_string(),
                row.mastery_level.to_string(),
                row.review_count.to_string(),
                row.error_count.to_string(),
                time(&row.last_review_at),
                time(&row.next_review_at),
            ])
            .map_err(csv_error)?;
    }
    writer.into_inner().map_err(csv_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(word: &str, example: Option<&str>, level: i64) -> WordExport {
        WordExport {
            word: word.to_string(),
            phonetic: None,
            meaning: "m".to_string(),
            example: example.map(str::to_string),
            example_translation: None,
            difficulty: 1,
            mastery_level: level,
            review_count: level,
            error_count: 0,
            last_review_at: None,
            next_review_at: None,
        }
    }

    #[test]
    fn test_csv_has_bom_header_and_quoting() {
        let bytes = to_csv(&[row("apple", Some("An apple, a day"), 2), row("quote", Some("say \"hi\""), 0)]).unwrap();
        assert_eq!(&bytes[..3], &UTF8_BOM);

        let text = std::str::from_utf8(&bytes[3..]).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("word,phonetic,meaning"));
        assert_eq!(lines[1], "apple,,m,\"An apple, a day\",,1,2,2,0,,");
        assert_eq!(lines[2], "quote,,m,\"say \"\"hi\"\"\",,1,0,0,0,,");
    }

    #[test]
    fn test_file_name() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        assert_eq!(file_name("alice", ExportFormat::Csv, now), "vocabulary_alice_2024-03-09.csv");
        assert_eq!(file_name("alice", ExportFormat::Json, now), "vocabulary_alice_2024-03-09.json");
    }
}
