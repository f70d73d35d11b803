//! Turning uploaded exam documents into questions.

use serde::Deserialize;

use crate::domain::QuestionData;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Text,
    Markdown,
    Json,
    Csv,
    Docx,
    Pdf,
}

impl DocumentFormat {
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(Self::Text),
            "md" | "markdown" => Some(Self::Markdown),
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            "docx" => Some(Self::Docx),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Formats read in-process; the rest need an external text extractor
    pub fn parsed_in_process(&self) -> bool {
        matches!(self, Self::Text | Self::Markdown | Self::Json)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonDocument {
    List(Vec<QuestionData>),
    Wrapped { questions: Vec<QuestionData> },
}

pub fn parse_document(file_name: &str, bytes: &[u8]) -> ApiResult<Vec<QuestionData>> {
    let format = DocumentFormat::from_file_name(file_name).ok_or_else(|| {
        ApiError::unsupported_format(format!(
            "Unsupported file type: {} (expected .txt, .md, .json, .csv, .docx or .pdf)",
            file_name
        ))
    })?;
    if !format.parsed_in_process() {
        return Err(ApiError::unsupported_format(format!(
            "{} needs text extraction; upload it as .txt, .md or .json",
            file_name
        )));
    }

    let text = std::str::from_utf8(bytes)
        .map_err(|_| ApiError::bad_request("File is not valid UTF-8 text"))?;
    let text = text.trim_start_matches('\u{feff}');

    match format {
        DocumentFormat::Json => parse_json(text),
        _ => Ok(parse_text(text)),
    }
}

fn parse_json(text: &str) -> ApiResult<Vec<QuestionData>> {
    let doc: JsonDocument = serde_json::from_str(text)
        .map_err(|e| ApiError::bad_request(format!("Invalid question JSON: {}", e)))?;
    Ok(match doc {
        JsonDocument::List(items) | JsonDocument::Wrapped { questions: items } => items,
    })
}

/// Option text of an "A. text", "B) text" or "C、text" line, label removed
fn option_line(line: &str) -> Option<&str> {
    let mut chars = line.char_indices();
    let (_, letter) = chars.next()?;
    let (sep_at, sep) = chars.next()?;
    if ('A'..='F').contains(&letter) && matches!(sep, '.' | ')' | '、' | '．') {
        Some(line[sep_at + sep.len_utf8()..].trim())
    } else {
        None
    }
}

fn labelled<'a>(line: &'a str, labels: &[&str]) -> Option<&'a str> {
    labels.iter().find_map(|label| {
        line.strip_prefix(label)
            .map(|rest| rest.trim_start_matches([':', '：']).trim())
    })
}

/// Drop a leading "12." or "12)" question number
fn strip_number(line: &str) -> &str {
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return line;
    }
    match line[digits..].strip_prefix(['.', ')', '、']) {
        Some(rest) => rest.trim_start(),
        None => line,
    }
}

/// Split into blank-line separated blocks of trimmed, non-empty lines.
///
/// `str::lines` strips the `\r` of CRLF endings.
fn blocks(text: &str) -> Vec<Vec<&str>> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// Blank-line separated blocks: question lines, option lines, then
/// `Answer:` / `Explanation:` lines.
pub fn parse_text(text: &str) -> Vec<QuestionData> {
    let mut out = Vec::new();
    for block in blocks(text) {
        let mut question = Vec::new();
        let mut q = QuestionData::default();

        for line in block {
            if let Some(answer) = labelled(line, &["Answer", "answer", "答案"]) {
                q.answer = Some(answer.to_string());
            } else if let Some(expl) = labelled(line, &["Explanation", "explanation", "解析"]) {
                q.explanation = Some(expl.to_string());
            } else if let Some(opt) = option_line(line) {
                q.options.push(opt.to_string());
            } else if question.is_empty() {
                question.push(strip_number(line));
            } else {
                question.push(line);
            }
        }

        if question.is_empty() {
            continue;
        }
        q.question = question.join(" ");
        q.question_type = Some(if q.options.is_empty() { "fill_blank" } else { "choice" }.to_string());
        out.push(q);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_format_detection() {
        assert_eq!(DocumentFormat::from_file_name("Paper.TXT"), Some(DocumentFormat::Text));
        assert_eq!(DocumentFormat::from_file_name("a.b.json"), Some(DocumentFormat::Json));
        assert_eq!(DocumentFormat::from_file_name("scan.png"), None);
        assert_eq!(DocumentFormat::from_file_name("noext"), None);
    }

    #[test]
    fn test_parse_text_blocks() {
        let text = "1. She ___ to school every day.\nA. go\nB. goes\nC. went\nAnswer: B\nExplanation: third person singular\n\n\
                    2. I have lived here ___ 2010.\nAnswer: since\n";
        let qs = parse_text(text);
        assert_eq!(qs.len(), 2);
        assert_eq!(qs[0].question, "She ___ to school every day.");
        assert_eq!(qs[0].options, vec!["go", "goes", "went"]);
        assert_eq!(qs[0].answer.as_deref(), Some("B"));
        assert_eq!(qs[0].explanation.as_deref(), Some("third person singular"));
        assert_eq!(qs[0].question_type.as_deref(), Some("choice"));
        assert_eq!(qs[1].answer.as_deref(), Some("since"));
        assert_eq!(qs[1].question_type.as_deref(), Some("fill_blank"));
    }

    #[test]
    fn test_parse_text_crlf_line_endings() {
        let text = "1. She ___ to school.\r\nA. go\r\nB. goes\r\nAnswer: B\r\n\r\n\
                    2. I have lived here ___ 2010.\r\nA. since\r\nB. for\r\n";
        let qs = parse_text(text);
        assert_eq!(qs.len(), 2);
        assert_eq!(qs[0].question, "She ___ to school.");
        assert_eq!(qs[0].options, vec!["go", "goes"]);
        assert_eq!(qs[0].answer.as_deref(), Some("B"));
        assert_eq!(qs[1].question, "I have lived here ___ 2010.");
        assert_eq!(qs[1].options, vec!["since", "for"]);
    }

    #[test]
    fn test_parse_text_whitespace_only_separator() {
        let qs = parse_text("First question\nA. yes\n   \nSecond question\nAnswer: no");
        assert_eq!(qs.len(), 2);
        assert_eq!(qs[1].question, "Second question");
    }

    #[test]
    fn test_reordered_labelled_options_hash_alike() {
        let a = parse_text("She ___ to school.\nA. go\nB. goes\nC. went");
        let b = parse_text("She ___ to school.\nA. went\nB. go\nC. goes");
        assert_eq!(
            crate::dedup::question_hash(&a[0]),
            crate::dedup::question_hash(&b[0])
        );
    }

    #[test]
    fn test_parse_text_chinese_labels() {
        let qs = parse_text("选择正确的词\nA、affect\nB、effect\n答案：A\n解析：动词");
        assert_eq!(qs.len(), 1);
        assert_eq!(qs[0].options.len(), 2);
        assert_eq!(qs[0].answer.as_deref(), Some("A"));
        assert_eq!(qs[0].explanation.as_deref(), Some("动词"));
    }

    #[test]
    fn test_parse_json_shapes() {
        let list = br#"[{"question": "Q1", "options": ["a", "b"], "answer": "a"}]"#;
        assert_eq!(parse_document("p.json", list).unwrap().len(), 1);

        let wrapped = br#"{"questions": [{"question": "Q1"}, {"question": "Q2", "type": "fill_blank"}]}"#;
        let qs = parse_document("p.json", wrapped).unwrap();
        assert_eq!(qs[1].question_type.as_deref(), Some("fill_blank"));

        let err = parse_document("p.json", b"{oops").unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadRequest);
    }

    #[test]
    fn test_binary_formats_unsupported() {
        for name in ["paper.pdf", "paper.docx", "paper.csv", "paper.xls"] {
            let err = parse_document(name, b"data").unwrap_err();
            assert_eq!(err.code(), ErrorCode::UnsupportedFormat, "{}", name);
        }
    }
}
