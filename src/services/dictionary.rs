//! Free dictionary lookups (dictionaryapi.dev) behind a TTL cache.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::TtlCache;

pub const DEFAULT_BASE_URL: &str = "https://api.dictionaryapi.dev/api/v2/entries/en";

/// Pronunciation and primary sense of an English word
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DictionaryEntry {
    pub word: String,
    pub pronunciation: String,
    pub part_of_speech: String,
    pub definition: String,
    pub example: String,
}

#[derive(Debug, Deserialize)]
struct ApiEntry {
    word: String,
    #[serde(default)]
    phonetic: Option<String>,
    #[serde(default)]
    phonetics: Vec<ApiPhonetic>,
    #[serde(default)]
    meanings: Vec<ApiMeaning>,
}

#[derive(Debug, Deserialize)]
struct ApiPhonetic {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiMeaning {
    #[serde(default)]
    part_of_speech: Option<String>,
    #[serde(default)]
    definitions: Vec<ApiDefinition>,
}

#[derive(Debug, Deserialize)]
struct ApiDefinition {
    #[serde(default)]
    definition: Option<String>,
    #[serde(default)]
    example: Option<String>,
}

impl From<ApiEntry> for DictionaryEntry {
    fn from(entry: ApiEntry) -> Self {
        let pronunciation = entry
            .phonetic
            .filter(|p| !p.is_empty())
            .or_else(|| entry.phonetics.into_iter().find_map(|p| p.text))
            .unwrap_or_default();

        let primary = entry.meanings.into_iter().next();
        let part_of_speech = primary
            .as_ref()
            .and_then(|m| m.part_of_speech.clone())
            .unwrap_or_default();
        let first_definition = primary.and_then(|m| m.definitions.into_iter().next());
        let (definition, example) = match first_definition {
            Some(d) => (d.definition.unwrap_or_default(), d.example.unwrap_or_default()),
            None => (String::new(), String::new()),
        };

        Self {
            word: entry.word,
            pronunciation,
            part_of_speech,
            definition,
            example,
        }
    }
}

/// Lowercased, trimmed word if it is plain ASCII letters
pub fn clean_word(word: &str) -> Option<String> {
    let cleaned = word.trim().to_lowercase();
    (!cleaned.is_empty() && cleaned.chars().all(|c| c.is_ascii_lowercase())).then_some(cleaned)
}

pub struct Dictionary {
    http: reqwest::Client,
    base_url: String,
    cache: TtlCache<String, DictionaryEntry>,
}

impl Dictionary {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, capacity, ttl)
    }

    pub fn with_base_url(base_url: &str, capacity: usize, ttl: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: TtlCache::new(capacity, ttl),
        }
    }

    /// Look a word up, None when the word is not plain letters or the API has nothing.
    ///
    /// Only successful lookups are cached.
    pub async fn lookup(&self, word: &str) -> Option<DictionaryEntry> {
        let word = clean_word(word)?;
        if let Some(hit) = self.cache.get(&word) {
            return Some(hit);
        }

        let entry = self.fetch(&word).await?;
        self.cache.insert(word, entry.clone());
        Some(entry)
    }

    async fn fetch(&self, word: &str) -> Option<DictionaryEntry> {
        let url = format!("{}/{}", self.base_url, urlencoding::encode(word));
        let response = match self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Dictionary lookup for '{}' failed: {}", word, e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!("Dictionary lookup for '{}' returned {}", word, response.status());
            return None;
        }

        match response.json::<Vec<ApiEntry>>().await {
            Ok(entries) => entries.into_iter().next().map(DictionaryEntry::from),
            Err(e) => {
                tracing::warn!("Dictionary response for '{}' unreadable: {}", word, e);
                None
            }
        }
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn spawn_dictionary() -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/{word}",
            get(move |Path(word): Path<String>| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if word != "serendipity" {
                        return (StatusCode::NOT_FOUND, Json(json!({ "title": "No Definitions Found" })))
                            .into_response();
                    }
                    Json(json!([{
                        "word": "serendipity",
                        "phonetics": [{ "audio": "" }, { "text": "/ˌsɛɹ.ənˈdɪp.ɪ.ti/" }],
                        "meanings": [{
                            "partOfSpeech": "noun",
                            "definitions": [{
                                "definition": "An unsought, unintended, and/or unexpected discovery.",
                                "example": "Meeting her there was pure serendipity."
                            }]
                        }]
                    }]))
                    .into_response()
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), hits)
    }

    #[test]
    fn test_clean_word() {
        assert_eq!(clean_word("  Apple "), Some("apple".to_string()));
        assert_eq!(clean_word("give up"), None);
        assert_eq!(clean_word("café"), None);
        assert_eq!(clean_word(""), None);
    }

    #[tokio::test]
    async fn test_lookup_parses_and_caches() {
        let (url, hits) = spawn_dictionary().await;
        let dict = Dictionary::with_base_url(&url, 10, Duration::from_secs(60));

        let entry = dict.lookup("Serendipity").await.unwrap();
        assert_eq!(entry.pronunciation, "/ˌsɛɹ.ənˈdɪp.ɪ.ti/");
        assert_eq!(entry.part_of_speech, "noun");
        assert_eq!(entry.example, "Meeting her there was pure serendipity.");

        assert_eq!(dict.lookup("serendipity").await, Some(entry));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_misses_are_not_cached() {
        let (url, hits) = spawn_dictionary().await;
        let dict = Dictionary::with_base_url(&url, 10, Duration::from_secs(60));

        assert!(dict.lookup("qwzx").await.is_none());
        assert!(dict.lookup("qwzx").await.is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(dict.cached_len(), 0);
    }

    #[tokio::test]
    async fn test_phrases_never_hit_the_network() {
        let (url, hits) = spawn_dictionary().await;
        let dict = Dictionary::with_base_url(&url, 10, Duration::from_secs(60));
        assert!(dict.lookup("look forward to").await.is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
