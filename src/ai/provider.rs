//! Wire formats of the supported language-model providers.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const TEMPERATURE: f64 = 0.7;
const MAX_TOKENS: u32 = 4096;
const GEMINI_MAX_TOKENS: u32 = 8192;
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    DeepSeek,
    Kimi,
    #[serde(rename = "openai")]
    OpenAi,
    MiniMax,
    Claude,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::DeepSeek => "deepseek",
            Self::Kimi => "kimi",
            Self::OpenAi => "openai",
            Self::MiniMax => "minimax",
            Self::Claude => "claude",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Some(Self::Gemini),
            "deepseek" => Some(Self::DeepSeek),
            "kimi" | "moonshot" => Some(Self::Kimi),
            "openai" => Some(Self::OpenAi),
            "minimax" => Some(Self::MiniMax),
            "claude" | "anthropic" => Some(Self::Claude),
            _ => None,
        }
    }

    /// Default endpoint; `{model}` is substituted with the model name
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::Gemini => {
                "https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent"
            }
            Self::DeepSeek => "https://api.deepseek.com/chat/completions",
            Self::Kimi => "https://api.moonshot.cn/v1/chat/completions",
            Self::OpenAi => "https://api.openai.com/v1/chat/completions",
            Self::MiniMax => "https://api.minimax.chat/v1/text/chatcompletion_v2",
            Self::Claude => "https://api.anthropic.com/v1/messages",
        }
    }
}

/// How the API key is sent
#[derive(Debug, Clone, PartialEq)]
pub enum KeyPlacement {
    Bearer,
    /// `?key=` query parameter
    Query,
    /// `x-api-key` header plus a version header
    AnthropicHeader,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub url: String,
    pub key_placement: KeyPlacement,
    pub extra_headers: Vec<(&'static str, &'static str)>,
    pub body: Value,
}

pub fn build_request(
    kind: ProviderKind,
    model: &str,
    base_url: Option<&str>,
    prompt: &str,
) -> ProviderRequest {
    let endpoint = base_url
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .unwrap_or(kind.default_endpoint());
    let url = endpoint.replace("{model}", model);

    match kind {
        ProviderKind::Gemini => ProviderRequest {
            url,
            key_placement: KeyPlacement::Query,
            extra_headers: Vec::new(),
            body: json!({
                "contents": [{ "parts": [{ "text": prompt }] }],
                "generationConfig": {
                    "temperature": TEMPERATURE,
                    "maxOutputTokens": GEMINI_MAX_TOKENS,
                },
            }),
        },
        ProviderKind::Claude => ProviderRequest {
            url,
            key_placement: KeyPlacement::AnthropicHeader,
            extra_headers: vec![("anthropic-version", ANTHROPIC_VERSION)],
            body: json!({
                "model": model,
                "max_tokens": MAX_TOKENS,
                "messages": [{ "role": "user", "content": prompt }],
            }),
        },
        ProviderKind::DeepSeek | ProviderKind::Kimi | ProviderKind::OpenAi | ProviderKind::MiniMax => {
            ProviderRequest {
                url,
                key_placement: KeyPlacement::Bearer,
                extra_headers: Vec::new(),
                body: json!({
                    "model": model,
                    "messages": [{ "role": "user", "content": prompt }],
                    "temperature": TEMPERATURE,
                    "max_tokens": MAX_TOKENS,
                }),
            }
        }
    }
}

/// Pull the generated text out of a successful response body
pub fn extract_text(kind: ProviderKind, body: &Value) -> Option<String> {
    let text = match kind {
        ProviderKind::Gemini => body.pointer("/candidates/0/content/parts/0/text"),
        ProviderKind::Claude => body.pointer("/content/0/text"),
        ProviderKind::MiniMax => body
            .pointer("/choices/0/message/content")
            .or_else(|| body.pointer("/choices/0/messages/0/text"))
            .or_else(|| body.pointer("/choices/0/text")),
        ProviderKind::DeepSeek | ProviderKind::Kimi | ProviderKind::OpenAi => {
            body.pointer("/choices/0/message/content")
        }
    };
    text.and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Best-effort error message from a failed response body
pub fn extract_error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|v| {
        v.pointer("/error/message")
            .or_else(|| v.pointer("/base_resp/status_msg"))
            .or_else(|| v.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    message.unwrap_or_else(|| body.chars().take(200).collect())
}

/// First four and last four characters, masked in between
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}****{}", head, tail)
}
