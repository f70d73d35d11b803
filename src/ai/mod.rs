//! Language-model access: provider selection, call, retry and daily quota.

pub mod client;
pub mod provider;
pub mod quota;
pub mod retry;

use std::future::Future;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use client::AiClient;
pub use provider::ProviderKind;
pub use quota::QuotaInfo;
pub use retry::{with_retry, RetryPolicy};

#[derive(Debug, Clone, Error)]
pub enum AiError {
    #[error("no active AI provider configured")]
    NotConfigured,
    #[error("AI quota exceeded: {message}")]
    Quota {
        message: String,
        retry_after: Option<DateTime<Utc>>,
    },
    #[error("network error: {0}")]
    Network(String),
    #[error("AI API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("AI returned no content")]
    EmptyResponse,
    #[error("invalid AI response: {0}")]
    InvalidResponse(String),
    #[error("AI bookkeeping failed: {0}")]
    Storage(String),
}

/// Map a non-success HTTP status to an error. 429 is a quota error.
pub fn classify_status(status: u16, message: String) -> AiError {
    if status == 429 {
        AiError::Quota {
            message,
            retry_after: None,
        }
    } else {
        AiError::Api { status, message }
    }
}

/// Anything that turns a prompt into text
pub trait LanguageModel: Send + Sync {
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String, AiError>> + Send;
}
