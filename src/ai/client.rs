use std::future::Future;

use chrono::Utc;
use serde_json::Value;

use super::provider::{build_request, extract_error_message, extract_text, KeyPlacement};
use super::retry::{with_retry, RetryPolicy};
use super::{classify_status, quota, AiError, LanguageModel};
use crate::config::AiConfig;
use crate::db::providers::{self, AiProviderRecord};
use crate::db::{try_lock, DbPool};

/// HTTP client for the active language-model provider
#[derive(Clone)]
pub struct AiClient {
    db: DbPool,
    http: reqwest::Client,
    config: AiConfig,
}

impl AiClient {
    pub fn new(db: DbPool, config: AiConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { db, http, config }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    /// Call the active provider, charging one unit of the daily quota
    pub async fn generate(&self, prompt: &str) -> Result<String, AiError> {
        let provider = {
            let conn = try_lock(&self.db).map_err(|e| AiError::Storage(e.to_string()))?;
            let provider = providers::get_active_provider(&conn)
                .map_err(|e| AiError::Storage(e.to_string()))?
                .ok_or(AiError::NotConfigured)?;
            quota::track_call(&conn, self.config.daily_quota, Utc::now())?;
            provider
        };
        tracing::debug!(
            provider = provider.provider.as_str(),
            model = %provider.model_name,
            "Calling AI provider"
        );
        self.generate_with(&provider, prompt).await
    }

    /// Call a specific provider entry without touching the quota
    pub async fn generate_with(&self, provider: &AiProviderRecord, prompt: &str) -> Result<String, AiError> {
        let policy = RetryPolicy::from_config(&self.config);
        with_retry(policy, || self.send_once(provider, prompt)).await
    }

    async fn send_once(&self, provider: &AiProviderRecord, prompt: &str) -> Result<String, AiError> {
        let request = build_request(
            provider.provider,
            &provider.model_name,
            provider.base_url.as_deref(),
            prompt,
        );

        let mut builder = self.http.post(&request.url).json(&request.body);
        builder = match request.key_placement {
            KeyPlacement::Bearer => builder.bearer_auth(&provider.api_key),
            KeyPlacement::Query => builder.query(&[("key", provider.api_key.as_str())]),
            KeyPlacement::AnthropicHeader => builder.header("x-api-key", provider.api_key.as_str()),
        };
        for (name, value) in &request.extra_headers {
            builder = builder.header(*name, *value);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AiError::Network(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AiError::Network(e.to_string()))?;

        if !status.is_success() {
            let message = extract_error_message(&text);
            tracing::warn!(status = status.as_u16(), "AI provider returned error: {}", message);
            return Err(classify_status(status.as_u16(), message));
        }

        let body: Value =
            serde_json::from_str(&text).map_err(|e| AiError::InvalidResponse(e.to_string()))?;
        extract_text(provider.provider, &body).ok_or(AiError::EmptyResponse)
    }
}

impl LanguageModel for AiClient {
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String, AiError>> + Send {
        self.generate(prompt)
    }
}
