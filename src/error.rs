//! JSON error envelope shared by every API handler.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ai::AiError;
use crate::db::DbLockError;

/// Stable, client-facing error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    QuotaExceeded,
    ApiError,
    NetworkError,
    NoContent,
    AiNotConfigured,
    DuplicateQuestion,
    SaveError,
    UnknownError,
    BadRequest,
    NotFound,
    Unauthorized,
    Forbidden,
    UnsupportedFormat,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::ApiError | Self::NetworkError | Self::NoContent => StatusCode::BAD_GATEWAY,
            Self::AiNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            Self::DuplicateQuestion => StatusCode::CONFLICT,
            Self::SaveError | Self::UnknownError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest | Self::UnsupportedFormat => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: ErrorCode,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: ErrorBody,
}

#[derive(Debug, Clone)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    retry_after: Option<DateTime<Utc>>,
    /// Internal errors are logged and replaced by a generic message
    is_operational: bool,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retry_after: None,
            is_operational: true,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn duplicate_question(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DuplicateQuestion, message)
    }

    pub fn unsupported_format(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnsupportedFormat, message)
    }

    pub fn save(message: impl Into<String>) -> Self {
        Self {
            is_operational: false,
            ..Self::new(ErrorCode::SaveError, message)
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            is_operational: false,
            ..Self::new(ErrorCode::UnknownError, message)
        }
    }

    pub fn with_retry_after(mut self, at: DateTime<Utc>) -> Self {
        self.retry_after = Some(at);
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn retry_after(&self) -> Option<DateTime<Utc>> {
        self.retry_after
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = if self.is_operational {
            self.message
        } else {
            tracing::error!(code = ?self.code, "{}", self.message);
            match self.code {
                ErrorCode::SaveError => "Failed to save data".to_string(),
                _ => "Internal server error".to_string(),
            }
        };

        let body = ErrorEnvelope {
            success: false,
            error: ErrorBody {
                code: self.code,
                message,
                retry_after: self.retry_after.map(|t| t.to_rfc3339()),
            },
        };

        (self.code.status(), Json(body)).into_response()
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(e: rusqlite::Error) -> Self {
        Self::save(format!("Database error: {}", e))
    }
}

impl From<DbLockError> for ApiError {
    fn from(e: DbLockError) -> Self {
        Self::internal(e.to_string())
    }
}

impl From<AiError> for ApiError {
    fn from(e: AiError) -> Self {
        let code = match &e {
            AiError::NotConfigured => ErrorCode::AiNotConfigured,
            AiError::Quota { .. } => ErrorCode::QuotaExceeded,
            AiError::Network(_) => ErrorCode::NetworkError,
            AiError::Api { .. } | AiError::InvalidResponse(_) => ErrorCode::ApiError,
            AiError::EmptyResponse => ErrorCode::NoContent,
            AiError::Storage(_) => return Self::internal(e.to_string()),
        };
        let err = Self::new(code, e.to_string());
        match e {
            AiError::Quota { retry_after: Some(at), .. } => err.with_retry_after(at),
            _ => err,
        }
    }
}

/// Success envelope: `{"success": true, "data": ..., "message"?}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
        message: None,
    })
}

pub fn ok_with_message<T: Serialize>(data: T, message: impl Into<String>) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
        message: Some(message.into()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_operational_error_envelope() {
        let (status, body) = body_json(ApiError::duplicate_question("seen before")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "DUPLICATE_QUESTION");
        assert_eq!(body["error"]["message"], "seen before");
        assert!(body["error"].get("retry_after").is_none());
    }

    #[tokio::test]
    async fn test_internal_error_message_hidden() {
        let (status, body) = body_json(ApiError::save("constraint failed: secret detail")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "SAVE_ERROR");
        assert_eq!(body["error"]["message"], "Failed to save data");
    }

    #[tokio::test]
    async fn test_quota_error_carries_retry_after() {
        let reset = Utc::now();
        let err: ApiError = AiError::Quota {
            message: "daily limit reached".into(),
            retry_after: Some(reset),
        }
        .into();
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["code"], "QUOTA_EXCEEDED");
        assert_eq!(body["error"]["retry_after"], reset.to_rfc3339());
    }

    #[test]
    fn test_network_error_maps_to_bad_gateway() {
        let err: ApiError = AiError::Network("connection refused".into()).into();
        assert_eq!(err.code(), ErrorCode::NetworkError);
        assert_eq!(err.code().status(), StatusCode::BAD_GATEWAY);
    }
}
