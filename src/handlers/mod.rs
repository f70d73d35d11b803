//! JSON API handlers.
//!
//! Every handler answers with the `{success, data}` envelope or an `ApiError`.

pub mod admin;
pub mod content;
pub mod mistakes;
pub mod progress;
pub mod providers;

use axum::extract::multipart::Field;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ok, ApiError, ApiResponse, ApiResult};

/// Default page size for list endpoints
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Largest page a client may ask for
pub const MAX_PAGE_SIZE: usize = 200;

/// `?limit=&offset=` on list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

impl Pagination {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }
}

/// A file part of a multipart upload
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub async fn read(field: Field<'_>) -> ApiResult<Self> {
        let file_name = field.file_name().unwrap_or("upload.txt").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;
        Ok(Self {
            file_name,
            bytes: bytes.to_vec(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
    pub time: DateTime<Utc>,
}

/// GET /api/health
pub async fn health() -> Json<ApiResponse<Health>> {
    ok(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        time: Utc::now(),
    })
}
