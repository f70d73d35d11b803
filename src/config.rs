//! Application configuration.
//!
//! Values are resolved with priority: config.toml > environment (.env) > default.
//! Every section of the file is optional, as is every key inside a section.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::paths;

// ==================== File Structure ====================

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
  server: Option<ServerSection>,
  database: Option<DatabaseSection>,
  review: Option<ReviewSection>,
  ai: Option<AiSection>,
  dedup: Option<DedupSection>,
  dictionary: Option<DictionarySection>,
  auth: Option<AuthSection>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
  addr: Option<String>,
  port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabaseSection {
  path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ReviewSection {
  batch_size: Option<usize>,
  max_batch_size: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct AiSection {
  retry_attempts: Option<u32>,
  retry_base_ms: Option<u64>,
  request_timeout_secs: Option<u64>,
  daily_quota: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct DedupSection {
  similarity_threshold: Option<f64>,
  fuzzy_scan_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct DictionarySection {
  cache_capacity: Option<usize>,
  cache_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthSection {
  session_hours: Option<i64>,
  admin_username: Option<String>,
  admin_password: Option<String>,
}

// ==================== Defaults ====================

/// Server address to bind to
pub const SERVER_ADDR: &str = "0.0.0.0";

/// Server port
pub const SERVER_PORT: u16 = 3000;

/// Default number of items in a review batch
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Hard cap on review batch size regardless of what a client asks for
pub const MAX_BATCH_SIZE: usize = 100;

/// Attempts for transport-level AI failures (first call included)
pub const AI_RETRY_ATTEMPTS: u32 = 3;

/// Base backoff between AI retries; doubles every attempt
pub const AI_RETRY_BASE_MS: u64 = 1000;

pub const AI_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Provider calls allowed per UTC day
pub const AI_DAILY_QUOTA: i64 = 1500;

/// Minimum similarity for two phrases to count as the same library entry
pub const SIMILARITY_THRESHOLD: f64 = 0.8;

/// Rows scanned when looking for fuzzy duplicates
pub const FUZZY_SCAN_LIMIT: usize = 500;

pub const DICTIONARY_CACHE_CAPACITY: usize = 1000;

pub const DICTIONARY_CACHE_TTL_SECS: u64 = 24 * 60 * 60;

/// Session duration in hours (1 week)
pub const SESSION_HOURS: i64 = 24 * 7;

// ==================== Resolved Config ====================

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_addr: String,
  pub server_port: u16,
  pub database_path: PathBuf,
  pub batch_size: usize,
  pub max_batch_size: usize,
  pub ai: AiConfig,
  pub similarity_threshold: f64,
  pub fuzzy_scan_limit: usize,
  pub dictionary_cache_capacity: usize,
  pub dictionary_cache_ttl: Duration,
  pub session_hours: i64,
  pub admin_username: Option<String>,
  pub admin_password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AiConfig {
  pub retry_attempts: u32,
  pub retry_base: Duration,
  pub request_timeout: Duration,
  pub daily_quota: i64,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      server_addr: SERVER_ADDR.to_string(),
      server_port: SERVER_PORT,
      database_path: PathBuf::from(paths::db_path()),
      batch_size: DEFAULT_BATCH_SIZE,
      max_batch_size: MAX_BATCH_SIZE,
      ai: AiConfig::default(),
      similarity_threshold: SIMILARITY_THRESHOLD,
      fuzzy_scan_limit: FUZZY_SCAN_LIMIT,
      dictionary_cache_capacity: DICTIONARY_CACHE_CAPACITY,
      dictionary_cache_ttl: Duration::from_secs(DICTIONARY_CACHE_TTL_SECS),
      session_hours: SESSION_HOURS,
      admin_username: None,
      admin_password: None,
    }
  }
}

impl Default for AiConfig {
  fn default() -> Self {
    Self {
      retry_attempts: AI_RETRY_ATTEMPTS,
      retry_base: Duration::from_millis(AI_RETRY_BASE_MS),
      request_timeout: Duration::from_secs(AI_REQUEST_TIMEOUT_SECS),
      daily_quota: AI_DAILY_QUOTA,
    }
  }
}

impl AppConfig {
  /// Load configuration with priority: config.toml > .env > default
  pub fn load() -> Self {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let file = match std::fs::read_to_string(paths::CONFIG_FILE) {
      Ok(contents) => match toml::from_str::<FileConfig>(&contents) {
        Ok(config) => {
          tracing::info!("Loaded configuration from {}", paths::CONFIG_FILE);
          config
        }
        Err(e) => {
          tracing::warn!("Ignoring malformed {}: {}", paths::CONFIG_FILE, e);
          FileConfig::default()
        }
      },
      Err(_) => FileConfig::default(),
    };

    Self::resolve(file, |key| std::env::var(key).ok())
  }

  /// Parse a config.toml body on top of the environment lookup `env`
  pub fn from_toml_str(
    contents: &str,
    env: impl Fn(&str) -> Option<String>,
  ) -> Result<Self, toml::de::Error> {
    let file = toml::from_str::<FileConfig>(contents)?;
    Ok(Self::resolve(file, env))
  }

  fn resolve(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Self {
    let defaults = Self::default();
    let env_parse = |key: &str| env(key).and_then(|v| v.trim().parse::<u64>().ok());

    let server = file.server.unwrap_or_default();
    let database = file.database.unwrap_or_default();
    let review = file.review.unwrap_or_default();
    let ai = file.ai.unwrap_or_default();
    let dedup = file.dedup.unwrap_or_default();
    let dictionary = file.dictionary.unwrap_or_default();
    let auth = file.auth.unwrap_or_default();

    let database_path = database
      .path
      .or_else(|| env("DATABASE_PATH"))
      .map(PathBuf::from)
      .unwrap_or(defaults.database_path);

    let max_batch_size = review.max_batch_size.unwrap_or(defaults.max_batch_size).max(1);

    Self {
      server_addr: server.addr.or_else(|| env("SERVER_ADDR")).unwrap_or(defaults.server_addr),
      server_port: server
        .port
        .or_else(|| env_parse("PORT").and_then(|p| u16::try_from(p).ok()))
        .unwrap_or(defaults.server_port),
      database_path,
      batch_size: review.batch_size.unwrap_or(defaults.batch_size).clamp(1, max_batch_size),
      max_batch_size,
      ai: AiConfig {
        retry_attempts: ai
          .retry_attempts
          .or_else(|| env_parse("AI_RETRY_ATTEMPTS").map(|v| v as u32))
          .unwrap_or(defaults.ai.retry_attempts)
          .max(1),
        retry_base: ai
          .retry_base_ms
          .map(Duration::from_millis)
          .unwrap_or(defaults.ai.retry_base),
        request_timeout: ai
          .request_timeout_secs
          .or_else(|| env_parse("AI_TIMEOUT_SECS"))
          .map(Duration::from_secs)
          .unwrap_or(defaults.ai.request_timeout),
        daily_quota: ai
          .daily_quota
          .or_else(|| env_parse("AI_DAILY_QUOTA").map(|v| v as i64))
          .unwrap_or(defaults.ai.daily_quota),
      },
      similarity_threshold: dedup
        .similarity_threshold
        .unwrap_or(defaults.similarity_threshold)
        .clamp(0.0, 1.0),
      fuzzy_scan_limit: dedup.fuzzy_scan_limit.unwrap_or(defaults.fuzzy_scan_limit),
      dictionary_cache_capacity: dictionary
        .cache_capacity
        .unwrap_or(defaults.dictionary_cache_capacity),
      dictionary_cache_ttl: dictionary
        .cache_ttl_secs
        .map(Duration::from_secs)
        .unwrap_or(defaults.dictionary_cache_ttl),
      session_hours: auth.session_hours.unwrap_or(defaults.session_hours),
      admin_username: auth.admin_username.or_else(|| env("ADMIN_USERNAME")),
      admin_password: auth.admin_password.or_else(|| env("ADMIN_PASSWORD")),
    }
  }

  /// Get the full server bind address
  pub fn bind_addr(&self) -> String {
    format!("{}:{}", self.server_addr, self.server_port)
  }

  /// Clamp a client-requested batch size into the configured range
  pub fn batch_limit(&self, requested: Option<usize>) -> usize {
    requested.unwrap_or(self.batch_size).clamp(1, self.max_batch_size)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn no_env(_: &str) -> Option<String> {
    None
  }

  #[test]
  fn test_empty_file_uses_defaults() {
    let config = AppConfig::from_toml_str("", no_env).unwrap();
    assert_eq!(config.server_port, SERVER_PORT);
    assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
    assert_eq!(config.ai.retry_attempts, AI_RETRY_ATTEMPTS);
  }

  #[test]
  fn test_file_overrides_env() {
    let toml = r#"
      [database]
      path = "/tmp/from-file.db"
    "#;
    let env = |key: &str| (key == "DATABASE_PATH").then(|| "/tmp/from-env.db".to_string());
    let config = AppConfig::from_toml_str(toml, env).unwrap();
    assert_eq!(config.database_path, PathBuf::from("/tmp/from-file.db"));
  }

  #[test]
  fn test_env_used_when_file_silent() {
    let env = |key: &str| match key {
      "PORT" => Some("4100".to_string()),
      "ADMIN_USERNAME" => Some("root".to_string()),
      _ => None,
    };
    let config = AppConfig::from_toml_str("", env).unwrap();
    assert_eq!(config.server_port, 4100);
    assert_eq!(config.admin_username.as_deref(), Some("root"));
  }

  #[test]
  fn test_batch_limit_is_clamped() {
    let toml = r#"
      [review]
      batch_size = 10
      max_batch_size = 50
    "#;
    let config = AppConfig::from_toml_str(toml, no_env).unwrap();
    assert_eq!(config.batch_limit(None), 10);
    assert_eq!(config.batch_limit(Some(500)), 50);
    assert_eq!(config.batch_limit(Some(0)), 1);
  }
}
