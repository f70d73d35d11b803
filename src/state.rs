//! Application state shared by all handlers.

use std::sync::Arc;

use crate::ai::AiClient;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::services::dictionary::Dictionary;

/// Application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    /// Single connection shared by every request
    pub db: DbPool,

    pub config: Arc<AppConfig>,

    /// Client for the active language-model provider
    pub ai: AiClient,

    pub dictionary: Arc<Dictionary>,
}

impl AppState {
    pub fn new(db: DbPool, config: AppConfig) -> Self {
        let dictionary = Dictionary::new(config.dictionary_cache_capacity, config.dictionary_cache_ttl);
        Self::with_dictionary(db, config, dictionary)
    }

    /// Build state around a specific dictionary client
    pub fn with_dictionary(db: DbPool, config: AppConfig, dictionary: Dictionary) -> Self {
        Self {
            ai: AiClient::new(db.clone(), config.ai.clone()),
            db,
            config: Arc::new(config),
            dictionary: Arc::new(dictionary),
        }
    }
}
