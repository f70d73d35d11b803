//! File locations used by the server.
//!
//! `DATA_DIR` moves everything that is written at runtime (default: "data"),
//! so two instances can run side by side:
//! ```bash
//! DATA_DIR=data/staging PORT=3001 cargo run
//! ```

use std::env;
use std::sync::OnceLock;

static DATA_DIR_VALUE: OnceLock<String> = OnceLock::new();

/// Base directory for runtime data, read once from `DATA_DIR`
pub fn data_dir() -> &'static str {
    DATA_DIR_VALUE.get_or_init(|| env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()))
}

/// Default SQLite database path
pub fn db_path() -> String {
    format!("{}/tutor.db", data_dir())
}

/// Optional configuration file, read from the working directory
pub const CONFIG_FILE: &str = "config.toml";
