//! AI provider credentials (ai_providers table)

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result};
use serde::{Deserialize, Serialize};

use super::{parse_ts, ts};
use crate::ai::provider::{mask_api_key, ProviderKind};

#[derive(Debug, Clone, PartialEq)]
pub struct AiProviderRecord {
  pub id: i64,
  pub provider: ProviderKind,
  pub model_name: String,
  pub api_key: String,
  /// Replaces the provider's default endpoint when set
  pub base_url: Option<String>,
  pub is_active: bool,
  /// Lower number wins
  pub priority: i64,
  pub config: serde_json::Value,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Provider as shown to admins, with the key masked
#[derive(Debug, Clone, Serialize)]
pub struct ProviderView {
  pub id: i64,
  pub provider_name: ProviderKind,
  pub model_name: String,
  pub api_key: String,
  pub base_url: Option<String>,
  pub is_active: bool,
  pub priority: i64,
  pub config: serde_json::Value,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl From<&AiProviderRecord> for ProviderView {
  fn from(r: &AiProviderRecord) -> Self {
    Self {
      id: r.id,
      provider_name: r.provider,
      model_name: r.model_name.clone(),
      api_key: mask_api_key(&r.api_key),
      base_url: r.base_url.clone(),
      is_active: r.is_active,
      priority: r.priority,
      config: r.config.clone(),
      created_at: r.created_at,
      updated_at: r.updated_at,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProvider {
  pub provider_name: ProviderKind,
  pub model_name: String,
  pub api_key: String,
  #[serde(default)]
  pub base_url: Option<String>,
  #[serde(default)]
  pub priority: i64,
  #[serde(default)]
  pub config: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderUpdate {
  #[serde(default)]
  pub model_name: Option<String>,
  /// Ignored when empty or still masked
  #[serde(default)]
  pub api_key: Option<String>,
  #[serde(default)]
  pub base_url: Option<String>,
  #[serde(default)]
  pub priority: Option<i64>,
  #[serde(default)]
  pub config: Option<serde_json::Value>,
}

const PROVIDER_COLUMNS: &str =
  "id, provider_name, model_name, api_key, base_url, is_active, priority, config, created_at, updated_at";

fn row_to_provider(row: &rusqlite::Row) -> Result<AiProviderRecord> {
  let kind: String = row.get(1)?;
  let config: Option<String> = row.get(7)?;
  let created_at: String = row.get(8)?;
  let updated_at: String = row.get(9)?;
  let provider = ProviderKind::from_str(&kind).ok_or_else(|| {
    rusqlite::Error::FromSqlConversionFailure(
      1,
      rusqlite::types::Type::Text,
      format!("unknown provider {}", kind).into(),
    )
  })?;
  Ok(AiProviderRecord {
    id: row.get(0)?,
    provider,
    model_name: row.get(2)?,
    api_key: row.get(3)?,
    base_url: row.get(4)?,
    is_active: row.get::<_, i64>(5)? != 0,
    priority: row.get(6)?,
    config: config
      .and_then(|c| serde_json::from_str(&c).ok())
      .unwrap_or_else(|| serde_json::json!({})),
    created_at: parse_ts(&created_at),
    updated_at: parse_ts(&updated_at),
  })
}

/// Create a provider entry. The first entry of a kind starts out active.
pub fn create_provider(conn: &Connection, p: &NewProvider) -> Result<i64> {
  let has_active: bool = conn.query_row(
    "SELECT COUNT(*) > 0 FROM ai_providers WHERE provider_name = ?1 AND is_active = 1",
    params![p.provider_name.as_str()],
    |row| row.get(0),
  )?;
  let now = ts(&Utc::now());
  let config = p.config.clone().unwrap_or_else(|| serde_json::json!({}));
  conn.execute(
    r#"
    INSERT INTO ai_providers (provider_name, model_name, api_key, base_url, is_active, priority, config,
                              created_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
    "#,
    params![
      p.provider_name.as_str(),
      p.model_name.trim(),
      p.api_key.trim(),
      p.base_url,
      !has_active,
      p.priority,
      config.to_string(),
      now,
    ],
  )?;
  Ok(conn.last_insert_rowid())
}

pub fn get_provider(conn: &Connection, id: i64) -> Result<Option<AiProviderRecord>> {
  conn
    .query_row(
      &format!("SELECT {} FROM ai_providers WHERE id = ?1", PROVIDER_COLUMNS),
      params![id],
      row_to_provider,
    )
    .optional()
}

pub fn list_providers(conn: &Connection) -> Result<Vec<AiProviderRecord>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {} FROM ai_providers ORDER BY is_active DESC, priority ASC, id ASC",
    PROVIDER_COLUMNS
  ))?;
  let rows = stmt.query_map([], row_to_provider)?.collect::<Result<Vec<_>>>()?;
  Ok(rows)
}

/// The provider used for calls: active, lowest priority number first
pub fn get_active_provider(conn: &Connection) -> Result<Option<AiProviderRecord>> {
  conn
    .query_row(
      &format!(
        "SELECT {} FROM ai_providers WHERE is_active = 1 ORDER BY priority ASC, id ASC LIMIT 1",
        PROVIDER_COLUMNS
      ),
      [],
      row_to_provider,
    )
    .optional()
}

pub fn update_provider(conn: &Connection, id: i64, u: &ProviderUpdate) -> Result<bool> {
  let Some(current) = get_provider(conn, id)? else {
    return Ok(false);
  };
  let api_key = u
    .api_key
    .as_deref()
    .map(str::trim)
    .filter(|k| !k.is_empty() && !k.contains("****"))
    .map(str::to_string)
    .unwrap_or(current.api_key);
  let config = u.config.clone().unwrap_or(current.config);
  conn.execute(
    r#"
    UPDATE ai_providers SET model_name = ?1, api_key = ?2, base_url = ?3, priority = ?4, config = ?5,
                            updated_at = ?6
    WHERE id = ?7
    "#,
    params![
      u.model_name.as_deref().map(str::trim).unwrap_or(&current.model_name),
      api_key,
      u.base_url.clone().or(current.base_url),
      u.priority.unwrap_or(current.priority),
      config.to_string(),
      ts(&Utc::now()),
      id,
    ],
  )?;
  Ok(true)
}

/// Activate one entry and deactivate the other entries of the same kind
pub fn activate_provider(conn: &Connection, id: i64) -> Result<bool> {
  let Some(target) = get_provider(conn, id)? else {
    return Ok(false);
  };
  let tx = conn.unchecked_transaction()?;
  let now = ts(&Utc::now());
  tx.execute(
    "UPDATE ai_providers SET is_active = 0, updated_at = ?1 WHERE provider_name = ?2 AND id != ?3",
    params![now, target.provider.as_str(), id],
  )?;
  tx.execute(
    "UPDATE ai_providers SET is_active = 1, updated_at = ?1 WHERE id = ?2",
    params![now, id],
  )?;
  tx.commit()?;
  Ok(true)
}

pub fn delete_provider(conn: &Connection, id: i64) -> Result<bool> {
  let deleted = conn.execute("DELETE FROM ai_providers WHERE id = ?1", params![id])?;
  Ok(deleted == 1)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::TestEnv;

  fn new_provider(kind: ProviderKind, priority: i64) -> NewProvider {
    NewProvider {
      provider_name: kind,
      model_name: "model-x".into(),
      api_key: "sk-abcdefghijklmnop".into(),
      base_url: None,
      priority,
      config: None,
    }
  }

  #[test]
  fn test_first_provider_of_kind_is_active() {
    let env = TestEnv::new().unwrap();
    let first = create_provider(&env.conn, &new_provider(ProviderKind::DeepSeek, 0)).unwrap();
    let second = create_provider(&env.conn, &new_provider(ProviderKind::DeepSeek, 0)).unwrap();
    assert!(get_provider(&env.conn, first).unwrap().unwrap().is_active);
    assert!(!get_provider(&env.conn, second).unwrap().unwrap().is_active);
  }

  #[test]
  fn test_active_provider_lowest_priority_number() {
    let env = TestEnv::new().unwrap();
    create_provider(&env.conn, &new_provider(ProviderKind::OpenAi, 5)).unwrap();
    let preferred = create_provider(&env.conn, &new_provider(ProviderKind::Claude, 1)).unwrap();
    let active = get_active_provider(&env.conn).unwrap().unwrap();
    assert_eq!(active.id, preferred);
  }

  #[test]
  fn test_activate_switches_within_kind() {
    let env = TestEnv::new().unwrap();
    let a = create_provider(&env.conn, &new_provider(ProviderKind::Gemini, 0)).unwrap();
    let b = create_provider(&env.conn, &new_provider(ProviderKind::Gemini, 0)).unwrap();
    assert!(activate_provider(&env.conn, b).unwrap());
    assert!(!get_provider(&env.conn, a).unwrap().unwrap().is_active);
    assert!(get_provider(&env.conn, b).unwrap().unwrap().is_active);
    assert!(!activate_provider(&env.conn, 999).unwrap());
  }

  #[test]
  fn test_update_keeps_key_when_masked() {
    let env = TestEnv::new().unwrap();
    let id = create_provider(&env.conn, &new_provider(ProviderKind::Kimi, 0)).unwrap();
    let update = ProviderUpdate {
      api_key: Some("sk-a****mnop".into()),
      priority: Some(3),
      ..Default::default()
    };
    assert!(update_provider(&env.conn, id, &update).unwrap());
    let stored = get_provider(&env.conn, id).unwrap().unwrap();
    assert_eq!(stored.api_key, "sk-abcdefghijklmnop");
    assert_eq!(stored.priority, 3);
  }

  #[test]
  fn test_view_masks_key() {
    let env = TestEnv::new().unwrap();
    let id = create_provider(&env.conn, &new_provider(ProviderKind::MiniMax, 0)).unwrap();
    let view = ProviderView::from(&get_provider(&env.conn, id).unwrap().unwrap());
    assert_eq!(view.api_key, "sk-a****mnop");
  }
}
