use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const MIGRATION_SQL_0001: &str = include_str!("../migrations/0001_settings.sql");

pub const KEY_OWNED_CARDS: &str = "ownedCards";
pub const KEY_CARD_SIZE: &str = "cardSize";
pub const KEY_FULL_WIDTH: &str = "fullWidth";

pub const DEFAULT_CARD_SIZE: u32 = 180;
pub const MIN_CARD_SIZE: u32 = 120;
pub const MAX_CARD_SIZE: u32 = 300;

/// Per-installation key-value persistence. Writes are synchronous and carry
/// no versioning; the last write for a key wins.
pub trait KeyValueStore {
  fn get(&self, key: &str) -> Result<Option<Value>, String>;
  fn set(&mut self, key: &str, value: Value) -> Result<(), String>;
}

pub fn now_iso() -> String {
  Utc::now().to_rfc3339()
}

/// Reads a typed value, falling back to `default` when the key is missing or
/// holds something that does not deserialize.
pub fn read_or<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str, default: T) -> T {
  match store.get(key) {
    Ok(Some(value)) => match serde_json::from_value(value) {
      Ok(parsed) => parsed,
      Err(error) => {
        log::warn!("stored value for '{}' is malformed, using default: {}", key, error);
        default
      }
    },
    Ok(None) => default,
    Err(error) => {
      log::warn!("could not read '{}', using default: {}", key, error);
      default
    }
  }
}

/// Fire-and-forget write: failures are logged, never surfaced.
pub fn write_logged<T: Serialize>(store: &mut dyn KeyValueStore, key: &str, value: &T) {
  let result = serde_json::to_value(value)
    .map_err(|e| e.to_string())
    .and_then(|value| store.set(key, value));
  if let Err(error) = result {
    log::warn!("could not persist '{}': {}", key, error);
  }
}

pub struct SqliteStore {
  db_path: PathBuf,
}

fn init_database(db_path: &Path) -> Result<(), String> {
  if let Some(parent) = db_path.parent() {
    fs::create_dir_all(parent).map_err(|e| e.to_string())?;
  }

  let connection = Connection::open(db_path).map_err(|e| e.to_string())?;
  connection
    .execute_batch(MIGRATION_SQL_0001)
    .map_err(|e| e.to_string())?;
  Ok(())
}

fn open_database(db_path: &Path) -> Result<Connection, String> {
  Connection::open(db_path).map_err(|e| e.to_string())
}

impl SqliteStore {
  pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, String> {
    let db_path = db_path.into();
    init_database(&db_path)?;
    log::debug!("settings database ready at {}", db_path.display());
    Ok(SqliteStore { db_path })
  }
}

impl KeyValueStore for SqliteStore {
  fn get(&self, key: &str) -> Result<Option<Value>, String> {
    let connection = open_database(&self.db_path)?;
    let raw: Option<String> = connection
      .query_row(
        "SELECT value FROM settings WHERE key = ?1 LIMIT 1",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| e.to_string())?;

    match raw {
      Some(text) => serde_json::from_str(&text).map(Some).map_err(|e| e.to_string()),
      None => Ok(None),
    }
  }

  fn set(&mut self, key: &str, value: Value) -> Result<(), String> {
    let connection = open_database(&self.db_path)?;
    let text = serde_json::to_string(&value).map_err(|e| e.to_string())?;
    connection
      .execute(
        "INSERT INTO settings (key, value, updated_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET
           value = excluded.value,
           updated_at = excluded.updated_at",
        params![key, text, now_iso()],
      )
      .map_err(|e| e.to_string())?;
    Ok(())
  }
}

#[derive(Default, Debug, Clone)]
pub struct MemoryStore {
  values: HashMap<String, Value>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl KeyValueStore for MemoryStore {
  fn get(&self, key: &str) -> Result<Option<Value>, String> {
    Ok(self.values.get(key).cloned())
  }

  fn set(&mut self, key: &str, value: Value) -> Result<(), String> {
    self.values.insert(key.to_string(), value);
    Ok(())
  }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DisplaySettings {
  pub card_size: u32,
  pub full_width: bool,
}

impl Default for DisplaySettings {
  fn default() -> Self {
    DisplaySettings {
      card_size: DEFAULT_CARD_SIZE,
      full_width: false,
    }
  }
}

impl DisplaySettings {
  pub fn load(store: &dyn KeyValueStore) -> Self {
    DisplaySettings {
      card_size: read_or(store, KEY_CARD_SIZE, DEFAULT_CARD_SIZE).clamp(MIN_CARD_SIZE, MAX_CARD_SIZE),
      full_width: read_or(store, KEY_FULL_WIDTH, false),
    }
  }

  pub fn persist(&self, store: &mut dyn KeyValueStore) {
    write_logged(store, KEY_CARD_SIZE, &self.card_size);
    write_logged(store, KEY_FULL_WIDTH, &self.full_width);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn read_or_falls_back_on_missing_and_malformed() {
    let mut store = MemoryStore::new();
    assert_eq!(read_or(&store, KEY_CARD_SIZE, 180u32), 180);

    store.set(KEY_CARD_SIZE, json!("wide")).unwrap();
    assert_eq!(read_or(&store, KEY_CARD_SIZE, 180u32), 180);

    store.set(KEY_CARD_SIZE, json!(220)).unwrap();
    assert_eq!(read_or(&store, KEY_CARD_SIZE, 180u32), 220);
  }

  #[test]
  fn display_settings_clamp_card_size() {
    let mut store = MemoryStore::new();
    write_logged(&mut store, KEY_CARD_SIZE, &900u32);
    write_logged(&mut store, KEY_FULL_WIDTH, &true);
    let settings = DisplaySettings::load(&store);
    assert_eq!(settings.card_size, MAX_CARD_SIZE);
    assert!(settings.full_width);
  }

  #[test]
  fn stored_card_size_below_slider_minimum_is_raised() {
    let mut store = MemoryStore::new();
    write_logged(&mut store, KEY_CARD_SIZE, &110u32);
    assert_eq!(DisplaySettings::load(&store).card_size, 120);
  }

  #[test]
  fn sqlite_store_upserts_values() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = SqliteStore::open(dir.path().join("nested").join("cardlist.db")).unwrap();
    assert_eq!(store.get(KEY_FULL_WIDTH).unwrap(), None);

    store.set(KEY_FULL_WIDTH, json!(false)).unwrap();
    store.set(KEY_FULL_WIDTH, json!(true)).unwrap();
    assert_eq!(store.get(KEY_FULL_WIDTH).unwrap(), Some(json!(true)));
  }
}
