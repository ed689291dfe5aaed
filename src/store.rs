//! Persistent configuration store.
//!
//! A small rusqlite-backed key/value table holds the active vendor
//! configuration as JSON. The proxy reads it once at start and writes it
//! back when it learns an endpoint-format fallback or refreshes the
//! needs-proxy probe decision.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::CFG_API_CONFIG;
use crate::vendor::VendorKind;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// One upstream vendor configuration. Mutated by the proxy only through the
/// documented fallback and probe paths; everything else treats it read-only.
///
/// `force_openai_format` is sticky: once the proxy has learned that a base
/// URL rejects the Anthropic endpoint it never silently reverts, only
/// [`ConfigStore::reset_format_fallback`] clears it.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct VendorConfig {
    pub id: String,
    pub name: String,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub api_type: VendorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_headers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub force_openai_format: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_proxy: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_proxy_checked_at: Option<DateTime<Utc>>,
}

pub struct ConfigStore {
    conn: Mutex<Connection>,
}

impl ConfigStore {
    pub fn new<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory store, used by tests and ephemeral runs.
    pub fn in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS settings (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Fetches a setting and deserializes it, `None` when the key is absent.
    pub fn get_config<T>(&self, key: &str) -> StoreResult<Option<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stmt = conn.prepare("SELECT value FROM settings WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => {
                let raw: String = row.get(0)?;
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    /// Serializes and upserts a setting.
    pub fn set_config<T>(&self, key: &str, value: &T) -> StoreResult<()>
    where
        T: Serialize,
    {
        let raw = serde_json::to_string(value)?;
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, raw],
        )?;
        Ok(())
    }

    pub fn load_api_config(&self) -> StoreResult<Option<VendorConfig>> {
        self.get_config(CFG_API_CONFIG)
    }

    pub fn save_api_config(&self, config: &VendorConfig) -> StoreResult<()> {
        self.set_config(CFG_API_CONFIG, config)
    }

    /// Explicitly clears the learned endpoint-format fallback. This is the
    /// only path that turns `force_openai_format` off again.
    pub fn reset_format_fallback(&self) -> StoreResult<()> {
        if let Some(mut config) = self.load_api_config()? {
            config.force_openai_format = false;
            self.save_api_config(&config)?;
        }
        Ok(())
    }
}
