//! Configuration management
//!
//! Settings live in `<data_dir>/settings.json`:
//! ```json
//! {
//!   "storage": { "inMemory": false, "databaseFile": "accounts.duckdb" },
//!   "credentials": { "timeCost": 3, "memoryCost": 65536, "parallelism": 4, "hashLen": 32 }
//! }
//! ```
//! Keys this crate does not manage are preserved on save.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::Argon2Params;

pub const SETTINGS_FILE: &str = "settings.json";
pub const DEFAULT_DATABASE_FILE: &str = "accounts.duckdb";

/// Env override for in-memory storage
pub const IN_MEMORY_ENV: &str = "ACCOUNT_CORE_IN_MEMORY";
/// Env override for the database file name
pub const DB_FILE_ENV: &str = "ACCOUNT_CORE_DB_FILE";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    storage: StorageSettings,
    #[serde(default)]
    credentials: Argon2Params,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageSettings {
    #[serde(default)]
    in_memory: bool,
    #[serde(default = "default_database_file")]
    database_file: String,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            in_memory: false,
            database_file: default_database_file(),
            other: HashMap::new(),
        }
    }
}

fn default_database_file() -> String {
    DEFAULT_DATABASE_FILE.to_string()
}

/// Account core configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub in_memory: bool,
    pub database_file: String,
    pub credentials: Argon2Params,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            in_memory: false,
            database_file: default_database_file(),
            credentials: Argon2Params::default(),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "true" | "1" | "yes" | "TRUE" | "YES" => Some(true),
        "false" | "0" | "no" | "FALSE" | "NO" => Some(false),
        _ => None,
    }
}

fn read_settings(settings_path: &Path) -> Result<SettingsFile> {
    if !settings_path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(settings_path)
        .with_context(|| format!("Failed to read {}", settings_path.display()))?;
    Ok(serde_json::from_str(&content).unwrap_or_default())
}

impl Config {
    /// Load config from the data directory
    ///
    /// A missing or unparsable settings file yields defaults. Environment
    /// variables override the file.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let raw = read_settings(&data_dir.join(SETTINGS_FILE))?;

        let in_memory = std::env::var(IN_MEMORY_ENV)
            .ok()
            .as_deref()
            .and_then(parse_flag)
            .unwrap_or(raw.storage.in_memory);

        let database_file = std::env::var(DB_FILE_ENV)
            .ok()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(raw.storage.database_file);

        Ok(Self {
            in_memory,
            database_file,
            credentials: raw.credentials,
        })
    }

    /// Save config to the data directory, preserving unmanaged keys
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let settings_path = data_dir.join(SETTINGS_FILE);
        let mut settings = read_settings(&settings_path)?;

        settings.storage.in_memory = self.in_memory;
        settings.storage.database_file = self.database_file.clone();
        settings.credentials = self.credentials.clone();

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)
            .with_context(|| format!("Failed to write {}", settings_path.display()))?;
        Ok(())
    }
}
