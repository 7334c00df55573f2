use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::path::PathBuf;
use thiserror::Error;

/// Client-local key-value store for UI preferences.
pub struct Store {
    conn: Connection,
    path: PathBuf,
}

impl Store {
    pub fn open() -> Result<Self> {
        let path = Self::default_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open local storage at {}", path.display()))?;
        let store = Self { conn, path };
        store.init()?;
        Ok(store)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn,
            path: PathBuf::from(":memory:"),
        };
        store.init()?;
        Ok(store)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn data_dir() -> PathBuf {
        // XDG data directory, or the working directory as a last resort
        directories::ProjectDirs::from("", "", "job-hunter")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn default_path() -> Result<PathBuf> {
        Ok(Self::data_dir().join("storage.db"))
    }

    fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS local_storage (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;
        Ok(())
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("Failed to read '{}'", key))
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO local_storage (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn remove_item(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM local_storage WHERE key = ?1", [key])?;
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CorruptionError {
    #[error("stored value is not valid: {0}")]
    Malformed(String),
    #[error("stored version {found} does not match {expected}")]
    VersionMismatch { found: u32, expected: u32 },
}

#[derive(Serialize)]
struct EntryOut<'a, T> {
    v: u32,
    data: &'a T,
}

#[derive(Deserialize)]
struct EntryIn {
    v: u32,
    data: serde_json::Value,
}

/// A typed value under one storage key, wrapped as `{"v": version, "data": …}`.
///
/// Loading never fails: corrupt or outdated entries are removed and the
/// defaults come back instead. Saving is best-effort.
pub struct Versioned<T> {
    key: &'static str,
    version: u32,
    _marker: PhantomData<T>,
}

impl<T> Versioned<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub const fn new(key: &'static str, version: u32) -> Self {
        Self {
            key,
            version,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn decode(&self, raw: &str) -> Result<T, CorruptionError> {
        let entry: EntryIn =
            serde_json::from_str(raw).map_err(|e| CorruptionError::Malformed(e.to_string()))?;
        if entry.v != self.version {
            return Err(CorruptionError::VersionMismatch {
                found: entry.v,
                expected: self.version,
            });
        }
        // missing fields fall back to T's defaults via #[serde(default)]
        serde_json::from_value(entry.data).map_err(|e| CorruptionError::Malformed(e.to_string()))
    }

    pub fn encode(&self, value: &T) -> Result<String, serde_json::Error> {
        serde_json::to_string(&EntryOut {
            v: self.version,
            data: value,
        })
    }

    pub fn load(&self, store: &Store) -> T {
        let raw = match store.get_item(self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return T::default(),
            Err(e) => {
                tracing::warn!(key = self.key, error = %e, "local storage read failed");
                return T::default();
            }
        };

        match self.decode(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(key = self.key, error = %e, "discarding stored value");
                self.clear(store);
                T::default()
            }
        }
    }

    pub fn save(&self, store: &Store, value: &T) {
        let result = self
            .encode(value)
            .map_err(anyhow::Error::from)
            .and_then(|raw| store.set_item(self.key, &raw));
        if let Err(e) = result {
            tracing::warn!(key = self.key, error = %e, "local storage write failed");
        }
    }

    pub fn clear(&self, store: &Store) {
        if let Err(e) = store.remove_item(self.key) {
            tracing::warn!(key = self.key, error = %e, "local storage clear failed");
        }
    }
}
