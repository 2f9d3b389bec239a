//! SettingsStore - encrypted key/value persistence with named profiles.
//!
//! Two tables in a local SQLite database:
//! - `settings(key, value, encrypted, description, created_at, updated_at)`
//! - `profiles(name, settings, active, created_at, updated_at)`
//!
//! Values flagged `encrypted` are sealed with AES-256-GCM before storage;
//! the key lives in a `.key` file beside the database (owner-only perms,
//! created on first use).
//!
//! # Key loss is unrecoverable
//!
//! If the `.key` file is deleted or corrupted, every encrypted value becomes
//! permanently unreadable. The store surfaces this as
//! [`Error::Encryption`](crate::error::Error::Encryption) instead of
//! silently returning garbage. Back the key file up alongside the database
//! if the secrets matter.

use rusqlite::{params, types::Value as SqlValue, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::encryption::ValueCipher;
use crate::error::{Error, Result};

/// A decoded setting value. `get` attempts structured decoding (numbers,
/// booleans) before falling back to a plain string.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl SettingValue {
    fn decode(raw: String) -> Self {
        match raw.as_str() {
            "true" => return SettingValue::Bool(true),
            "false" => return SettingValue::Bool(false),
            _ => {}
        }
        if let Ok(n) = raw.parse::<i64>() {
            return SettingValue::Integer(n);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return SettingValue::Float(f);
        }
        SettingValue::String(raw)
    }

    /// The value as stored, regardless of decoded type.
    pub fn as_string(&self) -> String {
        match self {
            SettingValue::String(s) => s.clone(),
            SettingValue::Integer(n) => n.to_string(),
            SettingValue::Float(f) => f.to_string(),
            SettingValue::Bool(b) => b.to_string(),
        }
    }
}

/// Metadata for one settings row. Listing never exposes values, decrypted
/// or otherwise, so secrets cannot leak through `hv settings list`.
#[derive(Debug, Clone)]
pub struct SettingInfo {
    pub key: String,
    pub encrypted: bool,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Durable settings storage with at-rest encryption for sensitive values.
pub struct SettingsStore {
    conn: Connection,
    cipher: ValueCipher,
}

impl SettingsStore {
    /// Open (or create) the store at `db_path`. The encryption key file is
    /// created next to it on first use.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let key_path = db_path
            .parent()
            .map(|p| p.join(".key"))
            .unwrap_or_else(|| PathBuf::from(".key"));
        let cipher = ValueCipher::load_or_create(&key_path)?;

        let conn = Connection::open(db_path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                encrypted BOOLEAN NOT NULL DEFAULT FALSE,
                description TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS profiles (
                name TEXT PRIMARY KEY,
                settings TEXT NOT NULL,
                active BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        ",
        )?;

        Ok(Self { conn, cipher })
    }

    /// Open the store at the default platform location
    /// (`<data_dir>/hubvault/settings.db`).
    pub fn open_default() -> Result<Self> {
        let base = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hubvault");
        Self::open(&base.join("settings.db"))
    }

    /// Upsert a setting. Overwriting preserves `created_at` and refreshes
    /// `updated_at`. Encrypted values are sealed before they hit the disk.
    pub fn set(
        &self,
        key: &str,
        value: &str,
        encrypted: bool,
        description: Option<&str>,
    ) -> Result<()> {
        let stored: SqlValue = if encrypted {
            SqlValue::Blob(self.cipher.seal(value.as_bytes())?)
        } else {
            SqlValue::Text(value.to_string())
        };

        self.conn.execute(
            "INSERT INTO settings (key, value, encrypted, description)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value,
                 encrypted = excluded.encrypted,
                 description = excluded.description,
                 updated_at = CURRENT_TIMESTAMP",
            params![key, stored, encrypted, description],
        )?;

        debug!(key, encrypted, "setting stored");
        Ok(())
    }

    /// Fetch a setting, decrypting if needed. Returns `None` if absent.
    pub fn get(&self, key: &str) -> Result<Option<SettingValue>> {
        let row: Option<(SqlValue, bool)> = self
            .conn
            .query_row(
                "SELECT value, encrypted FROM settings WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((stored, encrypted)) = row else {
            return Ok(None);
        };

        let raw = if encrypted {
            let sealed = match stored {
                SqlValue::Blob(b) => b,
                SqlValue::Text(t) => t.into_bytes(),
                _ => return Err(Error::Encryption("unexpected storage class".to_string())),
            };
            let plain = self.cipher.open(&sealed)?;
            String::from_utf8(plain)
                .map_err(|_| Error::Encryption("decrypted value is not UTF-8".to_string()))?
        } else {
            match stored {
                SqlValue::Text(t) => t,
                SqlValue::Blob(b) => String::from_utf8_lossy(&b).into_owned(),
                SqlValue::Integer(n) => n.to_string(),
                SqlValue::Real(f) => f.to_string(),
                SqlValue::Null => String::new(),
            }
        };

        Ok(Some(SettingValue::decode(raw)))
    }

    /// Fetch a setting as a string, or `default` if absent.
    pub fn get_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self
            .get(key)?
            .map(|v| v.as_string())
            .unwrap_or_else(|| default.to_string()))
    }

    /// Fetch an integer setting, or `default` if absent or non-numeric.
    pub fn get_i64_or(&self, key: &str, default: i64) -> Result<i64> {
        Ok(match self.get(key)? {
            Some(SettingValue::Integer(n)) => n,
            _ => default,
        })
    }

    /// Remove a setting. Returns `true` if a row existed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    /// List all settings ordered by key. Values are deliberately omitted.
    pub fn list(&self) -> Result<Vec<SettingInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT key, encrypted, description, created_at, updated_at
             FROM settings ORDER BY key",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SettingInfo {
                key: row.get(0)?,
                encrypted: row.get(1)?,
                description: row.get(2)?,
                created_at: row.get(3)?,
                updated_at: row.get(4)?,
            })
        })?;

        let mut infos = Vec::new();
        for info in rows {
            infos.push(info?);
        }
        Ok(infos)
    }

    // --- Profiles ---

    /// Create or replace a named profile snapshot.
    pub fn create_profile(&self, name: &str, settings: &BTreeMap<String, String>) -> Result<()> {
        let blob = serde_json::to_string(settings)?;
        self.conn.execute(
            "INSERT INTO profiles (name, settings)
             VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET
                 settings = excluded.settings,
                 updated_at = CURRENT_TIMESTAMP",
            params![name, blob],
        )?;
        Ok(())
    }

    /// Load a profile's settings map, or `None` if it does not exist.
    pub fn load_profile(&self, name: &str) -> Result<Option<BTreeMap<String, String>>> {
        let blob: Option<String> = self
            .conn
            .query_row(
                "SELECT settings FROM profiles WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        match blob {
            Some(blob) => Ok(Some(serde_json::from_str(&blob)?)),
            None => Ok(None),
        }
    }

    /// Activate one profile, deactivating all others atomically. At most one
    /// profile is active at any time. Fails with `NotFound` for an unknown
    /// profile name so a typo cannot silently deactivate everything.
    pub fn set_active_profile(&self, name: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("UPDATE profiles SET active = FALSE", [])?;
        let activated = tx.execute(
            "UPDATE profiles SET active = TRUE WHERE name = ?1",
            params![name],
        )?;
        if activated == 0 {
            // Roll back so the previously-active profile stays active
            tx.rollback()?;
            return Err(Error::NotFound(format!("profile '{}'", name)));
        }
        tx.commit()?;
        Ok(())
    }

    /// Name of the active profile, if any.
    pub fn get_active_profile(&self) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT name FROM profiles WHERE active = TRUE",
                [],
                |row| row.get(0),
            )
            .optional()?)
    }

    // --- Well-known settings ---

    /// Store the GitHub token (always encrypted).
    pub fn set_github_token(&self, token: &str) -> Result<()> {
        self.set(
            "github_token",
            token,
            true,
            Some("GitHub Personal Access Token"),
        )
    }

    /// The GitHub token, if configured.
    pub fn github_token(&self) -> Result<Option<String>> {
        Ok(self.get("github_token")?.map(|v| v.as_string()))
    }

    /// Default backup directory (falls back to `./backups`).
    pub fn backup_directory(&self) -> Result<PathBuf> {
        Ok(PathBuf::from(self.get_or("backup_directory", "./backups")?))
    }

    pub fn set_backup_directory(&self, path: &str) -> Result<()> {
        self.set(
            "backup_directory",
            path,
            false,
            Some("Default backup directory path"),
        )
    }

    /// Number of parallel clone workers (falls back to 4).
    pub fn parallel_workers(&self) -> Result<usize> {
        Ok(self.get_i64_or("parallel_workers", 4)?.max(1) as usize)
    }

    pub fn set_parallel_workers(&self, count: usize) -> Result<()> {
        self.set(
            "parallel_workers",
            &count.to_string(),
            false,
            Some("Number of parallel backup workers"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> SettingsStore {
        SettingsStore::open(&dir.path().join("settings.db")).unwrap()
    }

    #[test]
    fn test_set_get_plain() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.set("backup_directory", "/tmp/backups", false, None)?;
        assert_eq!(
            store.get("backup_directory")?,
            Some(SettingValue::String("/tmp/backups".to_string()))
        );
        Ok(())
    }

    #[test]
    fn test_encrypted_roundtrip() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.set("github_token", "ghp_secret123", true, Some("token"))?;
        assert_eq!(
            store.get("github_token")?,
            Some(SettingValue::String("ghp_secret123".to_string()))
        );
        Ok(())
    }

    #[test]
    fn test_encrypted_value_not_plaintext_on_disk() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("settings.db");
        let store = SettingsStore::open(&db_path)?;

        store.set("github_token", "ghp_plainleakcheck", true, None)?;
        drop(store);

        // The raw database file must not contain the secret
        let raw = std::fs::read(&db_path).unwrap();
        let needle = b"ghp_plainleakcheck";
        let found = raw.windows(needle.len()).any(|w| w == needle);
        assert!(!found, "secret leaked into database file in plaintext");
        Ok(())
    }

    #[test]
    fn test_structured_decoding() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.set("parallel_workers", "8", false, None)?;
        store.set("verify_ssl", "true", false, None)?;
        store.set("ratio", "0.75", false, None)?;

        assert_eq!(
            store.get("parallel_workers")?,
            Some(SettingValue::Integer(8))
        );
        assert_eq!(store.get("verify_ssl")?, Some(SettingValue::Bool(true)));
        assert_eq!(store.get("ratio")?, Some(SettingValue::Float(0.75)));
        Ok(())
    }

    #[test]
    fn test_get_missing_returns_none_and_default() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        assert_eq!(store.get("nope")?, None);
        assert_eq!(store.get_or("nope", "fallback")?, "fallback");
        assert_eq!(store.get_i64_or("nope", 4)?, 4);
        Ok(())
    }

    #[test]
    fn test_delete_semantics() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        assert!(!store.delete("absent")?);

        store.set("temp", "x", false, None)?;
        assert!(store.delete("temp")?);
        assert_eq!(store.get("temp")?, None);
        Ok(())
    }

    #[test]
    fn test_overwrite_preserves_created_at() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.set("k", "v1", false, None)?;
        let before = &store.list()?[0];
        let created = before.created_at.clone();

        store.set("k", "v2", false, Some("updated"))?;
        let after = &store.list()?[0];

        assert_eq!(after.created_at, created);
        assert_eq!(
            store.get("k")?,
            Some(SettingValue::String("v2".to_string()))
        );
        assert_eq!(after.description.as_deref(), Some("updated"));
        Ok(())
    }

    #[test]
    fn test_list_ordered_and_never_exposes_values() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.set("zeta", "plain-value", false, None)?;
        store.set("alpha", "secret-value", true, Some("a secret"))?;

        let infos = store.list()?;
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].key, "alpha");
        assert!(infos[0].encrypted);
        assert_eq!(infos[1].key, "zeta");
        assert!(!infos[1].encrypted);
        Ok(())
    }

    #[test]
    fn test_profiles_single_active() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let mut a = BTreeMap::new();
        a.insert("backup_directory".to_string(), "/a".to_string());
        let mut b = BTreeMap::new();
        b.insert("backup_directory".to_string(), "/b".to_string());

        store.create_profile("work", &a)?;
        store.create_profile("personal", &b)?;

        store.set_active_profile("work")?;
        assert_eq!(store.get_active_profile()?, Some("work".to_string()));

        store.set_active_profile("personal")?;
        assert_eq!(store.get_active_profile()?, Some("personal".to_string()));

        // Exactly one profile is active after the switch
        let loaded = store.load_profile("personal")?.unwrap();
        assert_eq!(loaded.get("backup_directory").map(String::as_str), Some("/b"));
        Ok(())
    }

    #[test]
    fn test_activate_unknown_profile_fails_and_keeps_active() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.create_profile("work", &BTreeMap::new())?;
        store.set_active_profile("work")?;

        let result = store.set_active_profile("ghost");
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(store.get_active_profile()?, Some("work".to_string()));
        Ok(())
    }

    #[test]
    fn test_load_missing_profile_is_none() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        assert!(store.load_profile("ghost")?.is_none());
        Ok(())
    }

    #[test]
    fn test_well_known_accessors() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        assert_eq!(store.backup_directory()?, PathBuf::from("./backups"));
        assert_eq!(store.parallel_workers()?, 4);
        assert_eq!(store.github_token()?, None);

        store.set_github_token("ghp_abc")?;
        store.set_backup_directory("/srv/backups")?;
        store.set_parallel_workers(8)?;

        assert_eq!(store.github_token()?, Some("ghp_abc".to_string()));
        assert_eq!(store.backup_directory()?, PathBuf::from("/srv/backups"));
        assert_eq!(store.parallel_workers()?, 8);

        // Token rows must be flagged encrypted
        let infos = store.list()?;
        let token_row = infos.iter().find(|i| i.key == "github_token").unwrap();
        assert!(token_row.encrypted);
        Ok(())
    }
}
