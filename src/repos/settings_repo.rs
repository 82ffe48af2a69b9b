//! Settings singleton repository.
//!
//! One JSON blob at id=1, replaced atomically. Reads fall back to defaults
//! when the row is absent; writes never lose unknown keys (they ride along
//! inside the typed tree's flattened extras).

use rusqlite::params;

use crate::config::Settings;
use crate::errors::{DomainError, DomainResult};
use crate::storage::{Database, TxBehavior};

pub struct SettingsRepo {
    db: Database,
}

impl SettingsRepo {
    pub fn new(db: &Database) -> Self {
        Self { db: db.clone() }
    }

    /// Read-through with defaults; a missing row yields `Settings::default()`.
    pub fn get(&self) -> DomainResult<Settings> {
        let blob: Option<String> = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached("SELECT data FROM settings WHERE id = 1")?;
            let mut rows = stmt.query([])?;
            match rows.next()? {
                Some(row) => Ok(Some(row.get::<_, String>(0)?)),
                None => Ok(None),
            }
        })?;

        match blob {
            Some(data) => serde_json::from_str(&data).map_err(|e| {
                DomainError::critical(format!("settings blob is unreadable: {}", e))
            }),
            None => Ok(Settings::default()),
        }
    }

    /// Replace the singleton atomically.
    pub fn put(&self, settings: &Settings) -> DomainResult<()> {
        self.replace(settings, "SETTINGS_UPDATED")
    }

    /// Reset to defaults (drops unknown keys by design).
    pub fn reset(&self) -> DomainResult<()> {
        self.replace(&Settings::default(), "SETTINGS_RESET")
    }

    fn replace(&self, settings: &Settings, operation: &str) -> DomainResult<()> {
        let data = serde_json::to_string(settings)
            .map_err(|e| DomainError::business_rule(format!("settings not serializable: {}", e)))?;
        self.db.with_tx(TxBehavior::Immediate, |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO settings (id, data) VALUES (1, ?1)",
                params![data],
            )?;
            crate::repos::AuditRepo::append_in(conn, operation, "system", None, "", None)?;
            Ok(())
        })
    }
}
