//! Holidays singleton repository.

use rusqlite::params;

use crate::config::HolidaySet;
use crate::errors::{DomainError, DomainResult};
use crate::storage::{Database, TxBehavior};

pub struct HolidaysRepo {
    db: Database,
}

impl HolidaysRepo {
    pub fn new(db: &Database) -> Self {
        Self { db: db.clone() }
    }

    /// Read-through; a missing row yields the empty rule set (the built-in
    /// national holidays still apply at query time).
    pub fn get(&self) -> DomainResult<HolidaySet> {
        let blob: Option<String> = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached("SELECT data FROM holidays WHERE id = 1")?;
            let mut rows = stmt.query([])?;
            match rows.next()? {
                Some(row) => Ok(Some(row.get::<_, String>(0)?)),
                None => Ok(None),
            }
        })?;

        match blob {
            Some(data) => serde_json::from_str(&data).map_err(|e| {
                DomainError::critical(format!("holidays blob is unreadable: {}", e))
            }),
            None => Ok(HolidaySet::default()),
        }
    }

    pub fn put(&self, set: &HolidaySet) -> DomainResult<()> {
        let data = serde_json::to_string(set)
            .map_err(|e| DomainError::business_rule(format!("holidays not serializable: {}", e)))?;
        self.db.with_tx(TxBehavior::Immediate, |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO holidays (id, data) VALUES (1, ?1)",
                params![data],
            )?;
            Ok(())
        })
    }
}
