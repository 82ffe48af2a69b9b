//! KPI daily cache repository (optional computed-metric cache).

use chrono::NaiveDate;
use rusqlite::params;

use crate::errors::{DomainError, DomainResult};
use crate::models::KpiDaily;
use crate::repos::{date_from_sql, date_to_sql};
use crate::storage::{Database, TxBehavior};

pub struct KpiRepo {
    db: Database,
}

impl KpiRepo {
    pub fn new(db: &Database) -> Self {
        Self { db: db.clone() }
    }

    pub fn upsert(&self, kpi: &KpiDaily) -> DomainResult<()> {
        let metrics = serde_json::to_string(&kpi.metrics)
            .map_err(|e| DomainError::business_rule(format!("kpi metrics not serializable: {}", e)))?;
        self.db.with_tx(TxBehavior::Immediate, |conn| {
            conn.execute(
                "INSERT INTO kpi_daily (sku, date, mode, metrics)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(sku, date, mode) DO UPDATE SET metrics = excluded.metrics",
                params![kpi.sku, date_to_sql(kpi.date), kpi.mode, metrics],
            )?;
            Ok(())
        })
    }

    pub fn get(&self, sku: &str, date: NaiveDate, mode: &str) -> DomainResult<Option<KpiDaily>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT sku, date, mode, metrics FROM kpi_daily
                 WHERE sku = ?1 AND date = ?2 AND mode = ?3",
            )?;
            let mut rows = stmt.query(params![sku, date_to_sql(date), mode])?;
            match rows.next()? {
                Some(row) => {
                    let date_str: String = row.get(1)?;
                    let metrics_str: String = row.get(3)?;
                    Ok(Some(KpiDaily {
                        sku: row.get(0)?,
                        date: date_from_sql(&date_str)?,
                        mode: row.get(2)?,
                        metrics: serde_json::from_str(&metrics_str).map_err(|e| {
                            DomainError::business_rule(format!("kpi blob unreadable: {}", e))
                        })?,
                    }))
                }
                None => Ok(None),
            }
        })
    }
}
