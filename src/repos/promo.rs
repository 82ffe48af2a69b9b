//! Promo-calendar repository.

use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

use crate::errors::{DomainError, DomainResult};
use crate::models::PromoWindow;
use crate::repos::{date_from_sql, date_to_sql};
use crate::storage::{Database, TxBehavior};

pub struct PromoRepo {
    db: Database,
}

impl PromoRepo {
    pub fn new(db: &Database) -> Self {
        Self { db: db.clone() }
    }

    pub fn insert(&self, window: &PromoWindow) -> DomainResult<()> {
        if window.end_date < window.start_date {
            return Err(DomainError::business_rule(
                "promo end_date must not precede start_date",
            ));
        }
        self.db.with_tx(TxBehavior::Immediate, |conn| {
            conn.execute(
                "INSERT INTO promo_calendar (sku, start_date, end_date, store_id)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    window.sku,
                    date_to_sql(window.start_date),
                    date_to_sql(window.end_date),
                    window.store_id.clone().unwrap_or_default(),
                ],
            )?;
            Ok(())
        })
    }

    /// All windows for a SKU, oldest first.
    pub fn list_for_sku(&self, sku: &str) -> DomainResult<Vec<PromoWindow>> {
        self.db.with_conn(|conn| Self::list_for_sku_in(conn, sku))
    }

    pub(crate) fn list_for_sku_in(conn: &Connection, sku: &str) -> DomainResult<Vec<PromoWindow>> {
        let mut stmt = conn.prepare_cached(
            "SELECT sku, start_date, end_date, store_id FROM promo_calendar
             WHERE sku = ?1 ORDER BY start_date ASC, end_date ASC",
        )?;
        let mut rows = stmt.query([sku])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row_to_window(row)?);
        }
        Ok(out)
    }

    /// Windows overlapping `[from, to]`.
    pub fn list_overlapping(
        &self,
        sku: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DomainResult<Vec<PromoWindow>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT sku, start_date, end_date, store_id FROM promo_calendar
                 WHERE sku = ?1 AND start_date <= ?3 AND end_date >= ?2
                 ORDER BY start_date ASC",
            )?;
            let mut rows = stmt.query(params![sku, date_to_sql(from), date_to_sql(to)])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                out.push(row_to_window(row)?);
            }
            Ok(out)
        })
    }

}

fn row_to_window(row: &Row) -> DomainResult<PromoWindow> {
    let start_str: String = row.get(1)?;
    let end_str: String = row.get(2)?;
    let store: String = row.get(3)?;
    Ok(PromoWindow {
        sku: row.get(0)?,
        start_date: date_from_sql(&start_str)?,
        end_date: date_from_sql(&end_str)?,
        store_id: if store.is_empty() { None } else { Some(store) },
    })
}
