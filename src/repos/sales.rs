//! Sales repository.

use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

use crate::errors::{DomainError, DomainResult};
use crate::models::SalesRecord;
use crate::repos::{date_from_sql, date_to_sql};
use crate::storage::{Database, TxBehavior};

pub struct SalesRepo {
    db: Database,
}

impl SalesRepo {
    pub fn new(db: &Database) -> Self {
        Self { db: db.clone() }
    }

    /// Upsert by (date, sku).
    pub fn upsert(&self, record: &SalesRecord) -> DomainResult<()> {
        self.db
            .with_tx(TxBehavior::Immediate, |conn| Self::upsert_in(conn, record))
    }

    pub(crate) fn upsert_in(conn: &Connection, record: &SalesRecord) -> DomainResult<()> {
        if record.qty_sold < 0 {
            return Err(DomainError::business_rule("qty_sold must be >= 0"));
        }
        conn.execute(
            "INSERT INTO sales (date, sku, qty_sold, promo_flag)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(date, sku) DO UPDATE SET
                 qty_sold = excluded.qty_sold,
                 promo_flag = excluded.promo_flag",
            params![
                date_to_sql(record.date),
                record.sku,
                record.qty_sold,
                record.promo_flag as i64,
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, date: NaiveDate, sku: &str) -> DomainResult<Option<SalesRecord>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT date, sku, qty_sold, promo_flag FROM sales
                 WHERE date = ?1 AND sku = ?2",
            )?;
            let mut rows = stmt.query(params![date_to_sql(date), sku])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_sale(row)?)),
                None => Ok(None),
            }
        })
    }

    /// Sales for one SKU in `[from, to)`, date ascending.
    pub fn list_range(
        &self,
        sku: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DomainResult<Vec<SalesRecord>> {
        self.db
            .with_conn(|conn| Self::list_range_in(conn, sku, from, to))
    }

    pub(crate) fn list_range_in(
        conn: &Connection,
        sku: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DomainResult<Vec<SalesRecord>> {
        let mut stmt = conn.prepare_cached(
            "SELECT date, sku, qty_sold, promo_flag FROM sales
             WHERE sku = ?1 AND date >= ?2 AND date < ?3
             ORDER BY date ASC",
        )?;
        let mut rows = stmt.query(params![sku, date_to_sql(from), date_to_sql(to)])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row_to_sale(row)?);
        }
        Ok(out)
    }

}

fn row_to_sale(row: &Row) -> DomainResult<SalesRecord> {
    let date_str: String = row.get(0)?;
    Ok(SalesRecord {
        date: date_from_sql(&date_str)?,
        sku: row.get(1)?,
        qty_sold: row.get(2)?,
        promo_flag: row.get::<_, i64>(3)? != 0,
    })
}
