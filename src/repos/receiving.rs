//! Receiving-log repository.
//!
//! The document_id is the idempotency key for receipt closure: the first
//! question any closure asks is whether the document already exists. Line
//! rows carry a per-line receipt_id derived from the document id.

use rusqlite::{params, Connection, Row};

use crate::errors::{DomainError, DomainResult};
use crate::models::ReceivingLog;
use crate::repos::{date_from_sql, date_to_sql};
use crate::storage::Database;

pub struct ReceivingRepo {
    db: Database,
}

impl ReceivingRepo {
    pub fn new(db: &Database) -> Self {
        Self { db: db.clone() }
    }

    pub fn document_exists(&self, document_id: &str) -> DomainResult<bool> {
        self.db
            .with_conn(|conn| Self::document_exists_in(conn, document_id))
    }

    pub(crate) fn document_exists_in(conn: &Connection, document_id: &str) -> DomainResult<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM receiving_logs WHERE document_id = ?1",
            [document_id],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    pub(crate) fn insert_line_in(conn: &Connection, line: &ReceivingLog) -> DomainResult<()> {
        if line.qty_received <= 0 {
            return Err(DomainError::business_rule("qty_received must be > 0"));
        }
        conn.execute(
            "INSERT INTO receiving_logs
                 (document_id, receipt_id, date, sku, qty_received, receipt_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                line.document_id,
                line.receipt_id,
                date_to_sql(line.date),
                line.sku,
                line.qty_received,
                date_to_sql(line.receipt_date),
            ],
        )
        .map_err(|e| match DomainError::from(e) {
            DomainError::DuplicateKey { .. } => DomainError::DuplicateKey {
                entity: "receiving_logs".to_string(),
                key: line.document_id.clone(),
            },
            other => other,
        })?;
        Ok(())
    }

    pub fn lines_for_document(&self, document_id: &str) -> DomainResult<Vec<ReceivingLog>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT document_id, receipt_id, date, sku, qty_received, receipt_date
                 FROM receiving_logs WHERE document_id = ?1 ORDER BY receipt_id",
            )?;
            let mut rows = stmt.query([document_id])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                out.push(row_to_line(row)?);
            }
            Ok(out)
        })
    }

}

fn row_to_line(row: &Row) -> DomainResult<ReceivingLog> {
    let date_str: String = row.get(2)?;
    let receipt_str: String = row.get(5)?;
    Ok(ReceivingLog {
        document_id: row.get(0)?,
        receipt_id: row.get(1)?,
        date: date_from_sql(&date_str)?,
        sku: row.get(3)?,
        qty_received: row.get(4)?,
        receipt_date: date_from_sql(&receipt_str)?,
    })
}
