//! Order-log repository.
//!
//! `status` is derived from the received quantity on every update; the
//! check constraint rejects over-receiving at the store level and the
//! repository rejects it first with a clearer message.

use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

use crate::errors::{DomainError, DomainResult};
use crate::models::{OrderLog, OrderStatus};
use crate::repos::{date_from_sql, date_to_sql, opt_date_from_sql};
use crate::storage::{Database, TxBehavior};

pub struct OrdersRepo {
    db: Database,
}

impl OrdersRepo {
    pub fn new(db: &Database) -> Self {
        Self { db: db.clone() }
    }

    /// Create a log row; duplicate order_id is a DuplicateKey error.
    pub fn create_log(&self, log: &OrderLog) -> DomainResult<()> {
        self.db
            .with_tx(TxBehavior::Immediate, |conn| Self::create_log_in(conn, log))
    }

    pub(crate) fn create_log_in(conn: &Connection, log: &OrderLog) -> DomainResult<()> {
        if log.qty_ordered <= 0 {
            return Err(DomainError::business_rule("qty_ordered must be > 0"));
        }
        let status = OrderStatus::derive(log.qty_ordered, log.qty_received);
        conn.execute(
            "INSERT INTO order_logs
                 (order_id, date, sku, qty_ordered, qty_received, status, receipt_date, explain)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                log.order_id,
                date_to_sql(log.date),
                log.sku,
                log.qty_ordered,
                log.qty_received,
                status.as_str(),
                log.receipt_date.map(date_to_sql),
                log.explain,
            ],
        )
        .map_err(|e| match DomainError::from(e) {
            DomainError::DuplicateKey { .. } => DomainError::DuplicateKey {
                entity: "order_logs".to_string(),
                key: log.order_id.clone(),
            },
            other => other,
        })?;
        Ok(())
    }

    pub fn get(&self, order_id: &str) -> DomainResult<Option<OrderLog>> {
        self.db.with_conn(|conn| Self::get_in(conn, order_id))
    }

    pub(crate) fn get_in(conn: &Connection, order_id: &str) -> DomainResult<Option<OrderLog>> {
        let mut stmt = conn.prepare_cached(
            "SELECT order_id, date, sku, qty_ordered, qty_received, status, receipt_date, explain
             FROM order_logs WHERE order_id = ?1",
        )?;
        let mut rows = stmt.query([order_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_log(row)?)),
            None => Ok(None),
        }
    }

    /// Orders still awaiting stock for a SKU, FIFO by order date then id.
    pub fn list_open_fifo(&self, sku: &str) -> DomainResult<Vec<OrderLog>> {
        self.db.with_conn(|conn| Self::list_open_fifo_in(conn, sku))
    }

    pub(crate) fn list_open_fifo_in(conn: &Connection, sku: &str) -> DomainResult<Vec<OrderLog>> {
        let mut stmt = conn.prepare_cached(
            "SELECT order_id, date, sku, qty_ordered, qty_received, status, receipt_date, explain
             FROM order_logs
             WHERE sku = ?1 AND status IN ('PENDING', 'PARTIAL')
             ORDER BY date ASC, order_id ASC",
        )?;
        let mut rows = stmt.query([sku])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row_to_log(row)?);
        }
        Ok(out)
    }

    /// Set the cumulative received quantity; status is re-derived. Receiving
    /// more than ordered is a business-rule breach.
    pub fn update_qty_received(&self, order_id: &str, qty_received: i64) -> DomainResult<()> {
        self.db.with_tx(TxBehavior::Immediate, |conn| {
            Self::update_qty_received_in(conn, order_id, qty_received)
        })
    }

    pub(crate) fn update_qty_received_in(
        conn: &Connection,
        order_id: &str,
        qty_received: i64,
    ) -> DomainResult<()> {
        let log = Self::get_in(conn, order_id)?
            .ok_or_else(|| DomainError::not_found("order", order_id))?;
        if qty_received < 0 || qty_received > log.qty_ordered {
            return Err(DomainError::business_rule(format!(
                "qty_received {} out of range for order {} (ordered {})",
                qty_received, order_id, log.qty_ordered
            )));
        }
        let status = OrderStatus::derive(log.qty_ordered, qty_received);
        conn.execute(
            "UPDATE order_logs SET qty_received = ?1, status = ?2 WHERE order_id = ?3",
            params![qty_received, status.as_str(), order_id],
        )?;
        Ok(())
    }

    /// Number of confirmed orders on a date; the confirmation workflow uses
    /// it to derive the next deterministic sequence index.
    pub(crate) fn count_for_date_in(conn: &Connection, date: NaiveDate) -> DomainResult<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM order_logs WHERE date = ?1",
            [date_to_sql(date)],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    /// Junction rows: receiving documents that closed against an order.
    pub fn documents_for_order(&self, order_id: &str) -> DomainResult<Vec<String>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT document_id FROM order_receipts WHERE order_id = ?1 ORDER BY document_id",
            )?;
            let mut rows = stmt.query([order_id])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                out.push(row.get::<_, String>(0)?);
            }
            Ok(out)
        })
    }

    pub(crate) fn link_document_in(
        conn: &Connection,
        order_id: &str,
        document_id: &str,
    ) -> DomainResult<()> {
        conn.execute(
            "INSERT OR IGNORE INTO order_receipts (order_id, document_id) VALUES (?1, ?2)",
            params![order_id, document_id],
        )?;
        Ok(())
    }
}

fn row_to_log(row: &Row) -> DomainResult<OrderLog> {
    let date_str: String = row.get(1)?;
    let status_str: String = row.get(5)?;
    let receipt_str: Option<String> = row.get(6)?;
    Ok(OrderLog {
        order_id: row.get(0)?,
        date: date_from_sql(&date_str)?,
        sku: row.get(2)?,
        qty_ordered: row.get(3)?,
        qty_received: row.get(4)?,
        status: OrderStatus::parse(&status_str)
            .ok_or_else(|| DomainError::business_rule(format!("bad status: {}", status_str)))?,
        receipt_date: opt_date_from_sql(receipt_str)?,
        explain: row.get(7)?,
    })
}
