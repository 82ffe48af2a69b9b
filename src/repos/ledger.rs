//! Ledger repository.
//!
//! The transactions table is append-only. `delete_by_id` is the single
//! sanctioned mutation and exists only so exception rows can be reverted;
//! workflows pair every such delete with an audit entry.

use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

use crate::errors::{DomainError, DomainResult};
use crate::models::{StockEvent, Transaction};
use crate::repos::{date_to_sql, opt_date_from_sql};
use crate::storage::{Database, TxBehavior};

/// SQL fragment computing the same-date replay priority of an event.
/// Must agree with `StockEvent::priority`.
pub(crate) const EVENT_PRIORITY_SQL: &str = "CASE event
        WHEN 'SNAPSHOT' THEN 0
        WHEN 'RECEIPT' THEN 1
        WHEN 'ORDER' THEN 1
        WHEN 'SALE' THEN 2
        WHEN 'WASTE' THEN 2
        WHEN 'ADJUST' THEN 2
        ELSE 3
    END";

pub struct LedgerRepo {
    db: Database,
}

impl LedgerRepo {
    pub fn new(db: &Database) -> Self {
        Self { db: db.clone() }
    }

    /// Append one transaction; returns the assigned id.
    pub fn append(&self, tx: &Transaction) -> DomainResult<i64> {
        self.db
            .with_tx(TxBehavior::Immediate, |conn| Self::append_in(conn, tx))
    }

    pub(crate) fn append_in(conn: &Connection, tx: &Transaction) -> DomainResult<i64> {
        validate_tx(tx)?;
        conn.execute(
            "INSERT INTO transactions (date, sku, event, qty, receipt_date, note)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                date_to_sql(tx.date),
                tx.sku,
                tx.event.as_str(),
                tx.qty,
                tx.receipt_date.map(date_to_sql),
                tx.note,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// All-or-nothing batch append under IMMEDIATE isolation.
    pub fn append_batch(&self, txs: &[Transaction]) -> DomainResult<Vec<i64>> {
        self.db.with_tx(TxBehavior::Immediate, |conn| {
            let mut ids = Vec::with_capacity(txs.len());
            for tx in txs {
                ids.push(Self::append_in(conn, tx)?);
            }
            Ok(ids)
        })
    }

    /// The only sanctioned mutation; used exclusively to revert exception
    /// rows. Returns true when a row was removed.
    pub fn delete_by_id(&self, transaction_id: i64) -> DomainResult<bool> {
        self.db.with_tx(TxBehavior::Immediate, |conn| {
            Self::delete_by_id_in(conn, transaction_id)
        })
    }

    pub(crate) fn delete_by_id_in(conn: &Connection, transaction_id: i64) -> DomainResult<bool> {
        let changed = conn.execute(
            "DELETE FROM transactions WHERE transaction_id = ?1",
            [transaction_id],
        )?;
        Ok(changed > 0)
    }

    /// Transactions for one SKU with date strictly before `before`, in
    /// deterministic replay order (date asc, priority asc, id asc).
    pub fn replay_rows(&self, sku: &str, before: NaiveDate) -> DomainResult<Vec<Transaction>> {
        self.db
            .with_conn(|conn| Self::replay_rows_in(conn, sku, before))
    }

    pub(crate) fn replay_rows_in(
        conn: &Connection,
        sku: &str,
        before: NaiveDate,
    ) -> DomainResult<Vec<Transaction>> {
        let sql = format!(
            "SELECT transaction_id, date, sku, event, qty, receipt_date, note
             FROM transactions
             WHERE sku = ?1 AND date < ?2
             ORDER BY date ASC, {} ASC, transaction_id ASC",
            EVENT_PRIORITY_SQL
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let mut rows = stmt.query(params![sku, date_to_sql(before)])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row_to_tx(row)?);
        }
        Ok(out)
    }

    /// Rows matching the exception natural key (date, sku, event).
    pub fn find_by_natural_key(
        &self,
        date: NaiveDate,
        sku: &str,
        event: StockEvent,
    ) -> DomainResult<Vec<Transaction>> {
        self.db.with_conn(|conn| {
            Self::find_by_natural_key_in(conn, date, sku, event)
        })
    }

    pub(crate) fn find_by_natural_key_in(
        conn: &Connection,
        date: NaiveDate,
        sku: &str,
        event: StockEvent,
    ) -> DomainResult<Vec<Transaction>> {
        let mut stmt = conn.prepare_cached(
            "SELECT transaction_id, date, sku, event, qty, receipt_date, note
             FROM transactions
             WHERE date = ?1 AND sku = ?2 AND event = ?3
             ORDER BY transaction_id",
        )?;
        let mut rows = stmt.query(params![date_to_sql(date), sku, event.as_str()])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row_to_tx(row)?);
        }
        Ok(out)
    }
}

fn validate_tx(tx: &Transaction) -> DomainResult<()> {
    match tx.event {
        StockEvent::Adjust => {} // signed absolute set
        _ => {
            if tx.qty < 0 {
                return Err(DomainError::business_rule(format!(
                    "{} qty must be >= 0",
                    tx.event
                )));
            }
        }
    }
    if matches!(tx.event, StockEvent::Order) && tx.receipt_date.is_none() {
        return Err(DomainError::business_rule(
            "ORDER transactions require a receipt_date",
        ));
    }
    Ok(())
}

fn row_to_tx(row: &Row) -> DomainResult<Transaction> {
    let date_str: String = row.get(1)?;
    let event_str: String = row.get(3)?;
    let receipt_str: Option<String> = row.get(5)?;
    Ok(Transaction {
        transaction_id: row.get(0)?,
        date: crate::repos::date_from_sql(&date_str)?,
        sku: row.get(2)?,
        event: StockEvent::parse(&event_str)?,
        qty: row.get(4)?,
        receipt_date: opt_date_from_sql(receipt_str)?,
        note: row.get(6)?,
    })
}
