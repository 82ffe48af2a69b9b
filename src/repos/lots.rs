//! Lot repository.
//!
//! FEFO order everywhere: ascending expiry date with NULL expiries last,
//! lot_id as the tie-breaker. Consumption happens through the stock module
//! inside the caller's transaction.

use rusqlite::{params, Connection, Row};

use crate::errors::{DomainError, DomainResult};
use crate::models::Lot;
use crate::repos::{date_to_sql, opt_date_from_sql};
use crate::storage::{Database, TxBehavior};

pub struct LotsRepo {
    db: Database,
}

impl LotsRepo {
    pub fn new(db: &Database) -> Self {
        Self { db: db.clone() }
    }

    pub fn insert(&self, lot: &Lot) -> DomainResult<()> {
        self.db
            .with_tx(TxBehavior::Immediate, |conn| Self::insert_in(conn, lot))
    }

    pub(crate) fn insert_in(conn: &Connection, lot: &Lot) -> DomainResult<()> {
        if lot.qty_on_hand < 0 {
            return Err(DomainError::business_rule("lot qty_on_hand must be >= 0"));
        }
        conn.execute(
            "INSERT INTO lots (lot_id, sku, qty_on_hand, expiry_date, receipt_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                lot.lot_id,
                lot.sku,
                lot.qty_on_hand,
                lot.expiry_date.map(date_to_sql),
                lot.receipt_id,
            ],
        )
        .map_err(|e| match DomainError::from(e) {
            DomainError::DuplicateKey { .. } => DomainError::DuplicateKey {
                entity: "lots".to_string(),
                key: lot.lot_id.clone(),
            },
            other => other,
        })?;
        Ok(())
    }

    /// Lots for a SKU in FEFO order, empty lots excluded.
    pub fn list_fefo(&self, sku: &str) -> DomainResult<Vec<Lot>> {
        self.db.with_conn(|conn| Self::list_fefo_in(conn, sku))
    }

    pub(crate) fn list_fefo_in(conn: &Connection, sku: &str) -> DomainResult<Vec<Lot>> {
        let mut stmt = conn.prepare_cached(
            "SELECT lot_id, sku, qty_on_hand, expiry_date, receipt_id
             FROM lots
             WHERE sku = ?1 AND qty_on_hand > 0
             ORDER BY expiry_date IS NULL, expiry_date ASC, lot_id ASC",
        )?;
        let mut rows = stmt.query([sku])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row_to_lot(row)?);
        }
        Ok(out)
    }

    pub(crate) fn set_qty_in(conn: &Connection, lot_id: &str, qty: i64) -> DomainResult<()> {
        if qty < 0 {
            return Err(DomainError::business_rule("lot qty_on_hand must be >= 0"));
        }
        let changed = conn.execute(
            "UPDATE lots SET qty_on_hand = ?1 WHERE lot_id = ?2",
            params![qty, lot_id],
        )?;
        if changed == 0 {
            return Err(DomainError::not_found("lot", lot_id));
        }
        Ok(())
    }

    /// Consume `qty` units in FEFO order inside the caller's transaction.
    /// Returns the quantity that could not be covered by lots (zero when
    /// lots fully cover the draw).
    pub(crate) fn consume_fefo_in(conn: &Connection, sku: &str, qty: i64) -> DomainResult<i64> {
        let mut remaining = qty.max(0);
        for lot in Self::list_fefo_in(conn, sku)? {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(lot.qty_on_hand);
            Self::set_qty_in(conn, &lot.lot_id, lot.qty_on_hand - take)?;
            remaining -= take;
        }
        Ok(remaining)
    }
}

fn row_to_lot(row: &Row) -> DomainResult<Lot> {
    let expiry_str: Option<String> = row.get(3)?;
    Ok(Lot {
        lot_id: row.get(0)?,
        sku: row.get(1)?,
        qty_on_hand: row.get(2)?,
        expiry_date: opt_date_from_sql(expiry_str)?,
        receipt_id: row.get(4)?,
    })
}
