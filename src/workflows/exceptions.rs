//! Exception events: WASTE, ADJUST, UNFULFILLED.
//!
//! Recording is idempotent by the natural key (date, sku, event); a repeat
//! call reports `already_recorded` instead of failing. Reverting a day is
//! the single sanctioned ledger mutation and always leaves an audit trail.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{DomainError, DomainResult};
use crate::models::{StockEvent, Transaction};
use crate::repos::{AuditRepo, LedgerRepo, LotsRepo, SkuRepo};
use crate::storage::TxBehavior;
use crate::workflows::Workflows;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionResult {
    pub transaction_id: i64,
    pub already_recorded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevertResult {
    pub deleted_rows: usize,
}

fn ensure_exception_event(event: StockEvent) -> DomainResult<()> {
    match event {
        StockEvent::Waste | StockEvent::Adjust | StockEvent::Unfulfilled => Ok(()),
        other => Err(DomainError::business_rule(format!(
            "{} is not an exception event",
            other
        ))),
    }
}

impl Workflows {
    /// Record an exception. The second call with the same (date, sku,
    /// event) returns the existing row with `already_recorded = true`.
    pub fn record_exception(
        &self,
        event: StockEvent,
        sku: &str,
        qty: i64,
        date: NaiveDate,
        note: Option<&str>,
    ) -> DomainResult<ExceptionResult> {
        ensure_exception_event(event)?;
        if event != StockEvent::Adjust && qty < 0 {
            return Err(DomainError::business_rule("exception qty must be >= 0"));
        }

        let user = self.user.clone();
        let note = note.map(|n| n.to_string());
        self.db.with_tx(TxBehavior::Immediate, |conn| {
            if SkuRepo::get_in(conn, sku)?.is_none() {
                return Err(DomainError::not_found("sku", sku));
            }

            if let Some(existing) =
                LedgerRepo::find_by_natural_key_in(conn, date, sku, event)?.first()
            {
                return Ok(ExceptionResult {
                    transaction_id: existing.transaction_id,
                    already_recorded: true,
                });
            }

            let mut tx = Transaction::new(date, sku, event, qty);
            if let Some(n) = &note {
                tx = tx.with_note(n.clone());
            }
            let transaction_id = LedgerRepo::append_in(conn, &tx)?;

            // Waste leaves the shelf in FEFO order.
            if event == StockEvent::Waste {
                if let Some(sku_row) = SkuRepo::get_in(conn, sku)? {
                    if sku_row.is_perishable() {
                        LotsRepo::consume_fefo_in(conn, sku, qty)?;
                    }
                }
            }

            AuditRepo::append_in(
                conn,
                "EXCEPTION_RECORDED",
                &user,
                Some(sku),
                &format!("{} qty {} on {}", event, qty, date),
                None,
            )?;
            Ok(ExceptionResult {
                transaction_id,
                already_recorded: false,
            })
        })
    }

    /// Delete every ledger row matching (date, sku, event).
    pub fn revert_exception_day(
        &self,
        date: NaiveDate,
        sku: &str,
        event: StockEvent,
    ) -> DomainResult<RevertResult> {
        ensure_exception_event(event)?;

        let user = self.user.clone();
        let result = self.db.with_tx(TxBehavior::Immediate, |conn| {
            let rows = LedgerRepo::find_by_natural_key_in(conn, date, sku, event)?;
            let mut deleted = 0usize;
            for row in &rows {
                if LedgerRepo::delete_by_id_in(conn, row.transaction_id)? {
                    deleted += 1;
                }
            }
            if deleted > 0 {
                AuditRepo::append_in(
                    conn,
                    "EXCEPTION_REVERTED",
                    &user,
                    Some(sku),
                    &format!("{} rows of {} on {}", deleted, event, date),
                    None,
                )?;
            }
            Ok(RevertResult {
                deleted_rows: deleted,
            })
        })?;

        info!(sku, %event, deleted = result.deleted_rows, "exception day reverted");
        Ok(result)
    }
}
