//! End-of-day stock reconciliation.
//!
//! Input: declared on-hand per SKU. For each SKU the theoretical end of
//! day is the as-of view at eod_date+1 *before* that day's derived rows
//! (the SALE/ADJUST rows a previous reconciliation of the same day may
//! have written are excluded and replaced, which makes the workflow safe
//! to re-run with corrected counts). Sales are derived as
//! theoretical - declared, persisted both as a SalesRecord and a SALE
//! ledger event, with lots consumed FEFO; any residual delta becomes an
//! ADJUST carrying the declared quantity as an absolute set.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{DomainError, DomainResult};
use crate::models::{Lot, SalesRecord, StockEvent, Transaction};
use crate::observe::run_id::generate_run_id;
use crate::repos::{AuditRepo, LedgerRepo, LotsRepo, SalesRepo, SkuRepo};
use crate::stock::calculator::stock_asof_rows;
use crate::storage::TxBehavior;
use crate::workflows::Workflows;

/// Marker distinguishing reconciliation-derived ledger rows from manually
/// recorded exceptions.
const EOD_NOTE: &str = "eod_reconciliation";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EodLine {
    pub sku: String,
    pub theoretical: i64,
    pub declared: i64,
    pub qty_sold: i64,
    pub adjusted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EodResult {
    pub run_id: String,
    pub eod_date: NaiveDate,
    pub lines: Vec<EodLine>,
}

impl Workflows {
    pub fn reconcile_eod(
        &self,
        eod_date: NaiveDate,
        declared: &[(String, i64)],
    ) -> DomainResult<EodResult> {
        let run_id = generate_run_id();
        let user = self.user.clone();

        let lines = self.db.with_tx(TxBehavior::Immediate, |conn| {
            let mut lines = Vec::with_capacity(declared.len());
            AuditRepo::append_in(
                conn,
                "BATCH_START",
                &user,
                None,
                &format!("eod reconciliation for {}", eod_date),
                Some(&run_id),
            )?;

            for (sku_code, declared_on_hand) in declared {
                let sku = SkuRepo::get_in(conn, sku_code)?
                    .ok_or_else(|| DomainError::not_found("sku", sku_code))?;
                if *declared_on_hand < 0 {
                    return Err(DomainError::business_rule(
                        "declared on-hand must be >= 0",
                    ));
                }

                // Drop derived rows from a previous run of this same day.
                let next_day = eod_date.succ_opt().expect("date overflow");
                for event in [StockEvent::Sale, StockEvent::Adjust] {
                    for row in
                        LedgerRepo::find_by_natural_key_in(conn, eod_date, sku_code, event)?
                    {
                        if row.note.as_deref() == Some(EOD_NOTE) {
                            LedgerRepo::delete_by_id_in(conn, row.transaction_id)?;
                        }
                    }
                }

                let rows = LedgerRepo::replay_rows_in(conn, sku_code, next_day)?;
                let theoretical = stock_asof_rows(&rows, next_day).on_hand;

                let qty_sold = (theoretical - declared_on_hand).max(0);
                SalesRepo::upsert_in(
                    conn,
                    &SalesRecord {
                        date: eod_date,
                        sku: sku_code.clone(),
                        qty_sold,
                        promo_flag: false,
                    },
                )?;
                if qty_sold > 0 {
                    LedgerRepo::append_in(
                        conn,
                        &Transaction::new(eod_date, sku_code.clone(), StockEvent::Sale, qty_sold)
                            .with_note(EOD_NOTE),
                    )?;
                    if sku.is_perishable() {
                        LotsRepo::consume_fefo_in(conn, sku_code, qty_sold)?;
                    }
                }

                // Residual delta after the computed sales: absolute ADJUST.
                let after_sales = theoretical - qty_sold;
                let adjusted = after_sales != *declared_on_hand;
                if adjusted {
                    LedgerRepo::append_in(
                        conn,
                        &Transaction::new(
                            eod_date,
                            sku_code.clone(),
                            StockEvent::Adjust,
                            *declared_on_hand,
                        )
                        .with_note(EOD_NOTE),
                    )?;
                }
                // The lot book always lands on the declared total, so a
                // re-run with corrected counts cannot leave lot drift.
                if sku.is_perishable() {
                    reconcile_lots_to(conn, &sku, *declared_on_hand, eod_date)?;
                }

                lines.push(EodLine {
                    sku: sku_code.clone(),
                    theoretical,
                    declared: *declared_on_hand,
                    qty_sold,
                    adjusted,
                });
            }

            AuditRepo::append_in(
                conn,
                "BATCH_END",
                &user,
                None,
                &format!("eod reconciliation for {}: {} SKUs", eod_date, lines.len()),
                Some(&run_id),
            )?;
            Ok(lines)
        })?;

        info!(run_id = %run_id, skus = lines.len(), "eod reconciliation complete");
        Ok(EodResult {
            run_id,
            eod_date,
            lines,
        })
    }
}

/// Force the lot book total to the declared quantity: shrink FEFO-first,
/// grow with a reconciliation lot expiring a full shelf life out.
fn reconcile_lots_to(
    conn: &rusqlite::Connection,
    sku: &crate::models::Sku,
    declared: i64,
    eod_date: NaiveDate,
) -> DomainResult<()> {
    let total: i64 = LotsRepo::list_fefo_in(conn, &sku.sku)?
        .iter()
        .map(|l| l.qty_on_hand)
        .sum();
    if total > declared {
        LotsRepo::consume_fefo_in(conn, &sku.sku, total - declared)?;
    } else if total < declared {
        LotsRepo::insert_in(
            conn,
            &Lot {
                lot_id: format!("eod-{}-{}", eod_date.format("%Y%m%d"), sku.sku),
                sku: sku.sku.clone(),
                qty_on_hand: declared - total,
                expiry_date: Some(eod_date + chrono::Duration::days(sku.shelf_life_days)),
                receipt_id: None,
            },
        )?;
    }
    Ok(())
}
