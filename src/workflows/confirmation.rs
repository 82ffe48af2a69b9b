//! Order confirmation.
//!
//! Assigns deterministic ids `ORD_YYYYMMDD_NNN` (NNN continues from the
//! orders already confirmed on that date), writes the ORDER ledger events
//! with their receipt dates, and persists the order logs with the explain
//! blob attached. Idempotency is order-id uniqueness: re-confirming the
//! same sequence on the same date collides and rolls back.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::DomainResult;
use crate::models::{OrderLog, OrderStatus, StockEvent, Transaction};
use crate::observe::run_id::generate_run_id;
use crate::repos::{AuditRepo, LedgerRepo, OrdersRepo};
use crate::storage::TxBehavior;
use crate::workflows::{Proposal, Workflows};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderConfirmation {
    pub order_id: String,
    pub sku: String,
    pub qty: i64,
    pub order_date: NaiveDate,
    pub receipt_date: NaiveDate,
    pub transaction_id: i64,
}

impl Workflows {
    /// Confirm a batch of proposals. Zero-quantity proposals are skipped;
    /// everything else lands in one transaction.
    pub fn confirm_orders(
        &self,
        proposals: &[Proposal],
    ) -> DomainResult<Vec<OrderConfirmation>> {
        let run_id = generate_run_id();
        let to_confirm: Vec<&Proposal> = proposals.iter().filter(|p| p.qty > 0).collect();
        if to_confirm.is_empty() {
            return Ok(Vec::new());
        }

        let user = self.user.clone();
        let confirmations = self.db.with_tx(TxBehavior::Immediate, |conn| {
            let mut out = Vec::with_capacity(to_confirm.len());
            AuditRepo::append_in(
                conn,
                "BATCH_START",
                &user,
                None,
                &format!("confirming {} orders", to_confirm.len()),
                Some(&run_id),
            )?;

            for proposal in &to_confirm {
                // The count includes rows inserted earlier in this same
                // transaction, so the sequence keeps advancing.
                let base = OrdersRepo::count_for_date_in(conn, proposal.order_date)?;
                let order_id = format!(
                    "ORD_{}_{:03}",
                    proposal.order_date.format("%Y%m%d"),
                    base + 1
                );

                let explain_json = serde_json::to_string(&proposal.explain).ok();
                OrdersRepo::create_log_in(
                    conn,
                    &OrderLog {
                        order_id: order_id.clone(),
                        date: proposal.order_date,
                        sku: proposal.sku.clone(),
                        qty_ordered: proposal.qty,
                        qty_received: 0,
                        status: OrderStatus::Pending,
                        receipt_date: Some(proposal.receipt_date),
                        explain: explain_json,
                    },
                )?;

                let transaction_id = LedgerRepo::append_in(
                    conn,
                    &Transaction::new(
                        proposal.order_date,
                        proposal.sku.clone(),
                        StockEvent::Order,
                        proposal.qty,
                    )
                    .with_receipt_date(proposal.receipt_date)
                    .with_note(order_id.clone()),
                )?;

                AuditRepo::append_in(
                    conn,
                    "ORDER_CONFIRMED",
                    &user,
                    Some(&proposal.sku),
                    &format!(
                        "{}: qty {} for {} via {}",
                        order_id, proposal.qty, proposal.receipt_date, proposal.lane
                    ),
                    Some(&run_id),
                )?;

                out.push(OrderConfirmation {
                    order_id,
                    sku: proposal.sku.clone(),
                    qty: proposal.qty,
                    order_date: proposal.order_date,
                    receipt_date: proposal.receipt_date,
                    transaction_id,
                });
            }

            AuditRepo::append_in(
                conn,
                "BATCH_END",
                &user,
                None,
                &format!("confirmed {} orders", out.len()),
                Some(&run_id),
            )?;
            Ok(out)
        })?;

        info!(run_id = %run_id, count = confirmations.len(), "orders confirmed");
        Ok(confirmations)
    }
}
