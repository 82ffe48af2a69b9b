//! Receipt closure.
//!
//! Idempotent by document id. One IMMEDIATE transaction runs four steps
//! and rolls back entirely on any failure:
//!
//! 1. replay guard: a known document returns "already_processed",
//! 2. receiving-log lines,
//! 3. allocation to order logs (FIFO by order date when no explicit
//!    order ids are given) plus the order/document junction rows,
//! 4. RECEIPT ledger events dated at the receipt date, lots for
//!    perishables, and optional UNFULFILLED shortfall tracking.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{DomainError, DomainResult};
use crate::models::{Lot, ReceivingLog, StockEvent, Transaction};
use crate::observe::run_id::generate_run_id;
use crate::repos::{AuditRepo, LedgerRepo, LotsRepo, OrdersRepo, ReceivingRepo, SkuRepo};
use crate::storage::TxBehavior;
use crate::workflows::Workflows;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptItem {
    pub sku: String,
    pub qty_received: i64,
    /// Explicit allocation targets; empty means FIFO over open orders.
    pub order_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptClose {
    pub document_id: String,
    pub receipt_date: NaiveDate,
    pub items: Vec<ReceiptItem>,
    /// When true, an order left short by its explicit allocation gets an
    /// UNFULFILLED tracking event for the shortfall.
    pub mark_shortfall_unfulfilled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptCloseResult {
    pub document_id: String,
    pub status: String,
    /// (order_id, quantity allocated against it).
    pub allocations: Vec<(String, i64)>,
}

impl Workflows {
    pub fn close_receipt(&self, input: &ReceiptClose) -> DomainResult<ReceiptCloseResult> {
        if input.items.is_empty() {
            return Err(DomainError::business_rule("receipt has no items"));
        }
        for item in &input.items {
            if item.qty_received <= 0 {
                return Err(DomainError::business_rule("qty_received must be > 0"));
            }
        }

        let run_id = generate_run_id();
        let user = self.user.clone();
        let result = self.db.with_tx(TxBehavior::Immediate, |conn| {
            // 1. Idempotency guard.
            if ReceivingRepo::document_exists_in(conn, &input.document_id)? {
                return Ok(ReceiptCloseResult {
                    document_id: input.document_id.clone(),
                    status: "already_processed".to_string(),
                    allocations: Vec::new(),
                });
            }

            let mut allocations: Vec<(String, i64)> = Vec::new();

            for (line_no, item) in input.items.iter().enumerate() {
                let receipt_id = format!("{}#{}", input.document_id, line_no + 1);

                // 2. Receiving-log line.
                ReceivingRepo::insert_line_in(
                    conn,
                    &ReceivingLog {
                        document_id: input.document_id.clone(),
                        receipt_id: receipt_id.clone(),
                        date: input.receipt_date,
                        sku: item.sku.clone(),
                        qty_received: item.qty_received,
                        receipt_date: input.receipt_date,
                    },
                )?;

                // 3. Allocation: explicit targets or FIFO over open orders.
                let targets: Vec<String> = if item.order_ids.is_empty() {
                    OrdersRepo::list_open_fifo_in(conn, &item.sku)?
                        .into_iter()
                        .map(|o| o.order_id)
                        .collect()
                } else {
                    item.order_ids.clone()
                };

                let mut remaining = item.qty_received;
                for order_id in &targets {
                    if remaining == 0 {
                        break;
                    }
                    let order = OrdersRepo::get_in(conn, order_id)?
                        .ok_or_else(|| DomainError::not_found("order", order_id))?;
                    if order.sku != item.sku {
                        return Err(DomainError::business_rule(format!(
                            "order {} is for {}, not {}",
                            order_id, order.sku, item.sku
                        )));
                    }
                    let capacity = order.qty_ordered - order.qty_received;
                    let take = remaining.min(capacity.max(0));
                    if take == 0 {
                        continue;
                    }
                    OrdersRepo::update_qty_received_in(
                        conn,
                        order_id,
                        order.qty_received + take,
                    )?;
                    OrdersRepo::link_document_in(conn, order_id, &input.document_id)?;
                    allocations.push((order_id.clone(), take));
                    remaining -= take;
                }

                // Shortfall tracking for explicitly-targeted orders.
                if input.mark_shortfall_unfulfilled {
                    for order_id in &item.order_ids {
                        if let Some(order) = OrdersRepo::get_in(conn, order_id)? {
                            let shortfall = order.qty_ordered - order.qty_received;
                            if shortfall > 0 {
                                LedgerRepo::append_in(
                                    conn,
                                    &Transaction::new(
                                        input.receipt_date,
                                        order.sku.clone(),
                                        StockEvent::Unfulfilled,
                                        shortfall,
                                    )
                                    .with_note(format!("short on {}", order_id)),
                                )?;
                            }
                        }
                    }
                }

                // 4. RECEIPT event, dated at the actual receipt date so
                // as-of replays stay historically correct.
                LedgerRepo::append_in(
                    conn,
                    &Transaction::new(
                        input.receipt_date,
                        item.sku.clone(),
                        StockEvent::Receipt,
                        item.qty_received,
                    )
                    .with_receipt_date(input.receipt_date)
                    .with_note(input.document_id.clone()),
                )?;

                // Perishables grow a lot with expiry from the shelf life.
                if let Some(sku) = SkuRepo::get_in(conn, &item.sku)? {
                    if sku.is_perishable() {
                        LotsRepo::insert_in(
                            conn,
                            &Lot {
                                lot_id: receipt_id.clone(),
                                sku: item.sku.clone(),
                                qty_on_hand: item.qty_received,
                                expiry_date: Some(
                                    input.receipt_date + Duration::days(sku.shelf_life_days),
                                ),
                                receipt_id: Some(receipt_id.clone()),
                            },
                        )?;
                    }
                }
            }

            AuditRepo::append_in(
                conn,
                "RECEIPT_CLOSED",
                &user,
                None,
                &format!(
                    "{}: {} items, {} allocations",
                    input.document_id,
                    input.items.len(),
                    allocations.len()
                ),
                Some(&run_id),
            )?;

            Ok(ReceiptCloseResult {
                document_id: input.document_id.clone(),
                status: "closed".to_string(),
                allocations,
            })
        })?;

        info!(
            document_id = %input.document_id,
            status = %result.status,
            "receipt closure finished"
        );
        Ok(result)
    }
}
