//! Outstanding-order pipeline.
//!
//! `on_order_by_date` reduces the ORDER/RECEIPT history to the quantities
//! still expected, keyed by receipt date. Receipts are matched FIFO against
//! prior orders sharing the same receipt date; a SNAPSHOT resets the
//! pipeline the same way it resets on-order.

use std::collections::BTreeMap;
use std::collections::VecDeque;

use chrono::NaiveDate;

use crate::models::{StockEvent, Transaction};

/// Pipeline of outstanding orders not yet matched by receipts, keyed by
/// receipt date. `rows` must be limited to one SKU, dated strictly before
/// the as-of date, and in deterministic replay order.
pub fn on_order_by_date(rows: &[Transaction]) -> BTreeMap<NaiveDate, i64> {
    // Open order quantities per receipt date, FIFO within a date.
    let mut open: BTreeMap<NaiveDate, VecDeque<i64>> = BTreeMap::new();

    for tx in rows {
        match tx.event {
            StockEvent::Snapshot => {
                // SNAPSHOT anchors on_order to zero; outstanding orders
                // before the anchor no longer exist.
                open.clear();
            }
            StockEvent::Order => {
                if let Some(rd) = tx.receipt_date {
                    open.entry(rd).or_default().push_back(tx.qty);
                }
            }
            StockEvent::Receipt => {
                let Some(rd) = tx.receipt_date else { continue };
                let Some(queue) = open.get_mut(&rd) else { continue };
                let mut remaining = tx.qty;
                while remaining > 0 {
                    match queue.front_mut() {
                        Some(front) => {
                            let take = remaining.min(*front);
                            *front -= take;
                            remaining -= take;
                            if *front == 0 {
                                queue.pop_front();
                            }
                        }
                        None => break,
                    }
                }
                if queue.is_empty() {
                    open.remove(&rd);
                }
            }
            _ => {}
        }
    }

    open.into_iter()
        .map(|(date, queue)| (date, queue.iter().sum::<i64>()))
        .filter(|(_, qty)| *qty > 0)
        .collect()
}

/// Inventory position: usable on-hand plus pipeline entries with
/// receipt_date <= `pipeline_cutoff`, minus unfulfilled demand.
pub fn inventory_position(
    usable_on_hand: i64,
    pipeline: &BTreeMap<NaiveDate, i64>,
    unfulfilled: i64,
    pipeline_cutoff: NaiveDate,
) -> i64 {
    let incoming: i64 = pipeline
        .iter()
        .filter(|(date, _)| **date <= pipeline_cutoff)
        .map(|(_, qty)| *qty)
        .sum();
    usable_on_hand + incoming - unfulfilled
}

/// Merge extra pipeline entries (e.g. a Saturday-lane proposal that the
/// Monday-lane computation must see) into a pipeline map.
pub fn merge_pipeline_extra(
    pipeline: &BTreeMap<NaiveDate, i64>,
    extra: &[(NaiveDate, i64)],
) -> BTreeMap<NaiveDate, i64> {
    let mut merged = pipeline.clone();
    for (date, qty) in extra {
        if *qty > 0 {
            *merged.entry(*date).or_insert(0) += qty;
        }
    }
    merged
}
