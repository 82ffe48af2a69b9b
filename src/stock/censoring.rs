//! Censored-day detection.
//!
//! A day is censored (excluded from forecast training) when the shelf was
//! empty and nothing sold, or when unfulfilled demand was recorded within a
//! lookback window ending at that day. Replaying a stockout as "demand was
//! zero" would bias every downstream forecast low.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate};

use crate::models::{SalesRecord, StockEvent, Transaction};
use crate::stock::calculator::on_hand_series;

pub const DEFAULT_CENSOR_LOOKBACK_DAYS: i64 = 7;

/// Censored days in `[from, to)` for one SKU's ledger rows and sales.
pub fn censored_days(
    rows: &[Transaction],
    sales: &[SalesRecord],
    from: NaiveDate,
    to: NaiveDate,
    lookback_days: i64,
) -> BTreeSet<NaiveDate> {
    let on_hand = on_hand_series(rows, from, to);
    let sold: BTreeMap<NaiveDate, i64> = sales
        .iter()
        .filter(|s| s.date >= from && s.date < to)
        .map(|s| (s.date, s.qty_sold))
        .collect();

    let unfulfilled_dates: BTreeSet<NaiveDate> = rows
        .iter()
        .filter(|t| t.event == StockEvent::Unfulfilled)
        .map(|t| t.date)
        .collect();

    let mut out = BTreeSet::new();
    let mut day = from;
    while day < to {
        let empty_shelf = on_hand.get(&day).copied().unwrap_or(0) <= 0
            && sold.get(&day).copied().unwrap_or(0) == 0;
        let window_start = day - Duration::days(lookback_days.max(0));
        let recent_unfulfilled = unfulfilled_dates
            .range(window_start..=day)
            .next()
            .is_some();
        if empty_shelf || recent_unfulfilled {
            out.insert(day);
        }
        day = day.succ_opt().expect("date overflow");
    }
    out
}

