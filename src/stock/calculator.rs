//! Event replay over pre-sorted ledger rows.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{StockEvent, Transaction};

/// Reconstructed stock state as of a date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub on_hand: i64,
    pub on_order: i64,
    pub unfulfilled: i64,
}

/// Replay `rows` (already in deterministic order) into a snapshot.
pub fn replay(rows: &[Transaction]) -> StockSnapshot {
    let mut state = StockSnapshot::default();
    for tx in rows {
        apply(&mut state, tx);
    }
    state
}

fn apply(state: &mut StockSnapshot, tx: &Transaction) {
    match tx.event {
        StockEvent::Snapshot => {
            state.on_hand = tx.qty;
            state.on_order = 0;
        }
        StockEvent::Order => {
            state.on_order += tx.qty;
        }
        StockEvent::Receipt => {
            state.on_order = (state.on_order - tx.qty).max(0);
            state.on_hand += tx.qty;
        }
        StockEvent::Sale | StockEvent::Waste => {
            state.on_hand -= tx.qty;
        }
        StockEvent::Adjust => {
            // Absolute set, not a delta.
            state.on_hand = tx.qty;
        }
        StockEvent::Unfulfilled => {
            state.unfulfilled += tx.qty;
        }
    }
}

/// Sort rows into deterministic replay order and replay those with
/// date < `as_of`. Callers that fetch through the ledger repository get
/// rows pre-sorted and pre-filtered; this is the in-memory equivalent.
pub fn stock_asof_rows(rows: &[Transaction], as_of: NaiveDate) -> StockSnapshot {
    let mut eligible: Vec<&Transaction> = rows.iter().filter(|t| t.date < as_of).collect();
    eligible.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then(a.event.priority().cmp(&b.event.priority()))
            .then(a.transaction_id.cmp(&b.transaction_id))
    });
    let mut state = StockSnapshot::default();
    for tx in eligible {
        apply(&mut state, tx);
    }
    state
}

/// On-hand at the start of each day in `[from, to)`, by as-of semantics
/// (the value for day d replays rows with date < d).
pub fn on_hand_series(
    rows: &[Transaction],
    from: NaiveDate,
    to: NaiveDate,
) -> std::collections::BTreeMap<NaiveDate, i64> {
    let mut sorted: Vec<&Transaction> = rows.iter().filter(|t| t.date < to).collect();
    sorted.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then(a.event.priority().cmp(&b.event.priority()))
            .then(a.transaction_id.cmp(&b.transaction_id))
    });

    let mut out = std::collections::BTreeMap::new();
    let mut state = StockSnapshot::default();
    let mut idx = 0usize;
    let mut day = from;
    while day < to {
        while idx < sorted.len() && sorted[idx].date < day {
            apply(&mut state, sorted[idx]);
            idx += 1;
        }
        out.insert(day, state.on_hand);
        day = day.succ_opt().expect("date overflow");
    }
    out
}
