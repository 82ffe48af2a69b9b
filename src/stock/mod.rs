//! Ledger Replay / Stock Calculator
//!
//! Reconstructs on-hand, on-order, and unfulfilled quantities for any as-of
//! date by replaying the transaction ledger in deterministic order:
//! date ascending, event priority ascending, transaction_id ascending.
//! As-of is a strict less-than cut: `stock_asof(D)` sees only rows with
//! date < D.
//!
//! # Invariants
//!
//! 1. Adding a transaction dated >= D never changes `stock_asof(D)`.
//! 2. SNAPSHOT resets the anchor (on_hand := qty, on_order := 0).
//! 3. ADJUST is an absolute set, not a delta; the last one wins by id.
//! 4. UNFULFILLED is tracking-only: it never touches on_hand or on_order.
//! 5. Pipeline matching is FIFO among orders sharing a receipt date.

pub mod calculator;
pub mod censoring;
pub mod fefo;
pub mod pipeline;
pub mod service;

pub use calculator::{replay, stock_asof_rows, StockSnapshot};
pub use censoring::{censored_days, DEFAULT_CENSOR_LOOKBACK_DAYS};
pub use fefo::{
    expiring_soon, project_waste_after_receipt, scan_expiry_alerts, usable_split, ExpiryAlert,
    ExpiryAlertLevel, UsableStock, WasteProjection,
};
pub use pipeline::{inventory_position, on_order_by_date};
pub use service::StockService;
