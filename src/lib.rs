//! restock-engine: deterministic, ledger-driven replenishment core.
//!
//! A single-node inventory engine for a small retail/wholesale operation:
//! an append-only event ledger with as-of stock reconstruction, FEFO lot
//! accounting, a calendar-aware protection window, a seeded Monte-Carlo /
//! intermittent demand model, a CSL quantile-first ordering policy with a
//! deterministic constraint pipeline, and idempotent receiving workflows.
//! Every proposed order carries a full, reproducible explain record.
//!
//! ```text
//! settings/holidays -> repositories -> stock replay
//!                                        |
//!          calendar (lane, P) -> forecast (baseline / MC / intermittent)
//!                                        |
//!                demand drivers (event, promo, waste) -> policy (S, Q)
//!                                        |
//!                workflows (propose / confirm / receive / reconcile)
//!                                        |
//!                        storage + audit (run_id)
//! ```

pub mod calendar;
pub mod config;
pub mod demand;
pub mod errors;
pub mod forecast;
pub mod models;
pub mod observe;
pub mod policy;
pub mod repos;
pub mod stock;
pub mod storage;
pub mod workflows;

pub use errors::{DomainError, DomainResult, Severity};
pub use storage::Database;
pub use workflows::Workflows;
