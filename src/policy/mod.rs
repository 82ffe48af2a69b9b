//! Replenishment Policy
//!
//! Turns the adjusted demand picture into an order quantity:
//!
//! - resolve the target service level (alpha) for the SKU,
//! - compute the reorder point S (quantile-first under CSL + Monte-Carlo,
//!   z-score otherwise, legacy formula when configured),
//! - raw order Q = max(0, S - IP),
//! - run the deterministic constraint pipeline
//!   pack -> MOQ -> max-cap -> shelf-life penalty,
//! - emit the full OrderExplain.
//!
//! # Monotonicity
//!
//! With everything else fixed: alpha up implies S and Q_final up (or
//! equal); IP up implies Q_final down (or equal). Both are covered by the
//! sibling test suite.

pub mod constraints;
pub mod explain;
pub mod reorder;
pub mod service_level;

pub use constraints::{apply_order_constraints, ConstraintOutcome, ShelfLifeCheck};
pub use explain::{OrderExplain, EXPLAIN_COLUMNS};
pub use reorder::{compute_reorder_point, LegacyInputs, ReorderComputation, ReorderPointMethod};
pub use service_level::{resolve_alpha, safety_stock_multiplier, AlphaResolution};

#[cfg(test)]
mod policy_tests;
