//! Workflows
//!
//! The four operational entry points on top of the repositories and the
//! calculation modules:
//!
//! - order proposal (per SKU or batch, Friday dual-lane aware),
//! - order confirmation (deterministic ids, ORDER events, order logs),
//! - receipt closure (idempotent by document id, FIFO allocation),
//! - end-of-day stock reconciliation and exception events.
//!
//! Writes always run inside one IMMEDIATE transaction per workflow call;
//! a failure in any step rolls the whole call back.

pub mod confirmation;
pub mod eod;
pub mod exceptions;
pub mod proposal;
pub mod receipt;

pub use confirmation::OrderConfirmation;
pub use eod::{EodLine, EodResult};
pub use exceptions::{ExceptionResult, RevertResult};
pub use proposal::{Proposal, ProposalBatch};
pub use receipt::{ReceiptClose, ReceiptCloseResult, ReceiptItem};

use crate::storage::Database;

#[cfg(test)]
mod workflow_tests;

/// Entry point bundling the workflow implementations around one store.
pub struct Workflows {
    pub(crate) db: Database,
    pub(crate) user: String,
}

impl Workflows {
    pub fn new(db: &Database, user: impl Into<String>) -> Self {
        Self {
            db: db.clone(),
            user: user.into(),
        }
    }
}
