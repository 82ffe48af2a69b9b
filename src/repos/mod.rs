//! Repositories (data-access layer)
//!
//! One aggregate per repository. Every public write method runs in its own
//! scoped IMMEDIATE transaction; the `*_in` associated functions take a
//! borrowed connection so workflows can compose several aggregates inside a
//! single transaction. Store errors are mapped into the domain taxonomy at
//! this boundary and nowhere else.

pub mod audit;
pub mod event_rules;
pub mod holidays_repo;
pub mod kpi;
pub mod ledger;
pub mod lots;
pub mod orders;
pub mod promo;
pub mod receiving;
pub mod sales;
pub mod settings_repo;
pub mod skus;

pub use audit::{AuditFilter, AuditRepo, BatchSummary};
pub use event_rules::EventRulesRepo;
pub use holidays_repo::HolidaysRepo;
pub use kpi::KpiRepo;
pub use ledger::LedgerRepo;
pub use lots::LotsRepo;
pub use orders::OrdersRepo;
pub use promo::PromoRepo;
pub use receiving::ReceivingRepo;
pub use sales::SalesRepo;
pub use settings_repo::SettingsRepo;
pub use skus::SkuRepo;

use chrono::NaiveDate;

use crate::errors::{DomainError, DomainResult};

pub(crate) fn date_to_sql(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn date_from_sql(s: &str) -> DomainResult<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| DomainError::business_rule(format!("invalid date in store: {}", s)))
}

pub(crate) fn opt_date_from_sql(s: Option<String>) -> DomainResult<Option<NaiveDate>> {
    match s {
        Some(text) if !text.is_empty() => Ok(Some(date_from_sql(&text)?)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod repo_tests;
