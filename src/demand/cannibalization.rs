//! Cannibalization / post-promo dip hook.
//!
//! The source never specified a complete rule set, so this stage is an
//! identity pass: it participates in the explain chain with multiplier 1.0
//! and gives a future rule set a single place to land.

use std::collections::BTreeMap;

use chrono::NaiveDate;

pub fn apply(per_date: &BTreeMap<NaiveDate, f64>) -> BTreeMap<NaiveDate, f64> {
    per_date.clone()
}
