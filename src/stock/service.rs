//! Database-facing stock queries.
//!
//! Thin orchestration over the ledger, lots, and sales repositories. All
//! heavy lifting is in the pure functions of this module's siblings, which
//! keeps replay logic testable without a store.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::errors::{DomainError, DomainResult};
use crate::models::Sku;
use crate::repos::{LedgerRepo, LotsRepo, SalesRepo};
use crate::stock::calculator::{replay, StockSnapshot};
use crate::stock::censoring;
use crate::stock::fefo::{self, UsableStock, LOT_LEDGER_TOLERANCE};
use crate::stock::pipeline;
use crate::storage::Database;

pub struct StockService {
    ledger: LedgerRepo,
    lots: LotsRepo,
    sales: SalesRepo,
}

impl StockService {
    pub fn new(db: &Database) -> Self {
        Self {
            ledger: LedgerRepo::new(db),
            lots: LotsRepo::new(db),
            sales: SalesRepo::new(db),
        }
    }

    /// Stock as of `as_of` (strict less-than cut over the ledger).
    pub fn stock_asof(&self, sku: &str, as_of: NaiveDate) -> DomainResult<StockSnapshot> {
        let rows = self.ledger.replay_rows(sku, as_of)?;
        Ok(replay(&rows))
    }

    /// Outstanding order pipeline keyed by receipt date.
    pub fn on_order_by_date(
        &self,
        sku: &str,
        as_of: NaiveDate,
    ) -> DomainResult<BTreeMap<NaiveDate, i64>> {
        let rows = self.ledger.replay_rows(sku, as_of)?;
        Ok(pipeline::on_order_by_date(&rows))
    }

    /// Inventory position with the pipeline sliced at `pipeline_cutoff` and
    /// optional extra entries merged in (Friday dual-lane coupling).
    pub fn inventory_position(
        &self,
        sku: &Sku,
        as_of: NaiveDate,
        pipeline_cutoff: NaiveDate,
        pipeline_extra: &[(NaiveDate, i64)],
    ) -> DomainResult<i64> {
        let rows = self.ledger.replay_rows(&sku.sku, as_of)?;
        let snapshot = replay(&rows);
        let pipe = pipeline::merge_pipeline_extra(&pipeline::on_order_by_date(&rows), pipeline_extra);
        let usable = self.usable_stock(sku, as_of)?;
        let on_hand_usable = if sku.is_perishable() {
            usable.usable
        } else {
            snapshot.on_hand
        };
        Ok(pipeline::inventory_position(
            on_hand_usable,
            &pipe,
            snapshot.unfulfilled,
            pipeline_cutoff,
        ))
    }

    /// Usable/unusable split from the lot book. For non-perishables the
    /// ledger on-hand is authoritative and everything is usable.
    pub fn usable_stock(&self, sku: &Sku, as_of: NaiveDate) -> DomainResult<UsableStock> {
        if !sku.is_perishable() {
            let snapshot = self.stock_asof(&sku.sku, as_of)?;
            return Ok(UsableStock {
                total: snapshot.on_hand,
                usable: snapshot.on_hand.max(0),
                unusable: 0,
            });
        }
        let lots = self.lots.list_fefo(&sku.sku)?;
        Ok(fefo::usable_split(&lots, as_of, sku.min_shelf_life_days))
    }

    /// Verify the lot book against the ledger. Beyond tolerance this is an
    /// IntegrityDiscrepancy; waste-risk callers catch it and degrade to the
    /// conservative projection.
    pub fn check_lot_integrity(&self, sku: &Sku, as_of: NaiveDate) -> DomainResult<()> {
        if !sku.is_perishable() {
            return Ok(());
        }
        let snapshot = self.stock_asof(&sku.sku, as_of)?;
        let lots_total = self
            .lots
            .list_fefo(&sku.sku)?
            .iter()
            .map(|l| l.qty_on_hand)
            .sum::<i64>();
        if (lots_total - snapshot.on_hand).abs() > LOT_LEDGER_TOLERANCE {
            return Err(DomainError::IntegrityDiscrepancy {
                sku: sku.sku.clone(),
                ledger_qty: snapshot.on_hand,
                lots_qty: lots_total,
            });
        }
        Ok(())
    }

    /// Lots nearing expiry for one SKU, most urgent first.
    pub fn expiry_alerts(
        &self,
        sku: &str,
        as_of: NaiveDate,
        settings: &crate::config::Settings,
    ) -> DomainResult<Vec<fefo::ExpiryAlert>> {
        let lots = self.lots.list_fefo(sku)?;
        Ok(fefo::scan_expiry_alerts(
            &lots,
            as_of,
            settings.expiry_alerts.critical_threshold_days,
            settings.expiry_alerts.warning_threshold_days,
        ))
    }

    /// Censored days in `[from, to)` for forecast training exclusion.
    pub fn censored_days(
        &self,
        sku: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DomainResult<BTreeSet<NaiveDate>> {
        let rows = self.ledger.replay_rows(sku, to)?;
        let sales = self.sales.list_range(sku, from, to)?;
        Ok(censoring::censored_days(
            &rows,
            &sales,
            from,
            to,
            censoring::DEFAULT_CENSOR_LOOKBACK_DAYS,
        ))
    }

    pub fn is_day_censored(&self, sku: &str, day: NaiveDate) -> DomainResult<bool> {
        Ok(self
            .censored_days(sku, day, day.succ_opt().expect("date overflow"))?
            .contains(&day))
    }
}
