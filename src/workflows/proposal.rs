//! Order proposal.
//!
//! For each active SKU and an order date: resolve the lane (Fridays split
//! into SATURDAY then MONDAY, with the Saturday proposal merged into the
//! Monday pipeline), reconstruct stock and pipeline, build the adjusted
//! demand over the protection period, compute S and the constrained order,
//! and attach the full explain record.

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::calendar::{CalendarConfig, Lane};
use crate::config::Settings;
use crate::demand::{self, PoolSamples};
use crate::errors::{DomainError, DomainResult};
use crate::forecast::{self, BaselineConfig, BaselineModel, ForecastInputs};
use crate::models::{SalesRecord, Sku};
use crate::observe::run_id::generate_run_id;
use crate::policy::{
    apply_order_constraints, compute_reorder_point, resolve_alpha, safety_stock_multiplier,
    LegacyInputs, OrderExplain, ShelfLifeCheck,
};
use crate::policy::explain::McMetadata;
use crate::repos::{
    AuditRepo, EventRulesRepo, HolidaysRepo, LotsRepo, PromoRepo, SalesRepo, SettingsRepo,
    SkuRepo,
};
use crate::stock::{fefo, StockService};
use crate::workflows::Workflows;

/// How far back the training window reaches from the order date.
const TRAINING_LOOKBACK_DAYS: i64 = 180;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub sku: String,
    pub lane: Lane,
    pub order_date: NaiveDate,
    pub receipt_date: NaiveDate,
    pub qty: i64,
    pub explain: OrderExplain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalBatch {
    pub run_id: String,
    pub order_date: NaiveDate,
    pub proposals: Vec<Proposal>,
    pub skipped: Vec<(String, String)>,
}

impl Workflows {
    /// Propose orders for every active SKU. Compute fans out across SKUs;
    /// results come back in SKU order so batches are reproducible.
    pub fn propose_orders(&self, order_date: NaiveDate) -> DomainResult<ProposalBatch> {
        let run_id = generate_run_id();
        let audit = AuditRepo::new(&self.db);
        audit.append(
            "BATCH_START",
            &self.user,
            None,
            &format!("order proposal for {}", order_date),
            Some(&run_id),
        )?;

        let settings = SettingsRepo::new(&self.db).get()?;
        let holidays = HolidaysRepo::new(&self.db).get()?;
        let skus = SkuRepo::new(&self.db).list_active()?;

        let results: Vec<(String, DomainResult<Vec<Proposal>>)> = skus
            .par_iter()
            .map(|sku| {
                (
                    sku.sku.clone(),
                    self.propose_for_sku(sku, order_date, &settings, &holidays, &[]),
                )
            })
            .collect();

        let mut proposals = Vec::new();
        let mut skipped = Vec::new();
        for (sku, result) in results {
            match result {
                Ok(mut lanes) => proposals.append(&mut lanes),
                Err(err) => {
                    warn!(sku = %sku, error = %err, "proposal skipped");
                    skipped.push((sku, err.to_string()));
                }
            }
        }

        audit.append(
            "BATCH_END",
            &self.user,
            None,
            &format!(
                "order proposal for {}: {} proposals, {} skipped",
                order_date,
                proposals.len(),
                skipped.len()
            ),
            Some(&run_id),
        )?;
        info!(
            run_id = %run_id,
            proposals = proposals.len(),
            skipped = skipped.len(),
            "order proposal batch complete"
        );

        Ok(ProposalBatch {
            run_id,
            order_date,
            proposals,
            skipped,
        })
    }

    /// Propose for one SKU. Returns one proposal per lane (two on Fridays:
    /// the Saturday-lane result feeds the Monday-lane pipeline).
    pub fn propose_for_sku(
        &self,
        sku: &Sku,
        order_date: NaiveDate,
        settings: &Settings,
        holidays: &crate::config::HolidaySet,
        pipeline_extra: &[(NaiveDate, i64)],
    ) -> DomainResult<Vec<Proposal>> {
        let calendar = self.calendar_for(sku, settings, holidays);
        let lanes = calendar.lanes_for(order_date)?;

        let mut proposals = Vec::new();
        let mut extra: Vec<(NaiveDate, i64)> = pipeline_extra.to_vec();
        for lane in lanes {
            let proposal =
                self.propose_lane(sku, order_date, lane, &calendar, settings, &extra)?;
            // The Saturday proposal must be visible to the Monday lane.
            if proposal.qty > 0 {
                extra.push((proposal.receipt_date, proposal.qty));
            }
            proposals.push(proposal);
        }
        Ok(proposals)
    }

    fn calendar_for(
        &self,
        sku: &Sku,
        settings: &Settings,
        holidays: &crate::config::HolidaySet,
    ) -> CalendarConfig {
        let lead_time = if sku.lead_time_days > 0 {
            sku.lead_time_days
        } else {
            settings.reorder_engine.lead_time_days
        };
        CalendarConfig {
            lead_time_days: lead_time,
            holidays: holidays.clone(),
            ..CalendarConfig::default()
        }
    }

    fn propose_lane(
        &self,
        sku: &Sku,
        order_date: NaiveDate,
        lane: Lane,
        calendar: &CalendarConfig,
        settings: &Settings,
        pipeline_extra: &[(NaiveDate, i64)],
    ) -> DomainResult<Proposal> {
        let window = calendar.protection_window(order_date, lane)?;
        let horizon: Vec<NaiveDate> = (0..window.p_days)
            .map(|i| window.r1 + Duration::days(i))
            .collect();

        let stock = StockService::new(&self.db);
        let sales_repo = SalesRepo::new(&self.db);
        let lots_repo = LotsRepo::new(&self.db);

        let training_start = order_date - Duration::days(TRAINING_LOOKBACK_DAYS);
        let sales = sales_repo.list_range(&sku.sku, training_start, order_date)?;
        let censored = stock.censored_days(&sku.sku, training_start, order_date)?;

        // Forecast over the protection period.
        let fc = forecast::forecast(&ForecastInputs {
            sku,
            settings,
            sales: &sales,
            censored: &censored,
            horizon: &horizon,
        })?;

        // Demand drivers.
        let event_rule = EventRulesRepo::new(&self.db).resolve(
            window.r1,
            &sku.sku,
            sku.category.as_deref(),
            sku.department.as_deref(),
        )?;
        let promo_days = self.promo_days_in_horizon(sku, &horizon)?;
        let promo_pools = self.promo_pools(sku, settings, &sales, &censored, order_date)?;
        let lots = lots_repo.list_fefo(&sku.sku)?;
        let waste_risk_percent =
            self.current_waste_risk(sku, settings, &stock, &lots, order_date);

        let adjusted = demand::run_pipeline(&demand::DemandContext {
            sku,
            settings,
            forecast: &fc,
            delivery_date: window.r1,
            event_rule: event_rule.as_ref(),
            promo_days,
            promo_pools: &promo_pools,
            waste_risk_percent,
        });

        // Service level and reorder point. A SKU without a variability
        // cluster can pick one up from the auto-classifier when enabled.
        let observations: Vec<(NaiveDate, f64)> = sales
            .iter()
            .filter(|s| !s.promo_flag && !censored.contains(&s.date))
            .map(|s| (s.date, s.qty_sold as f64))
            .collect();
        let variability = sku.demand_variability.or_else(|| {
            crate::policy::service_level::auto_classify_variability(
                &observations,
                &settings.auto_variability,
            )
        });
        let sku_eff = Sku {
            demand_variability: variability,
            ..sku.clone()
        };
        let alpha = resolve_alpha(&sku_eff, settings);
        let multiplier = safety_stock_multiplier(variability);
        let training: Vec<f64> = observations.iter().map(|(_, v)| *v).collect();
        let daily_avg = if training.is_empty() {
            0.0
        } else {
            training.iter().sum::<f64>() / training.len() as f64
        };
        let adjusted_mu: f64 = adjusted.per_date.values().sum();
        let adjusted_sigma = adjusted
            .distribution
            .as_ref()
            .map(|d| d.sigma)
            .unwrap_or(fc.sigma_p * adjusted.waste_explain.multiplier);
        let reorder = compute_reorder_point(
            settings.reorder_engine.policy_mode,
            alpha.alpha,
            adjusted.distribution.as_ref(),
            adjusted_mu,
            adjusted_sigma,
            &LegacyInputs {
                daily_sales_avg: daily_avg,
                safety_stock_adjusted: sku.safety_stock * multiplier,
                p_days: window.p_days,
            },
        );

        // Inventory position with the pipeline sliced at order_date + P.
        let pipeline_cutoff = order_date + Duration::days(window.p_days);
        let ip = stock.inventory_position(sku, order_date, pipeline_cutoff, pipeline_extra)?;
        let usable = stock.usable_stock(sku, order_date)?;
        let q_raw = crate::policy::reorder::raw_order(reorder.s, ip);

        // Constraint pipeline with the demand-adjusted waste projection.
        let shelf_settings = &settings.shelf_life_policy;
        let horizon_days = shelf_settings.waste_horizon_days.max(1) as usize;
        let mean_daily = if window.p_days > 0 {
            adjusted_mu / window.p_days as f64
        } else {
            daily_avg
        };
        let daily_demand = vec![mean_daily; horizon_days];
        let order_expiry = if sku.is_perishable() {
            Some(window.r1 + Duration::days(sku.shelf_life_days))
        } else {
            None
        };
        let integrity_broken = stock.check_lot_integrity(sku, order_date).is_err();
        let project = move |qty: i64| {
            if integrity_broken {
                return fefo::conservative_projection();
            }
            fefo::project_waste_after_receipt(
                &lots,
                order_date,
                sku.min_shelf_life_days,
                &daily_demand,
                qty,
                order_expiry,
            )
        };
        let check = ShelfLifeCheck {
            settings: shelf_settings,
            project: &project,
        };
        let outcome = apply_order_constraints(q_raw, sku, ip, Some(&check));

        debug!(
            sku = %sku.sku,
            lane = %lane,
            s = reorder.s,
            ip,
            q_final = outcome.q_final,
            "lane proposal computed"
        );

        let mc = adjusted.distribution.as_ref().map(|d| McMetadata {
            n_simulations: d.n_simulations,
            seed: d.seed,
            distribution: d.distribution.clone(),
            horizon_days: d.horizon_days,
            output_percentile: alpha.alpha,
        });

        let explain = OrderExplain {
            sku: sku.sku.clone(),
            order_date,
            receipt_date: window.r1,
            lane,
            p_days: window.p_days,
            alpha_target: alpha.alpha,
            alpha_effective: reorder.alpha_effective,
            alpha_source: alpha.source,
            forecast_method: fc.method.clone(),
            reorder_point_method: reorder.method,
            quantile_used: reorder.quantile_used,
            s: reorder.s,
            mu_p: adjusted_mu,
            sigma_p: adjusted_sigma,
            inventory_position: ip,
            baseline_map: fc.per_date.clone(),
            adjusted_map: adjusted.per_date.clone(),
            event_explain: adjusted.event_explain.clone(),
            promo_explain: adjusted.promo_explain.clone(),
            waste_explain: adjusted.waste_explain.clone(),
            mc,
            constraints_applied: outcome.constraints_applied.clone(),
            capped_by_max_stock: outcome.capped_by_max_stock,
            shelf_life_penalty_applied: outcome.shelf_life_penalty_applied,
            forward_waste_risk_pct: outcome.forward_waste_risk_pct,
            expected_waste_qty: outcome.expected_waste_qty,
            usable_stock: usable.usable,
            unusable_stock: usable.unusable,
            final_qty: outcome.q_final,
        };

        Ok(Proposal {
            sku: sku.sku.clone(),
            lane,
            order_date,
            receipt_date: window.r1,
            qty: outcome.q_final,
            explain,
        })
    }

    fn promo_days_in_horizon(
        &self,
        sku: &Sku,
        horizon: &[NaiveDate],
    ) -> DomainResult<BTreeSet<NaiveDate>> {
        let Some((first, last)) = horizon.first().zip(horizon.last()) else {
            return Ok(BTreeSet::new());
        };
        let windows = PromoRepo::new(&self.db).list_overlapping(&sku.sku, *first, *last)?;
        Ok(horizon
            .iter()
            .filter(|d| {
                windows
                    .iter()
                    .any(|w| w.start_date <= **d && **d <= w.end_date)
            })
            .copied()
            .collect())
    }

    /// SKU-level uplift samples from the merged historical promo windows,
    /// with the anti-leakage baseline trained strictly before each event.
    fn promo_pools(
        &self,
        sku: &Sku,
        settings: &Settings,
        sales: &[SalesRecord],
        censored: &BTreeSet<NaiveDate>,
        order_date: NaiveDate,
    ) -> DomainResult<PoolSamples> {
        let cfg = &settings.promo_uplift;
        let windows = PromoRepo::new(&self.db).list_for_sku(&sku.sku)?;
        let past: Vec<_> = windows
            .into_iter()
            .filter(|w| w.end_date < order_date)
            .collect();

        let mut samples = Vec::new();
        for (start, end) in demand::merge_windows(&past) {
            let pre_event: Vec<(NaiveDate, f64)> = sales
                .iter()
                .filter(|s| s.date < start && !s.promo_flag && !censored.contains(&s.date))
                .map(|s| (s.date, s.qty_sold as f64))
                .collect();
            let baseline = BaselineModel::fit(&pre_event, &BaselineConfig::default());

            let event_days: Vec<&SalesRecord> = sales
                .iter()
                .filter(|s| {
                    s.date >= start && s.date <= end && s.promo_flag
                        && !censored.contains(&s.date)
                })
                .collect();
            if (event_days.len() as i64) < cfg.min_valid_days_sku {
                continue;
            }

            let actual: f64 = event_days.iter().map(|s| s.qty_sold as f64).sum::<f64>()
                / event_days.len() as f64;
            let predicted: f64 = event_days
                .iter()
                .map(|s| baseline.predict(s.date))
                .sum::<f64>()
                / event_days.len() as f64;
            let uplift = actual / predicted.max(cfg.denominator_epsilon);
            samples.push(uplift);
        }

        Ok(PoolSamples {
            sku: samples,
            ..Default::default()
        })
    }

    /// Current forward waste risk of the on-hand lot book (zero-demand,
    /// zero-order projection); conservative 100% on lot/ledger mismatch.
    fn current_waste_risk(
        &self,
        sku: &Sku,
        settings: &Settings,
        stock: &StockService,
        lots: &[crate::models::Lot],
        order_date: NaiveDate,
    ) -> f64 {
        if !sku.is_perishable() {
            return 0.0;
        }
        match stock.check_lot_integrity(sku, order_date) {
            Err(DomainError::IntegrityDiscrepancy { .. }) => 100.0,
            Err(_) | Ok(()) => {
                let horizon = settings.shelf_life_policy.waste_horizon_days.max(1) as usize;
                let projection = fefo::project_waste_after_receipt(
                    lots,
                    order_date,
                    sku.min_shelf_life_days,
                    &vec![0.0; horizon],
                    0,
                    None,
                );
                projection.waste_risk_traditional
            }
        }
    }
}
