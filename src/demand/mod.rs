//! Demand Driver Pipeline
//!
//! Applied strictly in order; commutativity is not assumed:
//!
//! 1. baseline forecast (input)
//! 2. event uplift (delivery-date only)
//! 3. promo uplift (promo days in the horizon)
//! 4. cannibalization / post-promo dip (identity hook)
//! 5. waste adjustment (every date, and the distribution when present)
//!
//! Each stage receives the prior stage's per-date map, returns a new one,
//! and records its effective multiplier per date for explain.

pub mod cannibalization;
pub mod event_uplift;
pub mod promo_uplift;
pub mod waste_adjust;

pub use event_uplift::EventUpliftExplain;
pub use promo_uplift::{merge_windows, PoolSamples, PromoUpliftExplain, UpliftEstimate};
pub use waste_adjust::WasteAdjustExplain;

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::forecast::{DemandDistribution, DemandForecast};
use crate::models::{EventUpliftRule, Sku};


/// Per-stage explain record: the multiplier the stage applied on each
/// horizon date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageExplain {
    pub stage: String,
    pub multipliers: BTreeMap<NaiveDate, f64>,
}

impl StageExplain {
    fn uniform(stage: &str, dates: &BTreeMap<NaiveDate, f64>, multiplier: f64) -> Self {
        Self {
            stage: stage.to_string(),
            multipliers: dates.keys().map(|d| (*d, multiplier)).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DemandContext<'a> {
    pub sku: &'a Sku,
    pub settings: &'a Settings,
    pub forecast: &'a DemandForecast,
    /// The lane's delivery date (event uplift applies here only).
    pub delivery_date: NaiveDate,
    /// Resolved event rule for (delivery_date, sku), if any.
    pub event_rule: Option<&'a EventUpliftRule>,
    /// Horizon dates covered by an active promo window.
    pub promo_days: BTreeSet<NaiveDate>,
    /// Historical uplift samples per pooling level.
    pub promo_pools: &'a PoolSamples,
    /// Current forward waste risk (percent) from the lot book.
    pub waste_risk_percent: f64,
}

/// Pipeline output: the adjusted per-date demand, the adjusted
/// distribution when Monte-Carlo is in play, and the full explain chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustedDemand {
    pub per_date: BTreeMap<NaiveDate, f64>,
    pub distribution: Option<DemandDistribution>,
    pub stages: Vec<StageExplain>,
    pub event_explain: EventUpliftExplain,
    pub promo_explain: PromoUpliftExplain,
    pub waste_explain: WasteAdjustExplain,
}

/// Run the full driver pipeline over the baseline forecast.
pub fn run_pipeline(ctx: &DemandContext) -> AdjustedDemand {
    let baseline = ctx.forecast.per_date.clone();
    let mut stages = vec![StageExplain::uniform("baseline", &baseline, 1.0)];

    // 2. Event uplift, delivery date only.
    let (after_event, event_explain) = event_uplift::apply(
        &baseline,
        ctx.delivery_date,
        ctx.event_rule,
        ctx.forecast,
        &ctx.settings.event_uplift,
        ctx.sku.is_perishable(),
    );
    stages.push(StageExplain {
        stage: "event_uplift".to_string(),
        multipliers: multipliers_between(&baseline, &after_event),
    });

    // 3. Promo uplift on promo days.
    let (after_promo, promo_explain) = promo_uplift::apply(
        &after_event,
        &ctx.promo_days,
        ctx.promo_pools,
        &ctx.settings.promo_uplift,
    );
    stages.push(StageExplain {
        stage: "promo_uplift".to_string(),
        multipliers: multipliers_between(&after_event, &after_promo),
    });

    // 4. Cannibalization hook (identity until a rule set exists).
    let after_cannibal = cannibalization::apply(&after_promo);
    stages.push(StageExplain::uniform(
        "cannibalization",
        &after_cannibal,
        1.0,
    ));

    // 5. Waste adjustment on every date, and on the distribution.
    let (after_waste, distribution, waste_explain) = waste_adjust::apply(
        &after_cannibal,
        ctx.forecast.distribution.as_ref(),
        ctx.waste_risk_percent,
        &ctx.settings.shelf_life_policy,
        ctx.sku.is_perishable(),
    );
    stages.push(StageExplain::uniform(
        "waste_adjustment",
        &after_waste,
        waste_explain.multiplier,
    ));

    AdjustedDemand {
        per_date: after_waste,
        distribution,
        stages,
        event_explain,
        promo_explain,
        waste_explain,
    }
}

fn multipliers_between(
    before: &BTreeMap<NaiveDate, f64>,
    after: &BTreeMap<NaiveDate, f64>,
) -> BTreeMap<NaiveDate, f64> {
    before
        .iter()
        .map(|(date, prev)| {
            let next = after.get(date).copied().unwrap_or(*prev);
            let m = if prev.abs() > f64::EPSILON {
                next / prev
            } else {
                1.0
            };
            (*date, m)
        })
        .collect()
}
