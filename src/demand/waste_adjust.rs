//! Waste adjustment stage.
//!
//! Expected waste shrinks the demand the order actually has to cover:
//! `expected_waste_rate = (waste_risk_percent / 100) * realization_factor`,
//! and every horizon date scales by `(1 - rate)`. When a Monte-Carlo
//! distribution is present its mean, sigma, and percentiles scale by the
//! same factor so the quantile-first policy sees the adjusted picture.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::settings::ShelfLifePolicySettings;
use crate::forecast::DemandDistribution;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WasteAdjustExplain {
    pub applied: bool,
    pub waste_risk_percent: f64,
    pub expected_waste_rate: f64,
    /// The per-date scale factor, `1 - expected_waste_rate`.
    pub multiplier: f64,
}

pub fn apply(
    per_date: &BTreeMap<NaiveDate, f64>,
    distribution: Option<&DemandDistribution>,
    waste_risk_percent: f64,
    settings: &ShelfLifePolicySettings,
    perishable: bool,
) -> (
    BTreeMap<NaiveDate, f64>,
    Option<DemandDistribution>,
    WasteAdjustExplain,
) {
    let mut explain = WasteAdjustExplain {
        waste_risk_percent,
        multiplier: 1.0,
        ..Default::default()
    };

    if !settings.enabled || !perishable || waste_risk_percent <= 0.0 {
        return (per_date.clone(), distribution.cloned(), explain);
    }

    let rate = ((waste_risk_percent / 100.0) * settings.waste_realization_factor)
        .clamp(0.0, 1.0);
    let multiplier = 1.0 - rate;

    let scaled: BTreeMap<NaiveDate, f64> = per_date
        .iter()
        .map(|(date, value)| (*date, value * multiplier))
        .collect();

    let scaled_dist = distribution.map(|dist| DemandDistribution {
        mu: dist.mu * multiplier,
        sigma: dist.sigma * multiplier,
        quantiles: dist
            .quantiles
            .iter()
            .map(|(k, v)| (k.clone(), v * multiplier))
            .collect(),
        ..dist.clone()
    });

    explain.applied = true;
    explain.expected_waste_rate = rate;
    explain.multiplier = multiplier;
    (scaled, scaled_dist, explain)
}
