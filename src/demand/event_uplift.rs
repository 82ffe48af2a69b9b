//! Event uplift stage.
//!
//! A resolved rule maps its strength to a quantile of the simulated demand
//! distribution; the multiplier is that quantile relative to the mean,
//! clamped to the configured band, and applied on the delivery date only.
//! Without a distribution (non-Monte-Carlo paths) the multiplier falls back
//! to a z-score scale over mu/sigma.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::config::settings::EventUpliftSettings;
use crate::forecast::DemandForecast;
use crate::models::{EventUpliftRule, UpliftStrength};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventUpliftExplain {
    pub applied: bool,
    pub rule_scope: Option<String>,
    pub rule_reason: Option<String>,
    pub strength: Option<String>,
    pub quantile: Option<f64>,
    pub multiplier: f64,
    pub delivery_date: Option<NaiveDate>,
    pub skip_reason: Option<String>,
}

fn strength_quantile(strength: UpliftStrength) -> f64 {
    match strength {
        UpliftStrength::Low => 0.50,
        UpliftStrength::Med => 0.80,
        UpliftStrength::High => 0.95,
    }
}

pub fn apply(
    per_date: &BTreeMap<NaiveDate, f64>,
    delivery_date: NaiveDate,
    rule: Option<&EventUpliftRule>,
    forecast: &DemandForecast,
    settings: &EventUpliftSettings,
    perishable: bool,
) -> (BTreeMap<NaiveDate, f64>, EventUpliftExplain) {
    let mut explain = EventUpliftExplain {
        multiplier: 1.0,
        ..Default::default()
    };

    if !settings.enabled {
        explain.skip_reason = Some("disabled".to_string());
        return (per_date.clone(), explain);
    }
    let Some(rule) = rule else {
        explain.skip_reason = Some("no_rule".to_string());
        return (per_date.clone(), explain);
    };
    if perishable && settings.perishables_policy == "exclude" {
        explain.skip_reason = Some("perishable_excluded".to_string());
        return (per_date.clone(), explain);
    }

    let quantile = strength_quantile(rule.strength);
    let multiplier = quantile_multiplier(forecast, quantile)
        .clamp(settings.min_factor, settings.max_factor);

    let mut out = per_date.clone();
    if let Some(value) = out.get_mut(&delivery_date) {
        *value *= multiplier;
        explain.applied = true;
        explain.delivery_date = Some(delivery_date);
    } else {
        explain.skip_reason = Some("delivery_date_outside_horizon".to_string());
    }

    explain.rule_scope = Some(rule.scope_type.as_str().to_string());
    explain.rule_reason = Some(rule.reason.clone());
    explain.strength = Some(rule.strength.as_str().to_string());
    explain.quantile = Some(quantile);
    explain.multiplier = multiplier;
    (out, explain)
}

/// Scale-free quantile ratio of the demand picture: q(alpha) / mu when a
/// simulated distribution exists, a normal-approximation ratio otherwise.
fn quantile_multiplier(forecast: &DemandForecast, quantile: f64) -> f64 {
    if let Some(dist) = &forecast.distribution {
        if dist.mu > 0.0 {
            if let Some(q) = dist.quantile(quantile) {
                return q / dist.mu;
            }
        }
    }
    if forecast.mu_p > 0.0 && forecast.sigma_p > 0.0 {
        let z = Normal::new(0.0, 1.0)
            .map(|n| n.inverse_cdf(quantile.clamp(1e-6, 1.0 - 1e-6)))
            .unwrap_or(0.0);
        return 1.0 + z * forecast.sigma_p / forecast.mu_p;
    }
    1.0
}
