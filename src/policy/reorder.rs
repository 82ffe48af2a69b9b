//! Reorder point S.
//!
//! CSL + Monte-Carlo: quantile-first. If the target alpha is tabulated in
//! D_P's quantile map, S is that quantile; otherwise S falls back to
//! mu_P + z(alpha) * sigma_P with z from the standard normal inverse CDF.
//! CSL + simple: always the z-score form. Legacy: daily average times the
//! protection period plus the adjusted safety stock.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::config::PolicyMode;
use crate::forecast::DemandDistribution;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReorderPointMethod {
    Quantile,
    ZScore,
    ZScoreFallback,
    Legacy,
}

impl ReorderPointMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReorderPointMethod::Quantile => "quantile",
            ReorderPointMethod::ZScore => "z_score",
            ReorderPointMethod::ZScoreFallback => "z_score_fallback",
            ReorderPointMethod::Legacy => "legacy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderComputation {
    pub s: f64,
    pub method: ReorderPointMethod,
    pub quantile_used: Option<f64>,
    pub alpha_effective: f64,
}

/// Inputs for the legacy formula.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyInputs {
    pub daily_sales_avg: f64,
    /// safety_stock already scaled by the variability multiplier.
    pub safety_stock_adjusted: f64,
    pub p_days: i64,
}

/// Standard normal inverse CDF.
pub fn z_score(alpha: f64) -> f64 {
    let clamped = alpha.clamp(1e-6, 1.0 - 1e-6);
    Normal::new(0.0, 1.0)
        .map(|n| n.inverse_cdf(clamped))
        .unwrap_or(0.0)
}

pub fn compute_reorder_point(
    policy_mode: PolicyMode,
    alpha: f64,
    distribution: Option<&DemandDistribution>,
    mu_p: f64,
    sigma_p: f64,
    legacy: &LegacyInputs,
) -> ReorderComputation {
    match policy_mode {
        PolicyMode::Legacy => {
            let s = legacy.daily_sales_avg * legacy.p_days as f64 + legacy.safety_stock_adjusted;
            ReorderComputation {
                s,
                method: ReorderPointMethod::Legacy,
                quantile_used: None,
                alpha_effective: alpha,
            }
        }
        PolicyMode::Csl => match distribution {
            Some(dist) => match dist.quantile(alpha) {
                Some(q) => ReorderComputation {
                    s: q,
                    method: ReorderPointMethod::Quantile,
                    quantile_used: Some(q),
                    alpha_effective: alpha,
                },
                None => ReorderComputation {
                    s: dist.mu + z_score(alpha) * dist.sigma,
                    method: ReorderPointMethod::ZScoreFallback,
                    quantile_used: None,
                    alpha_effective: alpha,
                },
            },
            None => ReorderComputation {
                s: mu_p + z_score(alpha) * sigma_p,
                method: ReorderPointMethod::ZScore,
                quantile_used: None,
                alpha_effective: alpha,
            },
        },
    }
}

/// Raw order before constraints.
pub fn raw_order(s: f64, inventory_position: i64) -> f64 {
    (s - inventory_position as f64).max(0.0)
}
