//! Monte-Carlo protection-period demand distribution.
//!
//! N daily paths of length P are simulated from the historical non-promo,
//! non-censored sales; each trajectory contributes one total D_P[i]. The
//! result carries mu, sigma, and the standard quantile ladder keyed by
//! two-decimal strings ("0.50" ... "0.98").
//!
//! # Invariants
//!
//! - Identical (seed, inputs) produce an identical distribution.
//! - The quantile map is non-decreasing in alpha.

use std::collections::BTreeMap;

use rand::distributions::Distribution;
use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;

use crate::errors::{DomainError, DomainResult};

/// Quantile levels exported for every simulated distribution.
pub const QUANTILE_LEVELS: [f64; 5] = [0.50, 0.80, 0.90, 0.95, 0.98];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McDistribution {
    Empirical,
    Normal,
    Lognormal,
    Residuals,
}

impl McDistribution {
    pub fn as_str(&self) -> &'static str {
        match self {
            McDistribution::Empirical => "empirical",
            McDistribution::Normal => "normal",
            McDistribution::Lognormal => "lognormal",
            McDistribution::Residuals => "residuals",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "empirical" => Ok(McDistribution::Empirical),
            "normal" => Ok(McDistribution::Normal),
            "lognormal" => Ok(McDistribution::Lognormal),
            "residuals" => Ok(McDistribution::Residuals),
            other => Err(DomainError::business_rule(format!(
                "invalid monte carlo distribution: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct McParams {
    pub n_simulations: usize,
    pub seed: u64,
    pub distribution: McDistribution,
}

/// Simulated distribution of total demand over the protection period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandDistribution {
    pub mu: f64,
    pub sigma: f64,
    /// Quantiles keyed by stringified alpha with two decimals.
    pub quantiles: BTreeMap<String, f64>,
    pub n_simulations: usize,
    pub seed: u64,
    pub distribution: String,
    pub horizon_days: usize,
}

pub fn quantile_key(alpha: f64) -> String {
    format!("{:.2}", alpha)
}

/// Simulate D_P from daily history values.
pub fn simulate_protection_demand(
    history: &[f64],
    p_days: usize,
    params: &McParams,
) -> DemandDistribution {
    let n = params.n_simulations.max(1);

    if history.is_empty() || p_days == 0 {
        let quantiles = QUANTILE_LEVELS
            .iter()
            .map(|q| (quantile_key(*q), 0.0))
            .collect();
        return DemandDistribution {
            mu: 0.0,
            sigma: 0.0,
            quantiles,
            n_simulations: n,
            seed: params.seed,
            distribution: params.distribution.as_str().to_string(),
            horizon_days: p_days,
        };
    }

    let mean = history.iter().sum::<f64>() / history.len() as f64;
    let var = if history.len() > 1 {
        history.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (history.len() - 1) as f64
    } else {
        0.0
    };
    let std = var.sqrt();

    // Log-space moments for the lognormal path (shifted by one so zero
    // sales days stay representable).
    let logs: Vec<f64> = history.iter().map(|v| (v + 1.0).ln()).collect();
    let log_mean = logs.iter().sum::<f64>() / logs.len() as f64;
    let log_var = if logs.len() > 1 {
        logs.iter().map(|v| (v - log_mean).powi(2)).sum::<f64>() / (logs.len() - 1) as f64
    } else {
        0.0
    };
    let log_std = log_var.sqrt();

    // Residual pool around the mean for the residuals path.
    let residuals: Vec<f64> = history.iter().map(|v| v - mean).collect();

    let normal = Normal::new(mean, std.max(f64::EPSILON)).ok();
    let log_normal = Normal::new(log_mean, log_std.max(f64::EPSILON)).ok();

    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let mut sums: Vec<f64> = Vec::with_capacity(n);
    for _ in 0..n {
        let mut total = 0.0;
        for _ in 0..p_days {
            let draw = match params.distribution {
                McDistribution::Empirical => history[rng.gen_range(0..history.len())],
                McDistribution::Normal => match &normal {
                    Some(dist) => dist.sample(&mut rng),
                    None => mean,
                },
                McDistribution::Lognormal => match &log_normal {
                    Some(dist) => dist.sample(&mut rng).exp() - 1.0,
                    None => mean,
                },
                McDistribution::Residuals => {
                    mean + residuals[rng.gen_range(0..residuals.len())]
                }
            };
            total += draw.max(0.0);
        }
        sums.push(total);
    }

    sums.sort_by(|a, b| a.partial_cmp(b).expect("simulated sums are finite"));
    let mu = sums.iter().sum::<f64>() / sums.len() as f64;
    let sigma = {
        let v = sums.iter().map(|s| (s - mu).powi(2)).sum::<f64>() / sums.len() as f64;
        v.sqrt()
    };

    let quantiles = QUANTILE_LEVELS
        .iter()
        .map(|q| (quantile_key(*q), empirical_quantile(&sums, *q)))
        .collect();

    DemandDistribution {
        mu,
        sigma,
        quantiles,
        n_simulations: n,
        seed: params.seed,
        distribution: params.distribution.as_str().to_string(),
        horizon_days: p_days,
    }
}

/// Quantile of a sorted sample by linear interpolation between order
/// statistics.
fn empirical_quantile(sorted: &[f64], alpha: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let position = alpha.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let weight = position - lower as f64;
        sorted[lower] * (1.0 - weight) + sorted[upper] * weight
    }
}

impl DemandDistribution {
    /// Tabulated quantile lookup by alpha, exact string-key match.
    pub fn quantile(&self, alpha: f64) -> Option<f64> {
        self.quantiles.get(&quantile_key(alpha)).copied()
    }
}
