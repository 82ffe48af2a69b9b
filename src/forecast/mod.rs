//! Forecast Engine
//!
//! Builds the protection-period demand picture for one SKU:
//!
//! - a per-date baseline over the horizon (level + day-of-week),
//! - optionally a simulated distribution D_P of total demand over the
//!   protection period (Monte-Carlo, seeded), and
//! - mu_P / sigma_P for the z-score policy paths.
//!
//! # Determinism Contract
//!
//! - RNG: seeded `ChaCha8Rng` only; identical (seed, inputs) produce an
//!   identical D_P.
//! - Training data: sales with promo_flag=0 on non-censored days strictly
//!   before the horizon start. Censored days are excluded from fitting and
//!   from ADI/CV^2 classification inputs.
//!
//! Method dispatch: the SKU override wins over the global setting. When
//! `intermittent_auto` classifies the series as stable and the fallback is
//! enabled, the simple baseline path is used instead.

pub mod baseline;
pub mod intermittent;
pub mod monte_carlo;

pub use baseline::{BaselineConfig, BaselineModel};
pub use intermittent::{classify, fit_rate, IntermittentMethod, SeriesStats};
pub use monte_carlo::{DemandDistribution, McDistribution, McParams};

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::errors::{DomainError, DomainResult};
use crate::models::{SalesRecord, Sku};

#[cfg(test)]
mod forecast_tests;

/// Valid forecast method names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForecastMethod {
    Simple,
    MonteCarlo,
    IntermittentAuto,
    Croston,
    Sba,
    Tsb,
}

impl ForecastMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastMethod::Simple => "simple",
            ForecastMethod::MonteCarlo => "monte_carlo",
            ForecastMethod::IntermittentAuto => "intermittent_auto",
            ForecastMethod::Croston => "croston",
            ForecastMethod::Sba => "sba",
            ForecastMethod::Tsb => "tsb",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "simple" => Ok(ForecastMethod::Simple),
            "monte_carlo" => Ok(ForecastMethod::MonteCarlo),
            "intermittent_auto" => Ok(ForecastMethod::IntermittentAuto),
            "croston" => Ok(ForecastMethod::Croston),
            "sba" => Ok(ForecastMethod::Sba),
            "tsb" => Ok(ForecastMethod::Tsb),
            other => Err(DomainError::business_rule(format!(
                "invalid forecast method: {}",
                other
            ))),
        }
    }
}

/// Resolve the effective method for a SKU: override > global setting.
pub fn resolve_method(sku: &Sku, settings: &Settings) -> DomainResult<ForecastMethod> {
    if let Some(method) = sku.forecast_method.as_deref().filter(|m| !m.is_empty()) {
        return ForecastMethod::parse(method);
    }
    ForecastMethod::parse(&settings.reorder_engine.forecast_method)
}

/// Everything the demand pipeline and the policy need from the forecast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandForecast {
    /// Method actually used after dispatch and fallbacks.
    pub method: String,
    /// Per-date expected demand over the horizon, before uplifts.
    pub per_date: BTreeMap<NaiveDate, f64>,
    /// Simulated D_P; present only on the Monte-Carlo path.
    pub distribution: Option<DemandDistribution>,
    pub mu_p: f64,
    pub sigma_p: f64,
}

pub struct ForecastInputs<'a> {
    pub sku: &'a Sku,
    pub settings: &'a Settings,
    /// Full sales history strictly before the horizon start.
    pub sales: &'a [SalesRecord],
    pub censored: &'a BTreeSet<NaiveDate>,
    /// Protection-period dates, r1 inclusive to r2 exclusive.
    pub horizon: &'a [NaiveDate],
}

/// Eligible training values: promo-free sales on non-censored days.
fn training_values(inputs: &ForecastInputs) -> Vec<f64> {
    inputs
        .sales
        .iter()
        .filter(|s| !s.promo_flag && !inputs.censored.contains(&s.date))
        .map(|s| s.qty_sold as f64)
        .collect()
}

fn training_observations(inputs: &ForecastInputs) -> Vec<(NaiveDate, f64)> {
    inputs
        .sales
        .iter()
        .filter(|s| !s.promo_flag && !inputs.censored.contains(&s.date))
        .map(|s| (s.date, s.qty_sold as f64))
        .collect()
}

fn mc_params(sku: &Sku, settings: &Settings) -> DomainResult<McParams> {
    let distribution = sku
        .mc_distribution
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(&settings.monte_carlo.distribution);
    Ok(McParams {
        n_simulations: sku
            .mc_n_simulations
            .unwrap_or(settings.monte_carlo.n_simulations)
            .max(1) as usize,
        seed: sku
            .mc_random_seed
            .unwrap_or(settings.monte_carlo.random_seed) as u64,
        distribution: McDistribution::parse(distribution)?,
    })
}

/// Build the demand forecast for one SKU over the horizon.
pub fn forecast(inputs: &ForecastInputs) -> DomainResult<DemandForecast> {
    let method = resolve_method(inputs.sku, inputs.settings)?;
    forecast_with_method(inputs, method)
}

fn forecast_with_method(
    inputs: &ForecastInputs,
    method: ForecastMethod,
) -> DomainResult<DemandForecast> {
    let p_days = inputs.horizon.len();
    match method {
        ForecastMethod::Simple => Ok(simple_forecast(inputs)),
        ForecastMethod::MonteCarlo => {
            let observations = training_observations(inputs);
            let model = BaselineModel::fit(&observations, &BaselineConfig::default());
            let per_date: BTreeMap<NaiveDate, f64> = inputs
                .horizon
                .iter()
                .map(|d| (*d, model.predict(*d)))
                .collect();
            let values = training_values(inputs);
            let params = mc_params(inputs.sku, inputs.settings)?;
            let distribution =
                monte_carlo::simulate_protection_demand(&values, p_days, &params);
            let (mu_p, sigma_p) = (distribution.mu, distribution.sigma);
            Ok(DemandForecast {
                method: ForecastMethod::MonteCarlo.as_str().to_string(),
                per_date,
                distribution: Some(distribution),
                mu_p,
                sigma_p,
            })
        }
        ForecastMethod::Croston => Ok(intermittent_forecast(inputs, IntermittentMethod::Croston)),
        ForecastMethod::Sba => Ok(intermittent_forecast(inputs, IntermittentMethod::Sba)),
        ForecastMethod::Tsb => Ok(intermittent_forecast(inputs, IntermittentMethod::Tsb)),
        ForecastMethod::IntermittentAuto => {
            let cfg = &inputs.settings.intermittent_forecast;
            let values = training_values(inputs);
            let stats = classify(&values);
            let sparse = stats.adi > cfg.adi_threshold && stats.cv2 > cfg.cv2_threshold;
            if !sparse && cfg.fallback_to_simple {
                return Ok(simple_forecast(inputs));
            }
            let method = if (values.len() as i64) < cfg.backtest_min_history
                || !cfg.backtest_enabled
            {
                IntermittentMethod::parse(&cfg.default_method)
                    .unwrap_or(IntermittentMethod::Sba)
            } else {
                intermittent::backtest_select(
                    &values,
                    cfg.alpha_default,
                    cfg.backtest_periods.max(1) as usize,
                )
                .unwrap_or_else(|| {
                    IntermittentMethod::parse(&cfg.default_method)
                        .unwrap_or(IntermittentMethod::Sba)
                })
            };
            Ok(intermittent_forecast(inputs, method))
        }
    }
}

/// Simple path: baseline level + DOW; mu_P is the horizon sum and sigma_P
/// comes from the residual standard deviation scaled by sqrt(P).
fn simple_forecast(inputs: &ForecastInputs) -> DemandForecast {
    let observations = training_observations(inputs);
    let model = BaselineModel::fit(&observations, &BaselineConfig::default());
    let per_date: BTreeMap<NaiveDate, f64> = inputs
        .horizon
        .iter()
        .map(|d| (*d, model.predict(*d)))
        .collect();
    let mu_p: f64 = per_date.values().sum();
    let residual_std = model.residual_std(&observations);
    let sigma_p = residual_std * (inputs.horizon.len() as f64).sqrt();
    DemandForecast {
        method: ForecastMethod::Simple.as_str().to_string(),
        per_date,
        distribution: None,
        mu_p,
        sigma_p,
    }
}

/// Intermittent path: flat daily rate over the horizon; sigma_P from a
/// seeded bootstrap over the non-zero demand sizes.
fn intermittent_forecast(inputs: &ForecastInputs, method: IntermittentMethod) -> DemandForecast {
    let cfg = &inputs.settings.intermittent_forecast;
    let values = training_values(inputs);
    let rate = fit_rate(&values, method, cfg.alpha_default);
    let per_date: BTreeMap<NaiveDate, f64> =
        inputs.horizon.iter().map(|d| (*d, rate)).collect();
    let p = inputs.horizon.len();
    let mu_p = rate * p as f64;
    let sigma_p = bootstrap_sigma(
        &values,
        p,
        inputs
            .sku
            .mc_random_seed
            .unwrap_or(inputs.settings.monte_carlo.random_seed) as u64,
    );
    DemandForecast {
        method: method.as_str().to_string(),
        per_date,
        distribution: None,
        mu_p,
        sigma_p,
    }
}

/// Bootstrap sigma_P for intermittent series: resample P days where demand
/// occurs with the empirical frequency and sizes are drawn from the
/// non-zero pool.
fn bootstrap_sigma(values: &[f64], p_days: usize, seed: u64) -> f64 {
    const BOOTSTRAP_ROUNDS: usize = 200;

    let nonzero: Vec<f64> = values.iter().copied().filter(|v| *v > 0.0).collect();
    if nonzero.is_empty() || values.is_empty() || p_days == 0 {
        return 0.0;
    }
    let demand_prob = nonzero.len() as f64 / values.len() as f64;

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut sums = Vec::with_capacity(BOOTSTRAP_ROUNDS);
    for _ in 0..BOOTSTRAP_ROUNDS {
        let mut sum = 0.0;
        for _ in 0..p_days {
            if rng.gen::<f64>() < demand_prob {
                sum += nonzero[rng.gen_range(0..nonzero.len())];
            }
        }
        sums.push(sum);
    }
    let mean = sums.iter().sum::<f64>() / sums.len() as f64;
    let var = sums.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / sums.len() as f64;
    var.sqrt()
}
