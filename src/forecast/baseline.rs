//! Baseline level + day-of-week model.
//!
//! Fit on promo-free, non-censored observations strictly before the
//! horizon. The level is the training mean; day-of-week factors are
//! estimated only when every weekday has enough samples, otherwise the
//! model is level-only. An empty or degenerate training set predicts zero
//! for every date.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy)]
pub struct BaselineConfig {
    pub min_samples_for_dow: usize,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            min_samples_for_dow: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineModel {
    pub level: f64,
    /// Multiplicative factors indexed by weekday (Mon=0); None = level only.
    pub dow_factors: Option<[f64; 7]>,
}

impl BaselineModel {
    pub fn fit(observations: &[(NaiveDate, f64)], config: &BaselineConfig) -> Self {
        if observations.is_empty() {
            return Self {
                level: 0.0,
                dow_factors: None,
            };
        }

        let level =
            observations.iter().map(|(_, v)| v).sum::<f64>() / observations.len() as f64;
        if level <= 0.0 {
            return Self {
                level: 0.0,
                dow_factors: None,
            };
        }

        let mut sums = [0.0f64; 7];
        let mut counts = [0usize; 7];
        for (date, value) in observations {
            let idx = date.weekday().num_days_from_monday() as usize;
            sums[idx] += value;
            counts[idx] += 1;
        }

        if counts.iter().any(|c| *c < config.min_samples_for_dow) {
            return Self {
                level,
                dow_factors: None,
            };
        }

        let mut factors = [1.0f64; 7];
        for idx in 0..7 {
            factors[idx] = (sums[idx] / counts[idx] as f64) / level;
        }
        // Normalize so the factors average to one and the weekly total is
        // preserved.
        let mean_factor = factors.iter().sum::<f64>() / 7.0;
        if mean_factor > 0.0 {
            for f in &mut factors {
                *f /= mean_factor;
            }
        }

        Self {
            level,
            dow_factors: Some(factors),
        }
    }

    pub fn predict(&self, date: NaiveDate) -> f64 {
        match &self.dow_factors {
            Some(factors) => {
                self.level * factors[date.weekday().num_days_from_monday() as usize]
            }
            None => self.level,
        }
    }

    /// Standard deviation of in-sample residuals.
    pub fn residual_std(&self, observations: &[(NaiveDate, f64)]) -> f64 {
        if observations.len() < 2 {
            return 0.0;
        }
        let residuals: Vec<f64> = observations
            .iter()
            .map(|(date, value)| value - self.predict(*date))
            .collect();
        let mean = residuals.iter().sum::<f64>() / residuals.len() as f64;
        let var = residuals.iter().map(|r| (r - mean).powi(2)).sum::<f64>()
            / (residuals.len() - 1) as f64;
        var.sqrt()
    }
}
