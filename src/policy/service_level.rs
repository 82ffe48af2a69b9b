//! Service-level (alpha) resolution and variability handling.
//!
//! Resolution order, first set value wins:
//! 1. the SKU's own target_csl,
//! 2. the perishability rule (shelf life of a week or less),
//! 3. the variability cluster target,
//! 4. the global default.

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::config::settings::AutoVariabilitySettings;
use crate::config::Settings;
use crate::models::{DemandVariability, Sku};

/// Shelf life at or below this many days forces the perishable CSL.
const PERISHABLE_CSL_SHELF_LIFE_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlphaResolution {
    pub alpha: f64,
    /// Which rung of the ladder decided: "sku_override", "perishable",
    /// "variability_cluster", "global_default".
    pub source: String,
}

pub fn resolve_alpha(sku: &Sku, settings: &Settings) -> AlphaResolution {
    if sku.target_csl > 0.0 && sku.target_csl < 1.0 {
        return AlphaResolution {
            alpha: sku.target_csl,
            source: "sku_override".to_string(),
        };
    }
    if sku.shelf_life_days > 0 && sku.shelf_life_days <= PERISHABLE_CSL_SHELF_LIFE_DAYS {
        return AlphaResolution {
            alpha: settings.service_level.perishable_csl,
            source: "perishable".to_string(),
        };
    }
    if let Some(cluster) = sku.demand_variability {
        return AlphaResolution {
            alpha: settings
                .service_level
                .variability_cluster_csl
                .for_cluster(cluster),
            source: "variability_cluster".to_string(),
        };
    }
    AlphaResolution {
        alpha: settings.service_level.default_csl,
        source: "global_default".to_string(),
    }
}

/// Multiplier applied to the legacy safety_stock field before use.
pub fn safety_stock_multiplier(variability: Option<DemandVariability>) -> f64 {
    match variability {
        Some(DemandVariability::High) => 1.5,
        Some(DemandVariability::Stable) => 0.8,
        _ => 1.0,
    }
}

/// Derive a variability cluster from sales history when the SKU has none.
///
/// CV of the daily series against the configured cluster cuts; a strong
/// day-of-week signal classifies as seasonal first. Falls back to the
/// configured category when history is too short.
pub fn auto_classify_variability(
    observations: &[(chrono::NaiveDate, f64)],
    settings: &AutoVariabilitySettings,
) -> Option<DemandVariability> {
    if !settings.enabled {
        return None;
    }
    if (observations.len() as i64) < settings.min_observations {
        return DemandVariability::parse(&settings.fallback_category);
    }

    let values: Vec<f64> = observations.iter().map(|(_, v)| *v).collect();
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if mean <= 0.0 {
        return DemandVariability::parse(&settings.fallback_category);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    let cv = var.sqrt() / mean;

    // Seasonality probe: dispersion of weekday means relative to the level.
    let mut sums = [0.0f64; 7];
    let mut counts = [0usize; 7];
    for (date, value) in observations {
        let idx = date.weekday().num_days_from_monday() as usize;
        sums[idx] += value;
        counts[idx] += 1;
    }
    let weekday_means: Vec<f64> = (0..7)
        .filter(|i| counts[*i] > 0)
        .map(|i| sums[i] / counts[i] as f64)
        .collect();
    if weekday_means.len() == 7 {
        let wm_mean = weekday_means.iter().sum::<f64>() / 7.0;
        let wm_var = weekday_means
            .iter()
            .map(|v| (v - wm_mean).powi(2))
            .sum::<f64>()
            / 7.0;
        if wm_mean > 0.0 && wm_var.sqrt() / wm_mean > settings.seasonal_threshold {
            return Some(DemandVariability::Seasonal);
        }
    }

    if cv <= settings.stable_percentile {
        Some(DemandVariability::Stable)
    } else if cv >= settings.high_percentile {
        Some(DemandVariability::High)
    } else {
        Some(DemandVariability::Low)
    }
}
