//! Settings option tree.
//!
//! A closed, typed tree with defaults for every recognized key. The blob is
//! stored as JSON in the one-row `settings` table. Unknown keys at any
//! level are collected into flattened maps so they are ignored on read but
//! preserved when the blob is written back.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::DemandVariability;

/// Replenishment policy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    Legacy,
    Csl,
}

impl Default for PolicyMode {
    fn default() -> Self {
        PolicyMode::Csl
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub reorder_engine: ReorderEngineSettings,
    pub service_level: ServiceLevelSettings,
    pub monte_carlo: MonteCarloSettings,
    pub auto_variability: AutoVariabilitySettings,
    pub shelf_life_policy: ShelfLifePolicySettings,
    pub event_uplift: EventUpliftSettings,
    pub promo_uplift: PromoUpliftSettings,
    pub intermittent_forecast: IntermittentForecastSettings,
    pub expiry_alerts: ExpiryAlertSettings,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reorder_engine: ReorderEngineSettings::default(),
            service_level: ServiceLevelSettings::default(),
            monte_carlo: MonteCarloSettings::default(),
            auto_variability: AutoVariabilitySettings::default(),
            shelf_life_policy: ShelfLifePolicySettings::default(),
            event_uplift: EventUpliftSettings::default(),
            promo_uplift: PromoUpliftSettings::default(),
            intermittent_forecast: IntermittentForecastSettings::default(),
            expiry_alerts: ExpiryAlertSettings::default(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReorderEngineSettings {
    pub lead_time_days: i64,
    pub review_period_days: i64,
    pub min_stock: i64,
    pub days_cover: i64,
    pub moq: i64,
    pub max_stock: i64,
    pub reorder_point: f64,
    pub demand_variability: String,
    pub policy_mode: PolicyMode,
    pub forecast_method: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ReorderEngineSettings {
    fn default() -> Self {
        Self {
            lead_time_days: 1,
            review_period_days: 1,
            min_stock: 0,
            days_cover: 7,
            moq: 0,
            max_stock: 0,
            reorder_point: 0.0,
            demand_variability: "STABLE".to_string(),
            policy_mode: PolicyMode::Csl,
            forecast_method: "monte_carlo".to_string(),
            extra: Map::new(),
        }
    }
}

/// Per-cluster CSL targets; keys match the stored variability labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariabilityClusterCsl {
    #[serde(rename = "STABLE")]
    pub stable: f64,
    #[serde(rename = "LOW")]
    pub low: f64,
    #[serde(rename = "SEASONAL")]
    pub seasonal: f64,
    #[serde(rename = "HIGH")]
    pub high: f64,
}

impl Default for VariabilityClusterCsl {
    fn default() -> Self {
        Self {
            stable: 0.92,
            low: 0.90,
            seasonal: 0.95,
            high: 0.95,
        }
    }
}

impl VariabilityClusterCsl {
    pub fn for_cluster(&self, cluster: DemandVariability) -> f64 {
        match cluster {
            DemandVariability::Stable => self.stable,
            DemandVariability::Low => self.low,
            DemandVariability::Seasonal => self.seasonal,
            DemandVariability::High => self.high,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceLevelSettings {
    pub default_csl: f64,
    pub variability_cluster_csl: VariabilityClusterCsl,
    pub perishable_csl: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ServiceLevelSettings {
    fn default() -> Self {
        Self {
            default_csl: 0.95,
            variability_cluster_csl: VariabilityClusterCsl::default(),
            perishable_csl: 0.98,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloSettings {
    pub distribution: String,
    pub n_simulations: i64,
    pub random_seed: i64,
    pub output_stat: String,
    pub output_percentile: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for MonteCarloSettings {
    fn default() -> Self {
        Self {
            distribution: "empirical".to_string(),
            n_simulations: 1000,
            random_seed: 42,
            output_stat: "percentile".to_string(),
            output_percentile: 0.95,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoVariabilitySettings {
    pub enabled: bool,
    pub min_observations: i64,
    pub stable_percentile: f64,
    pub high_percentile: f64,
    pub seasonal_threshold: f64,
    pub fallback_category: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for AutoVariabilitySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            min_observations: 28,
            stable_percentile: 0.30,
            high_percentile: 0.80,
            seasonal_threshold: 0.35,
            fallback_category: "STABLE".to_string(),
            extra: Map::new(),
        }
    }
}

/// Per-cluster shelf-life overrides; zero means "use the global value".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShelfLifeCategoryOverrides {
    #[serde(rename = "STABLE")]
    pub stable: f64,
    #[serde(rename = "LOW")]
    pub low: f64,
    #[serde(rename = "HIGH")]
    pub high: f64,
    #[serde(rename = "SEASONAL")]
    pub seasonal: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShelfLifePolicySettings {
    pub enabled: bool,
    pub min_shelf_life_global: i64,
    pub waste_penalty_mode: String,
    pub waste_penalty_factor: f64,
    pub waste_risk_threshold: f64,
    pub waste_horizon_days: i64,
    pub waste_realization_factor: f64,
    pub category_overrides: ShelfLifeCategoryOverrides,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ShelfLifePolicySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            min_shelf_life_global: 0,
            waste_penalty_mode: "soft".to_string(),
            waste_penalty_factor: 0.5,
            waste_risk_threshold: 20.0,
            waste_horizon_days: 14,
            waste_realization_factor: 0.5,
            category_overrides: ShelfLifeCategoryOverrides::default(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventUpliftSettings {
    pub enabled: bool,
    pub default_quantile: f64,
    pub min_factor: f64,
    pub max_factor: f64,
    pub apply_to: String,
    pub beta_normalization_mode: String,
    pub perishables_policy: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for EventUpliftSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            default_quantile: 0.80,
            min_factor: 0.5,
            max_factor: 3.0,
            apply_to: "delivery_date".to_string(),
            beta_normalization_mode: "none".to_string(),
            perishables_policy: "include".to_string(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromoUpliftSettings {
    pub min_uplift: f64,
    pub max_uplift: f64,
    pub min_events_sku: i64,
    pub min_valid_days_sku: i64,
    pub min_events_category: i64,
    pub min_events_department: i64,
    pub winsorize_trim_percent: f64,
    pub denominator_epsilon: f64,
    pub confidence_threshold_a: i64,
    pub confidence_threshold_b: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for PromoUpliftSettings {
    fn default() -> Self {
        Self {
            min_uplift: 1.0,
            max_uplift: 3.0,
            min_events_sku: 2,
            min_valid_days_sku: 3,
            min_events_category: 4,
            min_events_department: 8,
            winsorize_trim_percent: 10.0,
            denominator_epsilon: 0.1,
            confidence_threshold_a: 4,
            confidence_threshold_b: 2,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntermittentForecastSettings {
    pub enabled: bool,
    pub adi_threshold: f64,
    pub cv2_threshold: f64,
    pub alpha_default: f64,
    pub lookback_days: i64,
    pub backtest_enabled: bool,
    pub backtest_periods: i64,
    pub backtest_metric: String,
    pub backtest_min_history: i64,
    pub default_method: String,
    pub fallback_to_simple: bool,
    pub obsolescence_window: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for IntermittentForecastSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            adi_threshold: 1.32,
            cv2_threshold: 0.49,
            alpha_default: 0.1,
            lookback_days: 180,
            backtest_enabled: true,
            backtest_periods: 4,
            backtest_metric: "wmape".to_string(),
            backtest_min_history: 28,
            default_method: "sba".to_string(),
            fallback_to_simple: true,
            obsolescence_window: 90,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpiryAlertSettings {
    pub critical_threshold_days: i64,
    pub warning_threshold_days: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ExpiryAlertSettings {
    fn default() -> Self {
        Self {
            critical_threshold_days: 2,
            warning_threshold_days: 5,
            extra: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_spec_constants() {
        let s = Settings::default();
        assert_eq!(s.intermittent_forecast.adi_threshold, 1.32);
        assert_eq!(s.intermittent_forecast.cv2_threshold, 0.49);
        assert_eq!(s.intermittent_forecast.default_method, "sba");
        assert_eq!(s.monte_carlo.n_simulations, 1000);
        assert_eq!(s.service_level.variability_cluster_csl.stable, 0.92);
        assert_eq!(s.event_uplift.min_factor, 0.5);
        assert_eq!(s.event_uplift.max_factor, 3.0);
        assert_eq!(s.promo_uplift.winsorize_trim_percent, 10.0);
    }

    #[test]
    fn unknown_keys_round_trip() {
        let raw = r#"{
            "monte_carlo": {"n_simulations": 500, "future_knob": "kept"},
            "experimental_section": {"x": 1}
        }"#;
        let settings: Settings = serde_json::from_str(raw).unwrap();
        assert_eq!(settings.monte_carlo.n_simulations, 500);
        // Unrecognized keys are ignored for behavior...
        assert_eq!(settings.monte_carlo.distribution, "empirical");
        // ...but preserved on write-back.
        let out = serde_json::to_value(&settings).unwrap();
        assert_eq!(out["monte_carlo"]["future_knob"], "kept");
        assert_eq!(out["experimental_section"]["x"], 1);
    }

    #[test]
    fn policy_mode_parses_lowercase() {
        let s: Settings =
            serde_json::from_str(r#"{"reorder_engine": {"policy_mode": "legacy"}}"#).unwrap();
        assert_eq!(s.reorder_engine.policy_mode, PolicyMode::Legacy);
    }
}
