//! OrderExplain: the full, reproducible decision record for a proposal.
//!
//! Serializable as JSON (persisted on confirmed order logs) and exportable
//! as a fixed-column table, one row per proposal. The column list is part
//! of the interface; new fields append, they never reorder.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::Lane;
use crate::demand::{EventUpliftExplain, PromoUpliftExplain, WasteAdjustExplain};
use crate::policy::reorder::ReorderPointMethod;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McMetadata {
    pub n_simulations: usize,
    pub seed: u64,
    pub distribution: String,
    pub horizon_days: usize,
    pub output_percentile: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderExplain {
    pub sku: String,
    pub order_date: NaiveDate,
    pub receipt_date: NaiveDate,
    pub lane: Lane,
    pub p_days: i64,
    pub alpha_target: f64,
    pub alpha_effective: f64,
    pub alpha_source: String,
    /// Forecast method actually used after dispatch.
    pub forecast_method: String,
    pub reorder_point_method: ReorderPointMethod,
    pub quantile_used: Option<f64>,
    pub s: f64,
    pub mu_p: f64,
    pub sigma_p: f64,
    pub inventory_position: i64,
    pub baseline_map: BTreeMap<NaiveDate, f64>,
    pub adjusted_map: BTreeMap<NaiveDate, f64>,
    pub event_explain: EventUpliftExplain,
    pub promo_explain: PromoUpliftExplain,
    pub waste_explain: WasteAdjustExplain,
    pub mc: Option<McMetadata>,
    pub constraints_applied: Vec<String>,
    pub capped_by_max_stock: bool,
    pub shelf_life_penalty_applied: bool,
    pub forward_waste_risk_pct: f64,
    pub expected_waste_qty: f64,
    pub usable_stock: i64,
    pub unusable_stock: i64,
    pub final_qty: i64,
}

/// Fixed, ordered column list of the tabular export.
pub const EXPLAIN_COLUMNS: &[&str] = &[
    "sku",
    "order_date",
    "receipt_date",
    "lane",
    "protection_days",
    "alpha_target",
    "alpha_effective",
    "alpha_source",
    "forecast_method",
    "reorder_point_method",
    "quantile_used",
    "reorder_point_s",
    "mu_p",
    "sigma_p",
    "inventory_position",
    "baseline_total",
    "adjusted_total",
    "event_multiplier",
    "promo_uplift",
    "waste_multiplier",
    "mc_n_simulations",
    "mc_seed",
    "mc_distribution",
    "constraints_applied",
    "capped_by_max_stock",
    "shelf_life_penalty_applied",
    "forward_waste_risk_pct",
    "expected_waste_qty",
    "usable_stock",
    "unusable_stock",
    "final_qty",
];

impl OrderExplain {
    /// One export row, aligned with `EXPLAIN_COLUMNS`.
    pub fn to_row(&self) -> Vec<String> {
        let baseline_total: f64 = self.baseline_map.values().sum();
        let adjusted_total: f64 = self.adjusted_map.values().sum();
        vec![
            self.sku.clone(),
            self.order_date.format("%Y-%m-%d").to_string(),
            self.receipt_date.format("%Y-%m-%d").to_string(),
            self.lane.as_str().to_string(),
            self.p_days.to_string(),
            format!("{:.4}", self.alpha_target),
            format!("{:.4}", self.alpha_effective),
            self.alpha_source.clone(),
            self.forecast_method.clone(),
            self.reorder_point_method.as_str().to_string(),
            self.quantile_used
                .map(|q| format!("{:.2}", q))
                .unwrap_or_default(),
            format!("{:.2}", self.s),
            format!("{:.2}", self.mu_p),
            format!("{:.2}", self.sigma_p),
            self.inventory_position.to_string(),
            format!("{:.2}", baseline_total),
            format!("{:.2}", adjusted_total),
            format!("{:.4}", self.event_explain.multiplier),
            format!("{:.4}", self.promo_explain.uplift),
            format!("{:.4}", self.waste_explain.multiplier),
            self.mc
                .as_ref()
                .map(|m| m.n_simulations.to_string())
                .unwrap_or_default(),
            self.mc
                .as_ref()
                .map(|m| m.seed.to_string())
                .unwrap_or_default(),
            self.mc
                .as_ref()
                .map(|m| m.distribution.clone())
                .unwrap_or_default(),
            self.constraints_applied.join("; "),
            self.capped_by_max_stock.to_string(),
            self.shelf_life_penalty_applied.to_string(),
            format!("{:.2}", self.forward_waste_risk_pct),
            format!("{:.2}", self.expected_waste_qty),
            self.usable_stock.to_string(),
            self.unusable_stock.to_string(),
            self.final_qty.to_string(),
        ]
    }

    /// CSV export: header plus one row per explain, fields quoted when they
    /// contain separators.
    pub fn render_table(explains: &[OrderExplain]) -> String {
        let mut out = String::new();
        out.push_str(&EXPLAIN_COLUMNS.join(","));
        out.push('\n');
        for explain in explains {
            let row: Vec<String> = explain.to_row().iter().map(|f| csv_field(f)).collect();
            out.push_str(&row.join(","));
            out.push('\n');
        }
        out
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
