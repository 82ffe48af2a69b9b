//! FEFO lot accounting and forward waste projection.
//!
//! Usable stock excludes lots whose remaining shelf life is below the SKU's
//! minimum. Waste risk looks only at usable lots: stock already below the
//! minimum is written off, not "at risk". When the lot total disagrees with
//! the ledger beyond tolerance, the projection degrades to the conservative
//! 100% so the shelf-life penalty errs on the side of ordering less.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::Lot;

/// Lot/ledger disagreement tolerated before the conservative fallback.
pub const LOT_LEDGER_TOLERANCE: i64 = 0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsableStock {
    pub total: i64,
    pub usable: i64,
    pub unusable: i64,
}

fn days_left(lot: &Lot, today: NaiveDate) -> Option<i64> {
    lot.expiry_date
        .map(|expiry| (expiry - today).num_days())
}

/// Split lot stock into usable and unusable by remaining shelf life.
/// Lots without an expiry date are always usable.
pub fn usable_split(lots: &[Lot], today: NaiveDate, min_shelf_life_days: i64) -> UsableStock {
    let mut out = UsableStock::default();
    for lot in lots {
        out.total += lot.qty_on_hand;
        match days_left(lot, today) {
            Some(days) if days < min_shelf_life_days => out.unusable += lot.qty_on_hand,
            _ => out.usable += lot.qty_on_hand,
        }
    }
    out
}

/// Quantity in lots with 0 <= days-left <= `horizon_days` (expiry alerts
/// and reporting; waste risk uses the usable-at-risk subset instead).
pub fn expiring_soon(lots: &[Lot], today: NaiveDate, horizon_days: i64) -> i64 {
    lots.iter()
        .filter_map(|lot| days_left(lot, today).map(|d| (d, lot.qty_on_hand)))
        .filter(|(d, _)| *d >= 0 && *d <= horizon_days)
        .map(|(_, qty)| qty)
        .sum()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WasteProjection {
    /// Risk with zero expected demand: usable stock expiring within the
    /// horizon as a share of total stock plus the hypothetical order.
    pub waste_risk_traditional: f64,
    /// Risk after expected demand is consumed FEFO.
    pub waste_risk_adjusted: f64,
    /// Units projected to expire unsold within the horizon.
    pub expected_waste_qty: f64,
}

/// Project waste risk after a hypothetical receipt of `order_qty` with
/// expiry `order_expiry`, consuming `daily_demand` (one value per horizon
/// day) in FEFO order.
///
/// Demand is allocated lot by lot in FEFO order: a lot can only absorb the
/// demand that falls before its expiry and that earlier lots have not
/// already taken. Whatever remains in a lot expiring inside the horizon is
/// expected waste.
pub fn project_waste_after_receipt(
    lots: &[Lot],
    today: NaiveDate,
    min_shelf_life_days: i64,
    daily_demand: &[f64],
    order_qty: i64,
    order_expiry: Option<NaiveDate>,
) -> WasteProjection {
    let horizon_days = daily_demand.len() as i64;

    // FEFO working set: usable lots plus the hypothetical order lot.
    let mut working: Vec<(i64, f64)> = Vec::new(); // (days_left, qty)
    let mut total: f64 = 0.0;
    for lot in lots {
        total += lot.qty_on_hand as f64;
        match days_left(lot, today) {
            Some(days) if days < min_shelf_life_days => {} // written off already
            Some(days) => working.push((days, lot.qty_on_hand as f64)),
            None => working.push((i64::MAX, lot.qty_on_hand as f64)),
        }
    }
    if order_qty > 0 {
        total += order_qty as f64;
        let days = order_expiry
            .map(|e| (e - today).num_days())
            .unwrap_or(i64::MAX);
        working.push((days, order_qty as f64));
    }
    working.sort_by_key(|(days, _)| *days);

    if total <= 0.0 {
        return WasteProjection::default();
    }

    // Cumulative demand by day offset.
    let mut cum = vec![0.0f64; daily_demand.len() + 1];
    for (i, d) in daily_demand.iter().enumerate() {
        cum[i + 1] = cum[i] + d.max(0.0);
    }
    let total_demand = *cum.last().unwrap_or(&0.0);

    let mut traditional_waste = 0.0;
    let mut adjusted_waste = 0.0;
    let mut demand_consumed = 0.0;

    for (days, qty) in &working {
        let demand_window = if *days >= horizon_days {
            total_demand
        } else {
            // Demand that falls strictly before this lot expires.
            cum[(*days).clamp(0, horizon_days) as usize]
        };
        let sold = qty.min((demand_window - demand_consumed).max(0.0));
        demand_consumed += sold;
        if *days <= horizon_days {
            traditional_waste += qty;
            adjusted_waste += qty - sold;
        }
    }

    WasteProjection {
        waste_risk_traditional: 100.0 * traditional_waste / total,
        waste_risk_adjusted: 100.0 * adjusted_waste / total,
        expected_waste_qty: adjusted_waste,
    }
}

/// Conservative projection used when lots disagree with the ledger.
pub fn conservative_projection() -> WasteProjection {
    WasteProjection {
        waste_risk_traditional: 100.0,
        waste_risk_adjusted: 100.0,
        expected_waste_qty: 0.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpiryAlertLevel {
    Critical,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpiryAlert {
    pub lot_id: String,
    pub sku: String,
    pub qty_on_hand: i64,
    pub days_left: i64,
    pub level: ExpiryAlertLevel,
}

/// Scan a lot book for stock nearing expiry. Already-expired lots alert as
/// critical with their (negative) days-left.
pub fn scan_expiry_alerts(
    lots: &[Lot],
    today: NaiveDate,
    critical_threshold_days: i64,
    warning_threshold_days: i64,
) -> Vec<ExpiryAlert> {
    let mut alerts: Vec<ExpiryAlert> = lots
        .iter()
        .filter(|lot| lot.qty_on_hand > 0)
        .filter_map(|lot| {
            let days = days_left(lot, today)?;
            let level = if days <= critical_threshold_days {
                ExpiryAlertLevel::Critical
            } else if days <= warning_threshold_days {
                ExpiryAlertLevel::Warning
            } else {
                return None;
            };
            Some(ExpiryAlert {
                lot_id: lot.lot_id.clone(),
                sku: lot.sku.clone(),
                qty_on_hand: lot.qty_on_hand,
                days_left: days,
                level,
            })
        })
        .collect();
    alerts.sort_by_key(|a| a.days_left);
    alerts
}
