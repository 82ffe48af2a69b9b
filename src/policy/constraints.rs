//! Deterministic order-constraint pipeline.
//!
//! Applied in order, each step recorded in the trace:
//! 1. pack size: round up to a pack multiple,
//! 2. MOQ: below the minimum collapses to zero,
//! 3. max-stock cap: IP + Q must not exceed max_stock; capping re-rounds
//!    down to a pack multiple,
//! 4. shelf-life penalty: when the demand-adjusted forward waste risk of
//!    the capped order crosses the threshold, soft mode scales the order
//!    down (re-rounded to pack), hard mode zeroes it.

use serde::{Deserialize, Serialize};

use crate::config::settings::ShelfLifePolicySettings;
use crate::models::{Sku, WastePenaltyMode};
use crate::stock::WasteProjection;

/// Shelf-life inputs for step 4. `project` evaluates the waste projection
/// for a hypothetical receipt of the given quantity.
pub struct ShelfLifeCheck<'a> {
    pub settings: &'a ShelfLifePolicySettings,
    pub project: &'a dyn Fn(i64) -> WasteProjection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintOutcome {
    pub q_raw: f64,
    pub q_final: i64,
    pub constraints_applied: Vec<String>,
    pub capped_by_max_stock: bool,
    pub shelf_life_penalty_applied: bool,
    pub forward_waste_risk_pct: f64,
    pub expected_waste_qty: f64,
}

fn round_up_to_pack(qty: i64, pack_size: i64) -> i64 {
    let pack = pack_size.max(1);
    ((qty + pack - 1) / pack) * pack
}

fn round_down_to_pack(qty: i64, pack_size: i64) -> i64 {
    let pack = pack_size.max(1);
    (qty / pack) * pack
}

pub fn apply_order_constraints(
    q_raw: f64,
    sku: &Sku,
    inventory_position: i64,
    shelf_life: Option<&ShelfLifeCheck>,
) -> ConstraintOutcome {
    let mut outcome = ConstraintOutcome {
        q_raw,
        ..Default::default()
    };
    let pack = sku.pack_size.max(1);

    // 1. Pack size.
    let q_units = q_raw.max(0.0).ceil() as i64;
    let q1 = round_up_to_pack(q_units, pack);
    if q1 != q_units {
        outcome
            .constraints_applied
            .push(format!("pack_size: {} -> {}", q_units, q1));
    }

    // 2. MOQ.
    let q2 = if sku.moq > 0 && q1 > 0 && q1 < sku.moq {
        outcome
            .constraints_applied
            .push(format!("moq: {} -> 0 (moq {})", q1, sku.moq));
        0
    } else {
        q1
    };

    // 3. Max-stock cap. A capped quantity that falls below the MOQ
    // collapses to zero so the MOQ invariant survives the reduction.
    let q3 = if sku.max_stock > 0 && q2 > 0 {
        let headroom = (sku.max_stock - inventory_position).max(0);
        if q2 > headroom {
            let capped = enforce_moq(
                round_down_to_pack(headroom, pack),
                sku.moq,
                &mut outcome.constraints_applied,
            );
            outcome.capped_by_max_stock = true;
            outcome
                .constraints_applied
                .push(format!("max_stock_cap: {} -> {}", q2, capped));
            capped
        } else {
            q2
        }
    } else {
        q2
    };

    // 4. Shelf-life penalty.
    let q4 = match shelf_life {
        Some(check)
            if check.settings.enabled && sku.is_perishable() && q3 > 0 =>
        {
            let mode = effective_penalty_mode(sku, check.settings);
            if mode == WastePenaltyMode::Off {
                q3
            } else {
                let projection = (check.project)(q3);
                outcome.forward_waste_risk_pct = projection.waste_risk_adjusted;
                outcome.expected_waste_qty = projection.expected_waste_qty;

                let threshold = if sku.waste_risk_threshold > 0.0 {
                    sku.waste_risk_threshold
                } else {
                    check.settings.waste_risk_threshold
                };
                if projection.waste_risk_adjusted >= threshold {
                    outcome.shelf_life_penalty_applied = true;
                    match mode {
                        WastePenaltyMode::Hard => {
                            outcome
                                .constraints_applied
                                .push(format!("shelf_life_penalty(hard): {} -> 0", q3));
                            0
                        }
                        WastePenaltyMode::Soft => {
                            let factor = if sku.waste_penalty_factor > 0.0 {
                                sku.waste_penalty_factor
                            } else {
                                check.settings.waste_penalty_factor
                            };
                            let reduced = (q3 as f64 * (1.0 - factor)).floor() as i64;
                            let repacked = enforce_moq(
                                round_down_to_pack(reduced, pack),
                                sku.moq,
                                &mut outcome.constraints_applied,
                            );
                            outcome.constraints_applied.push(format!(
                                "shelf_life_penalty(soft): {} -> {}",
                                q3, repacked
                            ));
                            repacked
                        }
                        WastePenaltyMode::Off => q3,
                    }
                } else {
                    q3
                }
            }
        }
        _ => q3,
    };

    outcome.q_final = q4.max(0);
    outcome
}

fn enforce_moq(qty: i64, moq: i64, trace: &mut Vec<String>) -> i64 {
    if moq > 0 && qty > 0 && qty < moq {
        trace.push(format!("moq: {} -> 0 (moq {})", qty, moq));
        0
    } else {
        qty
    }
}

fn effective_penalty_mode(sku: &Sku, settings: &ShelfLifePolicySettings) -> WastePenaltyMode {
    if sku.waste_penalty_mode != WastePenaltyMode::Off {
        sku.waste_penalty_mode
    } else {
        WastePenaltyMode::parse(&settings.waste_penalty_mode)
    }
}
