use std::collections::BTreeMap;

use crate::config::{PolicyMode, Settings};
use crate::forecast::monte_carlo::quantile_key;
use crate::forecast::DemandDistribution;
use crate::models::{DemandVariability, Sku, WastePenaltyMode};
use crate::policy::constraints::{apply_order_constraints, ShelfLifeCheck};
use crate::policy::reorder::{
    compute_reorder_point, raw_order, z_score, LegacyInputs, ReorderPointMethod,
};
use crate::policy::service_level::{resolve_alpha, safety_stock_multiplier};
use crate::stock::WasteProjection;

fn tabulated_distribution() -> DemandDistribution {
    let mut quantiles = BTreeMap::new();
    quantiles.insert(quantile_key(0.50), 140.0);
    quantiles.insert(quantile_key(0.80), 160.0);
    quantiles.insert(quantile_key(0.90), 175.0);
    quantiles.insert(quantile_key(0.95), 182.5);
    quantiles.insert(quantile_key(0.98), 195.0);
    DemandDistribution {
        mu: 142.0,
        sigma: 21.0,
        quantiles,
        n_simulations: 1000,
        seed: 42,
        distribution: "empirical".to_string(),
        horizon_days: 14,
    }
}

#[test]
fn alpha_ladder_resolves_in_order() {
    let settings = Settings::default();

    let mut sku = Sku::new("S1", "test");
    sku.target_csl = 0.97;
    sku.shelf_life_days = 5;
    sku.demand_variability = Some(DemandVariability::Low);
    let r = resolve_alpha(&sku, &settings);
    assert_eq!(r.alpha, 0.97);
    assert_eq!(r.source, "sku_override");

    sku.target_csl = 0.0;
    let r = resolve_alpha(&sku, &settings);
    assert_eq!(r.alpha, 0.98);
    assert_eq!(r.source, "perishable");

    sku.shelf_life_days = 30; // long shelf life: perishable rule off
    let r = resolve_alpha(&sku, &settings);
    assert_eq!(r.alpha, 0.90);
    assert_eq!(r.source, "variability_cluster");

    sku.demand_variability = None;
    let r = resolve_alpha(&sku, &settings);
    assert_eq!(r.alpha, 0.95);
    assert_eq!(r.source, "global_default");
}

#[test]
fn safety_stock_multiplier_by_cluster() {
    assert_eq!(safety_stock_multiplier(Some(DemandVariability::High)), 1.5);
    assert_eq!(safety_stock_multiplier(Some(DemandVariability::Stable)), 0.8);
    assert_eq!(safety_stock_multiplier(Some(DemandVariability::Low)), 1.0);
    assert_eq!(safety_stock_multiplier(Some(DemandVariability::Seasonal)), 1.0);
    assert_eq!(safety_stock_multiplier(None), 1.0);
}

#[test]
fn auto_variability_classifies_by_cv() {
    use crate::policy::service_level::auto_classify_variability;
    use chrono::{Duration, NaiveDate};

    let mut settings = Settings::default().auto_variability;
    settings.enabled = true;
    let start = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();

    // Flat series: tiny CV, stable.
    let steady: Vec<(NaiveDate, f64)> = (0..60)
        .map(|i| (start + Duration::days(i), 10.0))
        .collect();
    assert_eq!(
        auto_classify_variability(&steady, &settings),
        Some(DemandVariability::Stable)
    );

    // Wild swings: high.
    let spiky: Vec<(NaiveDate, f64)> = (0..60)
        .map(|i| {
            let v = if i % 5 == 0 { 100.0 } else { 1.0 };
            (start + Duration::days(i), v)
        })
        .collect();
    assert_eq!(
        auto_classify_variability(&spiky, &settings),
        Some(DemandVariability::High)
    );

    // Too little history: fallback category.
    let short: Vec<(NaiveDate, f64)> = (0..5)
        .map(|i| (start + Duration::days(i), 10.0))
        .collect();
    assert_eq!(
        auto_classify_variability(&short, &settings),
        Some(DemandVariability::Stable)
    );

    // Disabled: no classification at all.
    settings.enabled = false;
    assert_eq!(auto_classify_variability(&steady, &settings), None);
}

#[test]
fn z_scores_match_normal_inverse_cdf() {
    assert!((z_score(0.95) - 1.645).abs() < 5e-3);
    assert!((z_score(0.93) - 1.476).abs() < 5e-3);
    assert!((z_score(0.50)).abs() < 1e-9);
}

#[test]
fn csl_quantile_first_with_tabulated_alpha() {
    let dist = tabulated_distribution();
    let r = compute_reorder_point(
        PolicyMode::Csl,
        0.95,
        Some(&dist),
        dist.mu,
        dist.sigma,
        &LegacyInputs::default(),
    );
    assert_eq!(r.method, ReorderPointMethod::Quantile);
    assert_eq!(r.quantile_used, Some(182.5));
    assert_eq!(r.s, 182.5);
}

#[test]
fn csl_untabulated_alpha_falls_back_to_z_score() {
    let dist = tabulated_distribution();
    let r = compute_reorder_point(
        PolicyMode::Csl,
        0.93,
        Some(&dist),
        dist.mu,
        dist.sigma,
        &LegacyInputs::default(),
    );
    assert_eq!(r.method, ReorderPointMethod::ZScoreFallback);
    assert!(r.quantile_used.is_none());
    let expected = dist.mu + z_score(0.93) * dist.sigma;
    assert!((r.s - expected).abs() < 1e-9);
}

#[test]
fn csl_simple_uses_z_score() {
    let r = compute_reorder_point(
        PolicyMode::Csl,
        0.95,
        None,
        100.0,
        20.0,
        &LegacyInputs::default(),
    );
    assert_eq!(r.method, ReorderPointMethod::ZScore);
    assert!((r.s - (100.0 + z_score(0.95) * 20.0)).abs() < 1e-9);
}

#[test]
fn legacy_formula() {
    let r = compute_reorder_point(
        PolicyMode::Legacy,
        0.95,
        None,
        0.0,
        0.0,
        &LegacyInputs {
            daily_sales_avg: 10.0,
            safety_stock_adjusted: 20.0,
            p_days: 3,
        },
    );
    assert_eq!(r.method, ReorderPointMethod::Legacy);
    assert_eq!(r.s, 50.0);
    assert_eq!(raw_order(r.s, 50), 0.0);
    assert_eq!(raw_order(r.s, 20), 30.0);
}

#[test]
fn pack_rounding_rounds_up() {
    let mut sku = Sku::new("S1", "test");
    sku.pack_size = 6;
    let outcome = apply_order_constraints(37.0, &sku, 0, None);
    assert_eq!(outcome.q_final, 42);
    assert_eq!(outcome.q_final % 6, 0);
    assert!(!outcome.constraints_applied.is_empty());
}

#[test]
fn moq_collapses_small_orders_to_zero() {
    let mut sku = Sku::new("S1", "test");
    sku.moq = 24;
    sku.pack_size = 6;
    let outcome = apply_order_constraints(10.0, &sku, 0, None);
    assert_eq!(outcome.q_final, 0);

    let outcome = apply_order_constraints(25.0, &sku, 0, None);
    assert_eq!(outcome.q_final, 30);
}

#[test]
fn max_stock_cap_re_rounds_down() {
    let mut sku = Sku::new("S1", "test");
    sku.pack_size = 6;
    sku.max_stock = 100;
    // IP 80: headroom 20, rounded down to 18.
    let outcome = apply_order_constraints(60.0, &sku, 80, None);
    assert!(outcome.capped_by_max_stock);
    assert_eq!(outcome.q_final, 18);
    assert!(80 + outcome.q_final <= 100);
}

#[test]
fn soft_penalty_floors_and_hard_zeroes() {
    let settings = Settings::default();
    let mut sku = Sku::new("YOG", "yogurt");
    sku.shelf_life_days = 21;
    sku.min_shelf_life_days = 10;
    sku.waste_penalty_mode = WastePenaltyMode::Soft;
    sku.waste_penalty_factor = 0.7;
    sku.waste_risk_threshold = 10.0;

    let project = |_q: i64| WasteProjection {
        waste_risk_traditional: 20.0,
        waste_risk_adjusted: 20.0,
        expected_waste_qty: 40.0,
    };
    let check = ShelfLifeCheck {
        settings: &settings.shelf_life_policy,
        project: &project,
    };

    let outcome = apply_order_constraints(40.0, &sku, 0, Some(&check));
    assert!(outcome.shelf_life_penalty_applied);
    assert_eq!(outcome.q_final, 12, "floor(40 * (1 - 0.7)) = 12");
    assert!((outcome.forward_waste_risk_pct - 20.0).abs() < 1e-9);

    sku.waste_penalty_mode = WastePenaltyMode::Hard;
    let outcome = apply_order_constraints(40.0, &sku, 0, Some(&check));
    assert_eq!(outcome.q_final, 0);

    // Below threshold: untouched.
    let calm = |_q: i64| WasteProjection {
        waste_risk_traditional: 5.0,
        waste_risk_adjusted: 5.0,
        expected_waste_qty: 2.0,
    };
    let check = ShelfLifeCheck {
        settings: &settings.shelf_life_policy,
        project: &calm,
    };
    sku.waste_penalty_mode = WastePenaltyMode::Soft;
    let outcome = apply_order_constraints(40.0, &sku, 0, Some(&check));
    assert!(!outcome.shelf_life_penalty_applied);
    assert_eq!(outcome.q_final, 40);
}

#[test]
fn alpha_monotonicity_s_and_q() {
    let dist = tabulated_distribution();
    let sku = Sku::new("S1", "test");
    let mut last_s = f64::MIN;
    let mut last_q = i64::MIN;
    for alpha in [0.50, 0.80, 0.90, 0.95, 0.98] {
        let r = compute_reorder_point(
            PolicyMode::Csl,
            alpha,
            Some(&dist),
            dist.mu,
            dist.sigma,
            &LegacyInputs::default(),
        );
        assert!(r.s >= last_s, "S must be non-decreasing in alpha");
        let q = apply_order_constraints(raw_order(r.s, 100), &sku, 100, None).q_final;
        assert!(q >= last_q, "Q_final must be non-decreasing in alpha");
        last_s = r.s;
        last_q = q;
    }
}

#[test]
fn ip_monotonicity_q_non_increasing() {
    let sku = Sku::new("S1", "test");
    let s = 182.5;
    let mut last_q = i64::MAX;
    for ip in [0, 50, 100, 150, 200] {
        let q = apply_order_constraints(raw_order(s, ip), &sku, ip, None).q_final;
        assert!(q <= last_q, "Q_final must be non-increasing in IP");
        last_q = q;
    }
}

#[test]
fn pack_and_cap_compliance_properties() {
    let mut sku = Sku::new("S1", "test");
    sku.pack_size = 8;
    sku.moq = 16;
    sku.max_stock = 120;
    for s in [0.0, 10.0, 33.0, 90.0, 250.0] {
        for ip in [0, 40, 110, 130] {
            let outcome = apply_order_constraints(raw_order(s, ip), &sku, ip, None);
            let q = outcome.q_final;
            assert_eq!(q % 8, 0, "pack compliance");
            assert!(q == 0 || q >= 16, "moq compliance");
            assert!(ip + q <= 120 || q == 0, "cap compliance");
        }
    }
}

#[test]
fn explain_table_has_fixed_columns() {
    use crate::policy::explain::{OrderExplain, EXPLAIN_COLUMNS};

    let explain = OrderExplain {
        sku: "S1".to_string(),
        order_date: chrono::NaiveDate::from_ymd_opt(2026, 2, 6).unwrap(),
        receipt_date: chrono::NaiveDate::from_ymd_opt(2026, 2, 7).unwrap(),
        lane: crate::calendar::Lane::Saturday,
        p_days: 3,
        alpha_target: 0.95,
        alpha_effective: 0.95,
        alpha_source: "global_default".to_string(),
        forecast_method: "monte_carlo".to_string(),
        reorder_point_method: ReorderPointMethod::Quantile,
        quantile_used: Some(182.5),
        s: 182.5,
        mu_p: 142.0,
        sigma_p: 21.0,
        inventory_position: 100,
        baseline_map: BTreeMap::new(),
        adjusted_map: BTreeMap::new(),
        event_explain: Default::default(),
        promo_explain: Default::default(),
        waste_explain: Default::default(),
        mc: None,
        constraints_applied: vec!["pack_size: 83 -> 84".to_string()],
        capped_by_max_stock: false,
        shelf_life_penalty_applied: false,
        forward_waste_risk_pct: 0.0,
        expected_waste_qty: 0.0,
        usable_stock: 100,
        unusable_stock: 0,
        final_qty: 84,
    };

    let row = explain.to_row();
    assert_eq!(row.len(), EXPLAIN_COLUMNS.len());

    let table = OrderExplain::render_table(&[explain]);
    let mut lines = table.lines();
    assert_eq!(lines.next().unwrap().split(',').count(), EXPLAIN_COLUMNS.len());
    assert!(lines.next().unwrap().contains("182.50"));
}
