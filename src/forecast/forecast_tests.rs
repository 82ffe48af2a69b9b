use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};

use crate::config::Settings;
use crate::forecast::baseline::{BaselineConfig, BaselineModel};
use crate::forecast::intermittent::{backtest_select, classify, fit_rate, IntermittentMethod};
use crate::forecast::monte_carlo::{
    simulate_protection_demand, McDistribution, McParams, QUANTILE_LEVELS,
};
use crate::forecast::{forecast, ForecastInputs, ForecastMethod};
use crate::models::{SalesRecord, Sku};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn sales_series(start: NaiveDate, values: &[i64]) -> Vec<SalesRecord> {
    values
        .iter()
        .enumerate()
        .map(|(i, qty)| SalesRecord {
            date: start + Duration::days(i as i64),
            sku: "S1".to_string(),
            qty_sold: *qty,
            promo_flag: false,
        })
        .collect()
}

#[test]
fn baseline_zero_on_empty_history() {
    let model = BaselineModel::fit(&[], &BaselineConfig::default());
    assert_eq!(model.predict(d(2026, 2, 3)), 0.0);
}

#[test]
fn baseline_level_without_enough_dow_samples() {
    // One week of data: every weekday has a single sample, below the
    // threshold, so the model stays level-only.
    let obs: Vec<(NaiveDate, f64)> = (0..7)
        .map(|i| (d(2026, 1, 5) + Duration::days(i), 10.0))
        .collect();
    let model = BaselineModel::fit(&obs, &BaselineConfig::default());
    assert!(model.dow_factors.is_none());
    assert!((model.predict(d(2026, 2, 2)) - 10.0).abs() < 1e-9);
}

#[test]
fn baseline_dow_factors_scale_weekdays() {
    // Four weeks: Mondays sell 20, every other day 10.
    let mut obs = Vec::new();
    for week in 0..4 {
        for day in 0..7 {
            let date = d(2026, 1, 5) + Duration::days(week * 7 + day);
            let qty = if day == 0 { 20.0 } else { 10.0 };
            obs.push((date, qty));
        }
    }
    let model = BaselineModel::fit(&obs, &BaselineConfig::default());
    assert!(model.dow_factors.is_some());
    let monday = model.predict(d(2026, 2, 2));
    let tuesday = model.predict(d(2026, 2, 3));
    assert!(monday > tuesday);
    // Weekly total is preserved by factor normalization.
    let weekly: f64 = (0..7)
        .map(|i| model.predict(d(2026, 2, 2) + Duration::days(i)))
        .sum();
    assert!((weekly - 80.0).abs() < 1e-6);
}

#[test]
fn baseline_no_promo_equals_full_fit() {
    // With promo_flag=0 everywhere and no censored days, the training set
    // is the full history, so predictions match a model fit on everything.
    let sales = sales_series(d(2026, 1, 5), &[10, 12, 8, 11, 9, 10, 10, 12, 9, 10, 11, 10]);
    let censored = BTreeSet::new();
    let horizon: Vec<NaiveDate> = (0..3).map(|i| d(2026, 2, 2) + Duration::days(i)).collect();
    let settings = Settings::default();
    let mut sku = Sku::new("S1", "test");
    sku.forecast_method = Some("simple".to_string());

    let result = forecast(&ForecastInputs {
        sku: &sku,
        settings: &settings,
        sales: &sales,
        censored: &censored,
        horizon: &horizon,
    })
    .unwrap();

    let obs: Vec<(NaiveDate, f64)> =
        sales.iter().map(|s| (s.date, s.qty_sold as f64)).collect();
    let full = BaselineModel::fit(&obs, &BaselineConfig::default());
    for date in &horizon {
        let got = result.per_date[date];
        assert!((got - full.predict(*date)).abs() < 1e-2);
    }
}

#[test]
fn monte_carlo_is_deterministic_per_seed() {
    let history: Vec<f64> = vec![10.0, 12.0, 8.0, 14.0, 9.0, 11.0, 10.0, 13.0];
    let params = McParams {
        n_simulations: 500,
        seed: 7,
        distribution: McDistribution::Empirical,
    };
    let a = simulate_protection_demand(&history, 3, &params);
    let b = simulate_protection_demand(&history, 3, &params);
    assert_eq!(a, b);

    let other_seed = simulate_protection_demand(
        &history,
        3,
        &McParams {
            seed: 8,
            ..params
        },
    );
    assert_ne!(a.quantiles, other_seed.quantiles);
}

#[test]
fn monte_carlo_quantiles_non_decreasing() {
    let history: Vec<f64> = (0..30).map(|i| 5.0 + (i % 7) as f64).collect();
    for dist in [
        McDistribution::Empirical,
        McDistribution::Normal,
        McDistribution::Lognormal,
        McDistribution::Residuals,
    ] {
        let result = simulate_protection_demand(
            &history,
            5,
            &McParams {
                n_simulations: 400,
                seed: 42,
                distribution: dist,
            },
        );
        let mut last = f64::MIN;
        for level in QUANTILE_LEVELS {
            let q = result.quantile(level).unwrap();
            assert!(q >= last, "quantiles must be non-decreasing ({:?})", dist);
            last = q;
        }
        // Median sits near the center of the simulated sums.
        let median = result.quantile(0.50).unwrap();
        assert!((median - result.mu).abs() < result.sigma.max(1.0) * 3.0);
    }
}

#[test]
fn monte_carlo_keys_are_two_decimal_strings() {
    let result = simulate_protection_demand(
        &[5.0, 6.0, 7.0],
        2,
        &McParams {
            n_simulations: 100,
            seed: 1,
            distribution: McDistribution::Empirical,
        },
    );
    for key in ["0.50", "0.80", "0.90", "0.95", "0.98"] {
        assert!(result.quantiles.contains_key(key), "missing {}", key);
    }
}

#[test]
fn croston_converges_to_size_over_interval() {
    // Demand of 45 every 3rd day: rate approaches 45/3 = 15.
    let mut values = Vec::new();
    for _ in 0..30 {
        values.extend_from_slice(&[0.0, 0.0, 45.0]);
    }
    let rate = fit_rate(&values, IntermittentMethod::Croston, 0.1);
    assert!((rate - 15.0).abs() < 1.0, "rate = {}", rate);

    let sba = fit_rate(&values, IntermittentMethod::Sba, 0.1);
    assert!((sba - rate * 0.95).abs() < 1e-9);

    let tsb = fit_rate(&values, IntermittentMethod::Tsb, 0.1);
    assert!((tsb - 15.0).abs() < 2.0, "tsb rate = {}", tsb);
}

#[test]
fn classification_flags_sparse_series() {
    // Roughly one demand event every ~3.3 days with variable sizes.
    let mut values = vec![0.0; 90];
    let sizes = [10.0, 100.0, 20.0, 150.0, 15.0, 80.0, 10.0, 120.0, 30.0];
    let mut idx = 3;
    let mut s = 0;
    while idx < 90 && s < sizes.len() {
        values[idx] = sizes[s];
        idx += if s % 2 == 0 { 3 } else { 4 };
        s += 1;
    }
    let stats = classify(&values);
    assert!(stats.adi > 1.32, "adi = {}", stats.adi);
    assert!(stats.cv2 > 0.49, "cv2 = {}", stats.cv2);
}

#[test]
fn backtest_returns_none_on_short_history() {
    assert!(backtest_select(&[1.0; 10], 0.1, 4).is_none());
    assert!(backtest_select(&[1.0; 100], 0.1, 4).is_some());
}

#[test]
fn auto_falls_back_to_simple_for_stable_series() {
    let sales = sales_series(d(2026, 1, 1), &[10; 60]);
    let censored = BTreeSet::new();
    let horizon: Vec<NaiveDate> = (0..3).map(|i| d(2026, 3, 3) + Duration::days(i)).collect();
    let settings = Settings::default();
    let mut sku = Sku::new("S1", "test");
    sku.forecast_method = Some("intermittent_auto".to_string());

    let result = forecast(&ForecastInputs {
        sku: &sku,
        settings: &settings,
        sales: &sales,
        censored: &censored,
        horizon: &horizon,
    })
    .unwrap();
    assert_eq!(result.method, "simple");
}

#[test]
fn sku_override_beats_global_method() {
    let settings = Settings::default(); // global: monte_carlo
    let mut sku = Sku::new("S1", "test");
    sku.forecast_method = Some("croston".to_string());
    assert_eq!(
        crate::forecast::resolve_method(&sku, &settings).unwrap(),
        ForecastMethod::Croston
    );

    sku.forecast_method = None;
    assert_eq!(
        crate::forecast::resolve_method(&sku, &settings).unwrap(),
        ForecastMethod::MonteCarlo
    );
}

#[test]
fn censored_days_excluded_from_training() {
    // Ten days of sales at 10, with two censored zero days that would
    // otherwise drag the level down.
    let mut sales = sales_series(d(2026, 1, 5), &[10, 10, 10, 10, 10, 0, 0, 10, 10, 10]);
    sales[5].qty_sold = 0;
    sales[6].qty_sold = 0;
    let mut censored = BTreeSet::new();
    censored.insert(d(2026, 1, 10));
    censored.insert(d(2026, 1, 11));

    let horizon = vec![d(2026, 2, 2)];
    let settings = Settings::default();
    let mut sku = Sku::new("S1", "test");
    sku.forecast_method = Some("simple".to_string());

    let result = forecast(&ForecastInputs {
        sku: &sku,
        settings: &settings,
        sales: &sales,
        censored: &censored,
        horizon: &horizon,
    })
    .unwrap();
    assert!((result.per_date[&d(2026, 2, 2)] - 10.0).abs() < 1e-9);
}
