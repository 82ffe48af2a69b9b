//! Intermittent-demand methods: Croston, SBA, TSB.
//!
//! Classification: a series is sparse when ADI > adi_threshold and
//! CV^2 > cv2_threshold. Auto-selection runs a rolling-origin backtest and
//! picks the method with the lowest WMAPE.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntermittentMethod {
    Croston,
    Sba,
    Tsb,
}

impl IntermittentMethod {
    pub const ALL: [IntermittentMethod; 3] = [
        IntermittentMethod::Croston,
        IntermittentMethod::Sba,
        IntermittentMethod::Tsb,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntermittentMethod::Croston => "croston",
            IntermittentMethod::Sba => "sba",
            IntermittentMethod::Tsb => "tsb",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "croston" => Some(IntermittentMethod::Croston),
            "sba" => Some(IntermittentMethod::Sba),
            "tsb" => Some(IntermittentMethod::Tsb),
            _ => None,
        }
    }
}

/// ADI and squared coefficient of variation of the non-zero sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub adi: f64,
    pub cv2: f64,
    pub nonzero_count: usize,
}

/// Classify a daily series (censored days already removed by the caller).
pub fn classify(values: &[f64]) -> SeriesStats {
    let nonzero: Vec<f64> = values.iter().copied().filter(|v| *v > 0.0).collect();
    if nonzero.is_empty() {
        return SeriesStats::default();
    }
    let adi = values.len() as f64 / nonzero.len() as f64;
    let mean = nonzero.iter().sum::<f64>() / nonzero.len() as f64;
    let var = nonzero.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / nonzero.len() as f64;
    let cv2 = if mean > 0.0 { var / (mean * mean) } else { 0.0 };
    SeriesStats {
        adi,
        cv2,
        nonzero_count: nonzero.len(),
    }
}

/// Daily demand rate forecast by the chosen method.
pub fn fit_rate(values: &[f64], method: IntermittentMethod, alpha: f64) -> f64 {
    match method {
        IntermittentMethod::Croston => croston_rate(values, alpha),
        IntermittentMethod::Sba => croston_rate(values, alpha) * (1.0 - alpha / 2.0),
        IntermittentMethod::Tsb => tsb_rate(values, alpha),
    }
}

/// Croston: exponential smoothing of demand size (z) and inter-demand
/// interval (p), updated only on demand events. Rate = z / p.
fn croston_rate(values: &[f64], alpha: f64) -> f64 {
    let mut z: Option<f64> = None;
    let mut p: Option<f64> = None;
    let mut interval = 0.0f64;

    for &value in values {
        interval += 1.0;
        if value > 0.0 {
            z = Some(match z {
                Some(prev) => prev + alpha * (value - prev),
                None => value,
            });
            p = Some(match p {
                Some(prev) => prev + alpha * (interval - prev),
                None => interval,
            });
            interval = 0.0;
        }
    }

    match (z, p) {
        (Some(z), Some(p)) if p > 0.0 => z / p,
        _ => 0.0,
    }
}

/// TSB: smooth demand probability (b) every day and demand size (z) on
/// demand days. Rate = b * z.
fn tsb_rate(values: &[f64], alpha: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut b = 0.0f64;
    let mut z: Option<f64> = None;
    let mut initialized = false;

    for &value in values {
        let occurred = if value > 0.0 { 1.0 } else { 0.0 };
        if !initialized {
            b = occurred;
            initialized = true;
        } else {
            b += alpha * (occurred - b);
        }
        if value > 0.0 {
            z = Some(match z {
                Some(prev) => prev + alpha * (value - prev),
                None => value,
            });
        }
    }

    match z {
        Some(z) => b * z,
        None => 0.0,
    }
}

/// Weighted mean absolute percentage error of a flat rate forecast against
/// the actual values.
pub fn wmape(actual: &[f64], rate: f64) -> f64 {
    let denominator: f64 = actual.iter().map(|a| a.abs()).sum();
    if denominator <= 0.0 {
        return f64::INFINITY;
    }
    let numerator: f64 = actual.iter().map(|a| (a - rate).abs()).sum();
    numerator / denominator
}

/// Rolling-origin backtest over `folds` folds: fit on the history before
/// each fold, score the flat rate against the fold with WMAPE, and pick
/// the method with the lowest total. Returns None when the series is too
/// short to form a single fold.
pub fn backtest_select(
    values: &[f64],
    alpha: f64,
    folds: usize,
) -> Option<IntermittentMethod> {
    const FOLD_SPAN: usize = 7;

    let folds = folds.max(1);
    if values.len() < FOLD_SPAN * (folds + 1) {
        return None;
    }

    let mut best: Option<(IntermittentMethod, f64)> = None;
    for method in IntermittentMethod::ALL {
        let mut total = 0.0;
        let mut scored = 0usize;
        for fold in 0..folds {
            let test_end = values.len() - fold * FOLD_SPAN;
            let test_start = test_end - FOLD_SPAN;
            let train = &values[..test_start];
            if train.is_empty() {
                continue;
            }
            let rate = fit_rate(train, method, alpha);
            let score = wmape(&values[test_start..test_end], rate);
            if score.is_finite() {
                total += score;
                scored += 1;
            }
        }
        if scored == 0 {
            continue;
        }
        let avg = total / scored as f64;
        match best {
            Some((_, best_score)) if best_score <= avg => {}
            _ => best = Some((method, avg)),
        }
    }
    best.map(|(method, _)| method)
}
