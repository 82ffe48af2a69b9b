//! Promo uplift stage.
//!
//! Historical promo events yield uplift samples (promo-day sales over the
//! anti-leakage baseline trained strictly before the event). Samples pool
//! hierarchically: SKU, then category, then department, then global; the
//! first level with enough events wins. The estimate is a winsorized mean
//! clamped to the guardrail band, with an A/B/C confidence grade from the
//! event count and pooling depth.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::settings::PromoUpliftSettings;
use crate::models::PromoWindow;

/// Uplift samples per pooling level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolSamples {
    pub sku: Vec<f64>,
    pub category: Vec<f64>,
    pub department: Vec<f64>,
    pub global: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpliftEstimate {
    pub uplift: f64,
    pub pool_level: String,
    pub events_used: usize,
    pub confidence: char,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromoUpliftExplain {
    pub applied: bool,
    pub uplift: f64,
    pub pool_level: Option<String>,
    pub events_used: usize,
    pub confidence: Option<char>,
    pub promo_days: Vec<NaiveDate>,
}

/// Merge overlapping windows with a gap of at most one day into single
/// events for uplift estimation.
pub fn merge_windows(windows: &[PromoWindow]) -> Vec<(NaiveDate, NaiveDate)> {
    let mut sorted: Vec<(NaiveDate, NaiveDate)> = windows
        .iter()
        .map(|w| (w.start_date, w.end_date))
        .collect();
    sorted.sort();

    let mut merged: Vec<(NaiveDate, NaiveDate)> = Vec::new();
    for (start, end) in sorted {
        match merged.last_mut() {
            Some((_, last_end)) if start <= *last_end + Duration::days(1) => {
                if end > *last_end {
                    *last_end = end;
                }
            }
            _ => merged.push((start, end)),
        }
    }
    merged
}

/// Winsorized mean: clamp both tails at the trim percentile before
/// averaging.
pub fn winsorized_mean(samples: &[f64], trim_percent: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f64> = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("uplift samples are finite"));

    let trim = (trim_percent / 100.0).clamp(0.0, 0.5);
    let k = ((sorted.len() as f64) * trim).floor() as usize;
    let low = sorted[k];
    let high = sorted[sorted.len() - 1 - k];
    let sum: f64 = sorted.iter().map(|v| v.clamp(low, high)).sum();
    sum / sorted.len() as f64
}

/// Pick the pooling level and produce the estimate. Returns None when no
/// level has enough events (the stage then applies no uplift).
pub fn estimate(pools: &PoolSamples, settings: &PromoUpliftSettings) -> Option<UpliftEstimate> {
    let candidates: [(&str, &[f64], i64); 4] = [
        ("sku", &pools.sku, settings.min_events_sku),
        ("category", &pools.category, settings.min_events_category),
        ("department", &pools.department, settings.min_events_department),
        ("global", &pools.global, settings.min_events_department),
    ];

    for (level, samples, min_events) in candidates {
        if (samples.len() as i64) < min_events.max(1) {
            continue;
        }
        let raw = winsorized_mean(samples, settings.winsorize_trim_percent);
        let uplift = raw.clamp(settings.min_uplift, settings.max_uplift);
        let confidence = grade(level, samples.len(), settings);
        return Some(UpliftEstimate {
            uplift,
            pool_level: level.to_string(),
            events_used: samples.len(),
            confidence,
        });
    }
    None
}

fn grade(level: &str, events: usize, settings: &PromoUpliftSettings) -> char {
    if level == "sku" && events as i64 >= settings.confidence_threshold_a {
        'A'
    } else if (level == "sku" || level == "category")
        && events as i64 >= settings.confidence_threshold_b
    {
        'B'
    } else {
        'C'
    }
}

/// Apply the pooled uplift to the promo days within the horizon.
pub fn apply(
    per_date: &BTreeMap<NaiveDate, f64>,
    promo_days: &BTreeSet<NaiveDate>,
    pools: &PoolSamples,
    settings: &PromoUpliftSettings,
) -> (BTreeMap<NaiveDate, f64>, PromoUpliftExplain) {
    let mut explain = PromoUpliftExplain {
        uplift: 1.0,
        promo_days: promo_days.iter().copied().collect(),
        ..Default::default()
    };

    if promo_days.is_empty() {
        return (per_date.clone(), explain);
    }
    let Some(estimate) = estimate(pools, settings) else {
        return (per_date.clone(), explain);
    };

    let mut out = per_date.clone();
    let mut touched = false;
    for (date, value) in out.iter_mut() {
        if promo_days.contains(date) {
            *value *= estimate.uplift;
            touched = true;
        }
    }

    explain.applied = touched;
    explain.uplift = estimate.uplift;
    explain.pool_level = Some(estimate.pool_level);
    explain.events_used = estimate.events_used;
    explain.confidence = Some(estimate.confidence);
    (out, explain)
}
