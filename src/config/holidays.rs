//! Holiday rules.
//!
//! User-defined rules (single date, date range, or fixed month-day) layered
//! over the built-in national holiday set, which is always included. Each
//! rule carries a scope and an effect; the calendar asks the set two
//! questions only: does this date block ordering, and does it block
//! receiving.

use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HolidayScope {
    Logistics,
    Orders,
    Receipts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HolidayEffect {
    NoOrder,
    NoReceipt,
    Both,
}

impl HolidayEffect {
    pub fn blocks_order(&self) -> bool {
        matches!(self, HolidayEffect::NoOrder | HolidayEffect::Both)
    }

    pub fn blocks_receipt(&self) -> bool {
        matches!(self, HolidayEffect::NoReceipt | HolidayEffect::Both)
    }
}

/// Rule shape; `fixed` recurs every year on a `MM-DD` day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "snake_case")]
pub enum HolidayKind {
    Single { date: NaiveDate },
    Range { start: NaiveDate, end: NaiveDate },
    Fixed { day: String },
}

impl HolidayKind {
    pub fn matches(&self, date: NaiveDate) -> bool {
        match self {
            HolidayKind::Single { date: d } => *d == date,
            HolidayKind::Range { start, end } => date >= *start && date <= *end,
            HolidayKind::Fixed { day } => {
                format!("{:02}-{:02}", date.month(), date.day()) == *day
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolidayRule {
    pub name: String,
    pub scope: HolidayScope,
    pub effect: HolidayEffect,
    #[serde(flatten)]
    pub kind: HolidayKind,
}

/// Persisted blob shape: user-defined rules only; the built-in national
/// set is layered on top at query time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HolidaySet {
    #[serde(default)]
    pub holidays: Vec<HolidayRule>,
}

lazy_static! {
    /// Official national holidays, fixed-date part. Easter Monday is
    /// movable and handled separately.
    static ref NATIONAL_FIXED: Vec<(&'static str, &'static str)> = vec![
        ("New Year's Day", "01-01"),
        ("Epiphany", "01-06"),
        ("Liberation Day", "04-25"),
        ("Labour Day", "05-01"),
        ("Republic Day", "06-02"),
        ("Assumption", "08-15"),
        ("All Saints' Day", "11-01"),
        ("Immaculate Conception", "12-08"),
        ("Christmas Day", "12-25"),
        ("St. Stephen's Day", "12-26"),
    ];
}

/// Gregorian Easter Sunday (anonymous Gauss computus).
pub fn easter_sunday(year: i32) -> NaiveDate {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = ((h + l - 7 * m + 114) % 31) + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
        .expect("computus always yields a valid March/April date")
}

fn is_national_holiday(date: NaiveDate) -> bool {
    let md = format!("{:02}-{:02}", date.month(), date.day());
    if NATIONAL_FIXED.iter().any(|(_, day)| *day == md) {
        return true;
    }
    // Easter Monday.
    easter_sunday(date.year()).succ_opt() == Some(date)
}

impl HolidaySet {
    pub fn new(holidays: Vec<HolidayRule>) -> Self {
        Self { holidays }
    }

    /// True when `date` blocks placing orders.
    pub fn blocks_order(&self, date: NaiveDate) -> bool {
        if is_national_holiday(date) {
            return true;
        }
        self.holidays
            .iter()
            .any(|rule| rule.effect.blocks_order() && rule.kind.matches(date))
    }

    /// True when `date` blocks receiving deliveries.
    pub fn blocks_receipt(&self, date: NaiveDate) -> bool {
        if is_national_holiday(date) {
            return true;
        }
        self.holidays
            .iter()
            .any(|rule| rule.effect.blocks_receipt() && rule.kind.matches(date))
    }
}
