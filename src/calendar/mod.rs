//! Logistic Calendar
//!
//! Order-day and delivery-day rules, lane selection, and the protection
//! window. A Friday order splits into two lanes (Saturday delivery and
//! Monday delivery); every other order day rides the standard lane.
//!
//! Protection window: r1 is the delivery date of this order; r2 is the
//! delivery date of the next possible order after it; P = r2 - r1 is the
//! number of days this order must cover.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::config::HolidaySet;
use crate::errors::{DomainError, DomainResult};

/// Logistic routing of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lane {
    Standard,
    Saturday,
    Monday,
}

impl Lane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::Standard => "STANDARD",
            Lane::Saturday => "SATURDAY",
            Lane::Monday => "MONDAY",
        }
    }
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProtectionWindow {
    pub lane: Lane,
    /// Delivery date of this order.
    pub r1: NaiveDate,
    /// Delivery date of the next order opportunity.
    pub r2: NaiveDate,
    /// Protection period in days.
    pub p_days: i64,
}

#[derive(Debug, Clone)]
pub struct CalendarConfig {
    pub order_days: Vec<Weekday>,
    pub delivery_days: Vec<Weekday>,
    pub lead_time_days: i64,
    pub saturday_lane_lead_time: i64,
    pub holidays: HolidaySet,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            order_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            delivery_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
            ],
            lead_time_days: 1,
            saturday_lane_lead_time: 1,
            holidays: HolidaySet::default(),
        }
    }
}

impl CalendarConfig {
    pub fn is_order_day(&self, date: NaiveDate) -> bool {
        self.order_days.contains(&date.weekday()) && !self.holidays.blocks_order(date)
    }

    pub fn is_delivery_day(&self, date: NaiveDate) -> bool {
        self.delivery_days.contains(&date.weekday()) && !self.holidays.blocks_receipt(date)
    }

    /// Lanes available for an order placed on `order_date`. Fridays split
    /// into the Saturday and Monday lanes; any other order day is standard.
    pub fn lanes_for(&self, order_date: NaiveDate) -> DomainResult<Vec<Lane>> {
        if !self.is_order_day(order_date) {
            return Err(DomainError::InvalidOrderDay {
                date: order_date.format("%Y-%m-%d").to_string(),
            });
        }
        if order_date.weekday() == Weekday::Fri {
            Ok(vec![Lane::Saturday, Lane::Monday])
        } else {
            Ok(vec![Lane::Standard])
        }
    }

    fn advance_to_delivery_day(&self, mut date: NaiveDate) -> NaiveDate {
        // Bounded walk; a calendar where no day delivers would loop forever.
        for _ in 0..366 {
            if self.is_delivery_day(date) {
                return date;
            }
            date += Duration::days(1);
        }
        date
    }

    /// Delivery date for an order placed on `order_date` on `lane`.
    pub fn next_receipt_date(&self, order_date: NaiveDate, lane: Lane) -> DomainResult<NaiveDate> {
        if !self.is_order_day(order_date) {
            return Err(DomainError::InvalidOrderDay {
                date: order_date.format("%Y-%m-%d").to_string(),
            });
        }
        let candidate = match lane {
            Lane::Standard => order_date + Duration::days(self.lead_time_days.max(0)),
            Lane::Saturday => order_date + Duration::days(self.saturday_lane_lead_time.max(0)),
            Lane::Monday => {
                let mut date = order_date + Duration::days(1);
                while date.weekday() != Weekday::Mon {
                    date += Duration::days(1);
                }
                date
            }
        };
        Ok(self.advance_to_delivery_day(candidate))
    }

    /// First order day strictly after `from`.
    fn next_order_day_after(&self, from: NaiveDate) -> NaiveDate {
        let mut date = from + Duration::days(1);
        for _ in 0..366 {
            if self.is_order_day(date) {
                return date;
            }
            date += Duration::days(1);
        }
        date
    }

    /// Earliest delivery obtainable by ordering on `order_day` (a Friday
    /// order reaches the shelf on the Saturday lane first).
    fn earliest_receipt_for_order_day(&self, order_day: NaiveDate) -> DomainResult<NaiveDate> {
        let lane = if order_day.weekday() == Weekday::Fri {
            Lane::Saturday
        } else {
            Lane::Standard
        };
        self.next_receipt_date(order_day, lane)
    }

    /// Protection window for an order on `order_date` via `lane`:
    /// r1 = this order's delivery, r2 = the delivery of the next order
    /// opportunity, P = (r2 - r1) days.
    pub fn protection_window(
        &self,
        order_date: NaiveDate,
        lane: Lane,
    ) -> DomainResult<ProtectionWindow> {
        let r1 = self.next_receipt_date(order_date, lane)?;
        let next_order = self.next_order_day_after(order_date);
        let r2 = self.earliest_receipt_for_order_day(next_order)?;
        let p_days = (r2 - r1).num_days().max(0);
        Ok(ProtectionWindow {
            lane,
            r1,
            r2,
            p_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HolidayEffect, HolidayKind, HolidayRule, HolidayScope};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn friday_splits_into_two_lanes() {
        let cal = CalendarConfig::default();
        let friday = d(2026, 2, 6);
        assert_eq!(friday.weekday(), Weekday::Fri);
        assert_eq!(cal.lanes_for(friday).unwrap(), vec![Lane::Saturday, Lane::Monday]);
        assert_eq!(cal.lanes_for(d(2026, 2, 3)).unwrap(), vec![Lane::Standard]);
    }

    #[test]
    fn ordering_on_sunday_fails() {
        let cal = CalendarConfig::default();
        let err = cal.lanes_for(d(2026, 2, 8)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidOrderDay { .. }));
    }

    #[test]
    fn friday_dual_lane_protection_windows() {
        // Friday 2026-02-06, lead time 1: Saturday lane delivers Sat 02-07
        // and must cover through Tuesday (P=3); Monday lane delivers Mon
        // 02-09 and covers one day (P=1).
        let cal = CalendarConfig::default();
        let friday = d(2026, 2, 6);

        let sat = cal.protection_window(friday, Lane::Saturday).unwrap();
        assert_eq!(sat.r1, d(2026, 2, 7));
        assert_eq!(sat.r2, d(2026, 2, 10));
        assert_eq!(sat.p_days, 3);

        let mon = cal.protection_window(friday, Lane::Monday).unwrap();
        assert_eq!(mon.r1, d(2026, 2, 9));
        assert_eq!(mon.r2, d(2026, 2, 10));
        assert_eq!(mon.p_days, 1);
    }

    #[test]
    fn standard_weekday_window() {
        let cal = CalendarConfig::default();
        let tuesday = d(2026, 2, 3);
        let window = cal.protection_window(tuesday, Lane::Standard).unwrap();
        assert_eq!(window.r1, d(2026, 2, 4));
        assert_eq!(window.r2, d(2026, 2, 5));
        assert_eq!(window.p_days, 1);
    }

    #[test]
    fn holiday_pushes_delivery_forward() {
        let cal = CalendarConfig {
            holidays: HolidaySet::new(vec![HolidayRule {
                name: "depot closed".to_string(),
                scope: HolidayScope::Logistics,
                effect: HolidayEffect::NoReceipt,
                kind: HolidayKind::Single { date: d(2026, 2, 4) },
            }]),
            ..CalendarConfig::default()
        };
        // Tuesday order would deliver Wednesday, but Wednesday is blocked.
        let r1 = cal.next_receipt_date(d(2026, 2, 3), Lane::Standard).unwrap();
        assert_eq!(r1, d(2026, 2, 5));
    }

    #[test]
    fn order_holiday_shifts_next_order_opportunity() {
        // Wednesday blocked for ordering: a Tuesday order's protection
        // window stretches to Thursday's delivery.
        let cal = CalendarConfig {
            holidays: HolidaySet::new(vec![HolidayRule {
                name: "no orders".to_string(),
                scope: HolidayScope::Orders,
                effect: HolidayEffect::NoOrder,
                kind: HolidayKind::Single { date: d(2026, 2, 4) },
            }]),
            ..CalendarConfig::default()
        };
        let window = cal.protection_window(d(2026, 2, 3), Lane::Standard).unwrap();
        assert_eq!(window.r1, d(2026, 2, 4));
        assert_eq!(window.r2, d(2026, 2, 6));
        assert_eq!(window.p_days, 2);
    }

    #[test]
    fn national_holiday_is_not_an_order_day() {
        let cal = CalendarConfig::default();
        // 2026-06-02 falls on a Tuesday and is a national holiday.
        assert!(!cal.is_order_day(d(2026, 6, 2)));
    }
}
