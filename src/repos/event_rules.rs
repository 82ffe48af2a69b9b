//! Event-uplift rule repository.
//!
//! Rules are keyed (delivery_date, scope_type, scope_key); resolution for a
//! SKU walks the precedence ladder SKU > DEPARTMENT > CATEGORY > ALL and
//! returns the first match.

use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

use crate::errors::{DomainError, DomainResult};
use crate::models::{EventUpliftRule, ScopeType, UpliftStrength};
use crate::repos::{date_from_sql, date_to_sql};
use crate::storage::{Database, TxBehavior};

pub struct EventRulesRepo {
    db: Database,
}

impl EventRulesRepo {
    pub fn new(db: &Database) -> Self {
        Self { db: db.clone() }
    }

    pub fn upsert(&self, rule: &EventUpliftRule) -> DomainResult<()> {
        self.db.with_tx(TxBehavior::Immediate, |conn| {
            conn.execute(
                "INSERT INTO event_uplift_rules
                     (delivery_date, scope_type, scope_key, reason, strength, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(delivery_date, scope_type, scope_key) DO UPDATE SET
                     reason = excluded.reason,
                     strength = excluded.strength,
                     notes = excluded.notes",
                params![
                    date_to_sql(rule.delivery_date),
                    rule.scope_type.as_str(),
                    rule.scope_key,
                    rule.reason,
                    rule.strength.as_str(),
                    rule.notes,
                ],
            )?;
            Ok(())
        })
    }

    /// Resolve the effective rule for (delivery_date, sku) using scope
    /// precedence.
    pub fn resolve(
        &self,
        delivery_date: NaiveDate,
        sku: &str,
        category: Option<&str>,
        department: Option<&str>,
    ) -> DomainResult<Option<EventUpliftRule>> {
        self.db.with_conn(|conn| {
            Self::resolve_in(conn, delivery_date, sku, category, department)
        })
    }

    pub(crate) fn resolve_in(
        conn: &Connection,
        delivery_date: NaiveDate,
        sku: &str,
        category: Option<&str>,
        department: Option<&str>,
    ) -> DomainResult<Option<EventUpliftRule>> {
        let probes: [(ScopeType, Option<&str>); 4] = [
            (ScopeType::Sku, Some(sku)),
            (ScopeType::Department, department),
            (ScopeType::Category, category),
            (ScopeType::All, Some("")),
        ];
        for (scope, key) in probes {
            let Some(key) = key else { continue };
            let mut stmt = conn.prepare_cached(
                "SELECT delivery_date, scope_type, scope_key, reason, strength, notes
                 FROM event_uplift_rules
                 WHERE delivery_date = ?1 AND scope_type = ?2 AND scope_key = ?3",
            )?;
            let mut rows = stmt.query(params![date_to_sql(delivery_date), scope.as_str(), key])?;
            if let Some(row) = rows.next()? {
                return Ok(Some(row_to_rule(row)?));
            }
        }
        Ok(None)
    }

    pub fn list_for_date(&self, delivery_date: NaiveDate) -> DomainResult<Vec<EventUpliftRule>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT delivery_date, scope_type, scope_key, reason, strength, notes
                 FROM event_uplift_rules WHERE delivery_date = ?1
                 ORDER BY scope_type, scope_key",
            )?;
            let mut rows = stmt.query([date_to_sql(delivery_date)])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                out.push(row_to_rule(row)?);
            }
            Ok(out)
        })
    }
}

fn row_to_rule(row: &Row) -> DomainResult<EventUpliftRule> {
    let date_str: String = row.get(0)?;
    let scope_str: String = row.get(1)?;
    let strength_str: String = row.get(4)?;
    Ok(EventUpliftRule {
        delivery_date: date_from_sql(&date_str)?,
        scope_type: ScopeType::parse(&scope_str)
            .ok_or_else(|| DomainError::business_rule(format!("bad scope: {}", scope_str)))?,
        scope_key: row.get(2)?,
        reason: row.get(3)?,
        strength: UpliftStrength::parse(&strength_str).ok_or_else(|| {
            DomainError::business_rule(format!("bad strength: {}", strength_str))
        })?,
        notes: row.get(5)?,
    })
}
