//! Startup health checks and database statistics.
//!
//! Checks run on every open. Critical findings (schema table missing,
//! orphaned business rows, negative lot stock) abort the open; the rest are
//! logged as warnings.

use rusqlite::Connection;
use serde::Serialize;

use crate::errors::DomainResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FindingLevel {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthFinding {
    pub check: String,
    pub level: FindingLevel,
    pub detail: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HealthReport {
    pub findings: Vec<HealthFinding>,
}

impl HealthReport {
    fn push(&mut self, check: &str, level: FindingLevel, detail: String) {
        self.findings.push(HealthFinding {
            check: check.to_string(),
            level,
            detail,
        });
    }

    pub fn has_critical(&self) -> bool {
        self.findings.iter().any(|f| f.level == FindingLevel::Critical)
    }

    pub fn summary(&self) -> String {
        if self.findings.is_empty() {
            return "ok".to_string();
        }
        self.findings
            .iter()
            .map(|f| format!("{}: {}", f.check, f.detail))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

const REQUIRED_TABLES: &[&str] = &[
    "skus",
    "transactions",
    "sales",
    "order_logs",
    "receiving_logs",
    "order_receipts",
    "lots",
    "promo_calendar",
    "event_uplift_rules",
    "audit_log",
    "settings",
    "holidays",
];

pub fn run_health_checks(conn: &Connection) -> DomainResult<HealthReport> {
    let mut report = HealthReport::default();

    for table in REQUIRED_TABLES {
        let present: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |r| r.get(0),
        )?;
        if present == 0 {
            report.push(
                "schema",
                FindingLevel::Critical,
                format!("required table missing: {}", table),
            );
        }
    }
    if report.has_critical() {
        return Ok(report);
    }

    // Ledger rows must reference existing SKUs. FK enforcement makes this
    // unreachable in normal operation; a hit means outside interference.
    let orphans: i64 = conn.query_row(
        "SELECT COUNT(*) FROM transactions t
         LEFT JOIN skus s ON s.sku = t.sku
         WHERE s.sku IS NULL",
        [],
        |r| r.get(0),
    )?;
    if orphans > 0 {
        report.push(
            "ledger",
            FindingLevel::Critical,
            format!("{} transactions reference missing SKUs", orphans),
        );
    }

    let over_received: i64 = conn.query_row(
        "SELECT COUNT(*) FROM order_logs WHERE qty_received > qty_ordered",
        [],
        |r| r.get(0),
    )?;
    if over_received > 0 {
        report.push(
            "orders",
            FindingLevel::Critical,
            format!("{} orders received more than ordered", over_received),
        );
    }

    let negative_lots: i64 = conn.query_row(
        "SELECT COUNT(*) FROM lots WHERE qty_on_hand < 0",
        [],
        |r| r.get(0),
    )?;
    if negative_lots > 0 {
        report.push(
            "lots",
            FindingLevel::Critical,
            format!("{} lots with negative stock", negative_lots),
        );
    }

    // Status must agree with the received quantities (derived column).
    let status_drift: i64 = conn.query_row(
        "SELECT COUNT(*) FROM order_logs WHERE status <>
             CASE
                 WHEN qty_received = 0 THEN 'PENDING'
                 WHEN qty_received < qty_ordered THEN 'PARTIAL'
                 ELSE 'RECEIVED'
             END",
        [],
        |r| r.get(0),
    )?;
    if status_drift > 0 {
        report.push(
            "orders",
            FindingLevel::Warning,
            format!("{} orders with drifted status", status_drift),
        );
    }

    Ok(report)
}

/// Database statistics for the debug bundle.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub page_count: i64,
    pub page_size: i64,
    pub freelist_count: i64,
    pub schema_version: i64,
    pub table_rows: Vec<(String, i64)>,
    pub indexes: Vec<String>,
}

pub fn collect_stats(conn: &Connection) -> DomainResult<DatabaseStats> {
    let page_count: i64 = conn.query_row("PRAGMA page_count", [], |r| r.get(0))?;
    let page_size: i64 = conn.query_row("PRAGMA page_size", [], |r| r.get(0))?;
    let freelist_count: i64 = conn.query_row("PRAGMA freelist_count", [], |r| r.get(0))?;
    let schema_version = crate::storage::migrations::current_version(conn)?;

    let mut table_rows = Vec::new();
    for table in REQUIRED_TABLES {
        let rows: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?;
        table_rows.push((table.to_string(), rows));
    }

    let mut indexes = Vec::new();
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'index' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        indexes.push(row.get::<_, String>(0)?);
    }

    Ok(DatabaseStats {
        page_count,
        page_size,
        freelist_count,
        schema_version,
        table_rows,
        indexes,
    })
}
