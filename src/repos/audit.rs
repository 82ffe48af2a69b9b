//! Audit-log repository.
//!
//! Timestamps are assigned by the store (DEFAULT clause), so audit rows are
//! timestamp-ordered among themselves but are not a causal clock for the
//! business tables.

use rusqlite::{params, Connection, Row};

use crate::errors::DomainResult;
use crate::models::AuditEntry;
use crate::storage::{Database, TxBehavior};

#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub sku: Option<String>,
    pub operation: Option<String>,
    pub run_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Aggregate view of one batch run.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub run_id: String,
    pub event_count: usize,
    pub first_timestamp: Option<String>,
    pub last_timestamp: Option<String>,
    /// Wall-clock span between the first and last event, when both
    /// timestamps parse.
    pub duration_seconds: Option<f64>,
    pub events: Vec<AuditEntry>,
}

fn parse_store_timestamp(ts: &str) -> Option<chrono::NaiveDateTime> {
    chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.fZ").ok()
}

pub struct AuditRepo {
    db: Database,
}

impl AuditRepo {
    pub fn new(db: &Database) -> Self {
        Self { db: db.clone() }
    }

    pub fn append(
        &self,
        operation: &str,
        user: &str,
        sku: Option<&str>,
        details: &str,
        run_id: Option<&str>,
    ) -> DomainResult<i64> {
        self.db.with_tx(TxBehavior::Immediate, |conn| {
            Self::append_in(conn, operation, user, sku, details, run_id)
        })
    }

    pub(crate) fn append_in(
        conn: &Connection,
        operation: &str,
        user: &str,
        sku: Option<&str>,
        details: &str,
        run_id: Option<&str>,
    ) -> DomainResult<i64> {
        conn.execute(
            "INSERT INTO audit_log (operation, user, sku, details, run_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![operation, user, sku, details, run_id],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Filtered, paginated query ordered newest first.
    pub fn query(&self, filter: &AuditFilter) -> DomainResult<Vec<AuditEntry>> {
        self.db.with_conn(|conn| {
            let limit = filter.limit.unwrap_or(100).max(0);
            let offset = filter.offset.unwrap_or(0).max(0);
            let mut stmt = conn.prepare_cached(
                "SELECT audit_id, timestamp, operation, user, sku, details, run_id
                 FROM audit_log
                 WHERE (?1 IS NULL OR sku = ?1)
                   AND (?2 IS NULL OR operation = ?2)
                   AND (?3 IS NULL OR run_id = ?3)
                 ORDER BY timestamp DESC, audit_id DESC
                 LIMIT ?4 OFFSET ?5",
            )?;
            let mut rows = stmt.query(params![
                filter.sku,
                filter.operation,
                filter.run_id,
                limit,
                offset
            ])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                out.push(row_to_entry(row)?);
            }
            Ok(out)
        })
    }

    /// Everything recorded under one run_id, oldest first, with timing.
    pub fn batch_summary(&self, run_id: &str) -> DomainResult<BatchSummary> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT audit_id, timestamp, operation, user, sku, details, run_id
                 FROM audit_log WHERE run_id = ?1
                 ORDER BY timestamp ASC, audit_id ASC",
            )?;
            let mut rows = stmt.query([run_id])?;
            let mut events = Vec::new();
            while let Some(row) = rows.next()? {
                events.push(row_to_entry(row)?);
            }
            let first_timestamp = events.first().map(|e| e.timestamp.clone());
            let last_timestamp = events.last().map(|e| e.timestamp.clone());
            let duration_seconds = match (
                first_timestamp.as_deref().and_then(parse_store_timestamp),
                last_timestamp.as_deref().and_then(parse_store_timestamp),
            ) {
                (Some(first), Some(last)) => {
                    Some((last - first).num_milliseconds() as f64 / 1000.0)
                }
                _ => None,
            };
            Ok(BatchSummary {
                run_id: run_id.to_string(),
                event_count: events.len(),
                first_timestamp,
                last_timestamp,
                duration_seconds,
                events,
            })
        })
    }

    /// Most recent rows for the debug bundle.
    pub fn recent(&self, limit: i64) -> DomainResult<Vec<AuditEntry>> {
        self.query(&AuditFilter {
            limit: Some(limit),
            ..Default::default()
        })
    }
}

fn row_to_entry(row: &Row) -> DomainResult<AuditEntry> {
    Ok(AuditEntry {
        audit_id: row.get(0)?,
        timestamp: row.get(1)?,
        operation: row.get(2)?,
        user: row.get(3)?,
        sku: row.get(4)?,
        details: row.get(5)?,
        run_id: row.get(6)?,
    })
}
