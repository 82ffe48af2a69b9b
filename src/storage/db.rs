//! Database handle and connection pool.
//!
//! A small pool of rusqlite connections to one file. Each connection gets
//! the session pragmas on open (foreign keys, WAL, busy timeout); each
//! checkout bumps a reuse counter and connections are recycled after a soft
//! reuse limit. Exceeding the simultaneous-checkout threshold logs a leak
//! warning but does not fail the caller.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info, warn};

use crate::errors::{DomainError, DomainResult};
use crate::storage::health;
use crate::storage::migrations;

/// Soft per-connection reuse limit; past it the connection is recycled.
const CONN_REUSE_LIMIT: u64 = 100;

/// Simultaneously checked-out connections above this count log a warning.
const CONN_LEAK_THRESHOLD: usize = 20;

/// Busy-retry budget: attempts and exponential backoff bounds.
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_MS: u64 = 100;
const RETRY_MAX_MS: u64 = 600;

const BUSY_TIMEOUT_MS: i64 = 30_000;

/// Transaction isolation for the scoped helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxBehavior {
    Deferred,
    Immediate,
    Exclusive,
}

impl TxBehavior {
    fn begin_sql(&self) -> &'static str {
        match self {
            TxBehavior::Deferred => "BEGIN DEFERRED",
            TxBehavior::Immediate => "BEGIN IMMEDIATE",
            TxBehavior::Exclusive => "BEGIN EXCLUSIVE",
        }
    }
}

struct PooledConn {
    conn: Connection,
    uses: u64,
}

struct PoolInner {
    path: PathBuf,
    idle: Mutex<Vec<PooledConn>>,
    checked_out: AtomicUsize,
}

/// Shared handle to the embedded store. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    inner: Arc<PoolInner>,
}

impl Database {
    /// Open (or create) the database at `path`.
    ///
    /// Runs the full startup sequence and refuses to open on a critical
    /// health failure.
    pub fn open(path: impl AsRef<Path>) -> DomainResult<Self> {
        let path = path.as_ref().to_path_buf();
        let db = Self {
            inner: Arc::new(PoolInner {
                path: path.clone(),
                idle: Mutex::new(Vec::new()),
                checked_out: AtomicUsize::new(0),
            }),
        };

        let version = {
            let guard = db.acquire()?;
            let version = migrations::apply_migrations(&guard)?;
            Self::verify_pragmas(&guard)?;
            version
        };

        let report = db.with_conn(|conn| health::run_health_checks(conn))?;
        if report.has_critical() {
            return Err(DomainError::critical(format!(
                "startup health checks failed: {}",
                report.summary()
            )));
        }
        for finding in &report.findings {
            warn!(check = %finding.check, detail = %finding.detail, "health finding");
        }

        info!(
            path = %path.display(),
            schema_version = version,
            "database open"
        );
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    fn open_raw(path: &Path) -> DomainResult<Connection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)?;
        conn.busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS as u64))?;
        // journal_mode returns a row; run it separately from the batch.
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |r| r.get(0))?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;
             PRAGMA temp_store = MEMORY;",
        )?;
        Ok(conn)
    }

    fn verify_pragmas(conn: &Connection) -> DomainResult<()> {
        let fk: i64 = conn.query_row("PRAGMA foreign_keys", [], |r| r.get(0))?;
        if fk != 1 {
            return Err(DomainError::critical("foreign_keys pragma is not active"));
        }
        let journal: String = conn.query_row("PRAGMA journal_mode", [], |r| r.get(0))?;
        if !journal.eq_ignore_ascii_case("wal") && !journal.eq_ignore_ascii_case("memory") {
            warn!(journal_mode = %journal, "WAL mode not active");
        }
        Ok(())
    }

    /// Check a connection out of the pool.
    fn acquire(&self) -> DomainResult<ConnGuard<'_>> {
        let pooled = {
            let mut idle = self.inner.idle.lock();
            idle.pop()
        };
        let pooled = match pooled {
            Some(p) => p,
            None => PooledConn {
                conn: Self::open_raw(&self.inner.path)?,
                uses: 0,
            },
        };

        let out = self.inner.checked_out.fetch_add(1, Ordering::SeqCst) + 1;
        if out > CONN_LEAK_THRESHOLD {
            warn!(
                checked_out = out,
                "connection leak suspected: more than {} connections in flight",
                CONN_LEAK_THRESHOLD
            );
        }

        Ok(ConnGuard {
            pool: &self.inner,
            pooled: Some(pooled),
        })
    }

    /// Run a read-mostly closure with a pooled connection.
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> DomainResult<T>,
    ) -> DomainResult<T> {
        let guard = self.acquire()?;
        f(&guard)
    }

    /// Scoped transaction: BEGIN with the requested isolation, run `f`,
    /// COMMIT on `Ok`, ROLLBACK on `Err`. Transient lock errors during
    /// begin/body/commit retry the whole closure up to the retry budget.
    ///
    /// `f` must therefore be safe to re-run after rollback (every caller in
    /// this crate builds its writes idempotently or derives them from the
    /// same inputs on each attempt).
    pub fn with_tx<T>(
        &self,
        behavior: TxBehavior,
        mut f: impl FnMut(&Connection) -> DomainResult<T>,
    ) -> DomainResult<T> {
        let guard = self.acquire()?;
        retry_on_busy(|| {
            guard.execute_batch(behavior.begin_sql()).map_err(DomainError::from)?;
            match f(&guard) {
                Ok(value) => {
                    guard.execute_batch("COMMIT").map_err(|e| {
                        let _ = guard.execute_batch("ROLLBACK");
                        DomainError::from(e)
                    })?;
                    Ok(value)
                }
                Err(err) => {
                    let _ = guard.execute_batch("ROLLBACK");
                    Err(err)
                }
            }
        })
    }
}

/// RAII checkout; returns the connection to the pool (or recycles it past
/// the reuse limit) on drop.
pub struct ConnGuard<'a> {
    pool: &'a PoolInner,
    pooled: Option<PooledConn>,
}

impl std::ops::Deref for ConnGuard<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.pooled.as_ref().expect("connection present until drop").conn
    }
}

impl Drop for ConnGuard<'_> {
    fn drop(&mut self) {
        self.pool.checked_out.fetch_sub(1, Ordering::SeqCst);
        if let Some(mut pooled) = self.pooled.take() {
            pooled.uses += 1;
            if pooled.uses >= CONN_REUSE_LIMIT {
                debug!(uses = pooled.uses, "recycling connection past reuse limit");
                return; // dropped, not returned
            }
            self.pool.idle.lock().push(pooled);
        }
    }
}

/// Retry `f` on transient busy/locked errors with exponential backoff
/// (100 ms, 300 ms, 600 ms). After the budget the Transient error is
/// surfaced to the caller (DB_001).
pub fn retry_on_busy<T>(mut f: impl FnMut() -> DomainResult<T>) -> DomainResult<T> {
    let mut delay_ms = RETRY_BASE_MS;
    let mut last_err: Option<DomainError> = None;

    for attempt in 1..=RETRY_ATTEMPTS {
        match f() {
            Ok(value) => return Ok(value),
            Err(err @ DomainError::Transient { .. }) => {
                warn!(attempt, backoff_ms = delay_ms, "store busy, retrying");
                last_err = Some(err);
                if attempt < RETRY_ATTEMPTS {
                    std::thread::sleep(Duration::from_millis(delay_ms));
                    delay_ms = (delay_ms * 3).min(RETRY_MAX_MS);
                }
            }
            Err(other) => return Err(other),
        }
    }

    Err(last_err.unwrap_or_else(|| DomainError::Transient {
        message: "retry budget exhausted".to_string(),
    }))
}
