//! Backup and restore.
//!
//! A backup is a WAL checkpoint followed by a byte copy of the database
//! file into `backups/app_backup_YYYYMMDD_HHMMSS.db` next to the live
//! file. Retention keeps 7 daily, 4 weekly, and 12 monthly copies;
//! everything else is pruned oldest-first.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Utc};
use tracing::{info, warn};

use crate::storage::{Database, TxBehavior};

const BACKUP_PREFIX: &str = "app_backup_";
const BACKUP_SUFFIX: &str = ".db";

#[derive(Debug, Clone, Copy)]
pub struct BackupRetention {
    pub daily: usize,
    pub weekly: usize,
    pub monthly: usize,
}

impl Default for BackupRetention {
    fn default() -> Self {
        Self {
            daily: 7,
            weekly: 4,
            monthly: 12,
        }
    }
}

/// Checkpoint the WAL and copy the database file. Returns the backup path.
pub fn create_backup(db: &Database, backup_dir: Option<&Path>) -> Result<PathBuf> {
    let src = db.path().to_path_buf();
    let dir = match backup_dir {
        Some(d) => d.to_path_buf(),
        None => src
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("backups"),
    };
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    db.with_conn(|conn| {
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    })
    .context("checkpoint before backup")?;

    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let dest = dir.join(format!("{}{}{}", BACKUP_PREFIX, stamp, BACKUP_SUFFIX));
    fs::copy(&src, &dest)
        .with_context(|| format!("copying {} to {}", src.display(), dest.display()))?;

    info!(backup = %dest.display(), "backup created");
    crate::repos::AuditRepo::new(db).append(
        "BACKUP_CREATED",
        "system",
        None,
        &dest.display().to_string(),
        None,
    )?;
    apply_retention(&dir, BackupRetention::default())?;
    Ok(dest)
}

/// Copy a backup file back over the live database. The caller must reopen
/// the `Database` afterwards; holding connections across a restore is not
/// supported.
pub fn restore_backup(db: &Database, backup_path: &Path) -> Result<()> {
    anyhow::ensure!(
        backup_path.is_file(),
        "backup file missing: {}",
        backup_path.display()
    );

    // Exclusive transaction drains other writers before the file swap.
    db.with_tx(TxBehavior::Exclusive, |conn| {
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    })
    .context("quiescing database before restore")?;

    fs::copy(backup_path, db.path()).with_context(|| {
        format!(
            "restoring {} over {}",
            backup_path.display(),
            db.path().display()
        )
    })?;
    info!(backup = %backup_path.display(), "backup restored");

    // Pooled connections may hold page caches from the pre-restore file;
    // the audit row goes through a fresh connection instead.
    let conn = rusqlite::Connection::open(db.path())
        .with_context(|| format!("reopening {}", db.path().display()))?;
    conn.execute(
        "INSERT INTO audit_log (operation, user, details) VALUES ('BACKUP_RESTORED', 'system', ?1)",
        [backup_path.display().to_string()],
    )
    .context("recording restore in audit log")?;
    Ok(())
}

fn parse_backup_stamp(name: &str) -> Option<NaiveDateTime> {
    let stamp = name
        .strip_prefix(BACKUP_PREFIX)?
        .strip_suffix(BACKUP_SUFFIX)?;
    NaiveDateTime::parse_from_str(stamp, "%Y%m%d_%H%M%S").ok()
}

/// Keep the newest backup per day for `daily` days, per ISO week for
/// `weekly` weeks, per month for `monthly` months; delete the rest.
pub fn apply_retention(dir: &Path, retention: BackupRetention) -> Result<()> {
    let mut stamped: Vec<(NaiveDateTime, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(ts) = parse_backup_stamp(&name) {
            stamped.push((ts, entry.path()));
        }
    }
    // Newest first; the newest file per bucket wins.
    stamped.sort_by(|a, b| b.0.cmp(&a.0));

    let mut keep: BTreeSet<PathBuf> = BTreeSet::new();
    let mut daily_seen: BTreeSet<NaiveDate> = BTreeSet::new();
    let mut weekly_seen: BTreeSet<(i32, u32)> = BTreeSet::new();
    let mut monthly_seen: BTreeSet<(i32, u32)> = BTreeSet::new();

    for (ts, path) in &stamped {
        let date = ts.date();
        if daily_seen.len() < retention.daily && daily_seen.insert(date) {
            keep.insert(path.clone());
        }
        let week = (date.iso_week().year(), date.iso_week().week());
        if weekly_seen.len() < retention.weekly && weekly_seen.insert(week) {
            keep.insert(path.clone());
        }
        let month = (date.year(), date.month());
        if monthly_seen.len() < retention.monthly && monthly_seen.insert(month) {
            keep.insert(path.clone());
        }
    }

    for (_, path) in &stamped {
        if !keep.contains(path) {
            if let Err(e) = fs::remove_file(path) {
                warn!(file = %path.display(), error = %e, "failed to prune backup");
            }
        }
    }
    Ok(())
}
