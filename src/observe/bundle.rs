//! Debug bundle export.
//!
//! A directory containing everything needed to reproduce a support case:
//! a checkpointed database snapshot, the most recent audit rows as a
//! table, database statistics, environment info, the settings blob, a
//! manifest, and a README. Members can optionally be gzip-compressed.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::json;
use tracing::info;

use crate::repos::{AuditRepo, SettingsRepo};
use crate::storage::{health, Database};

#[derive(Debug, Clone)]
pub struct BundleOptions {
    /// How many recent audit rows to include.
    pub audit_rows: i64,
    /// Gzip each bundle member.
    pub compress: bool,
}

impl Default for BundleOptions {
    fn default() -> Self {
        Self {
            audit_rows: 500,
            compress: false,
        }
    }
}

const BUNDLE_README: &str = "\
Debug bundle contents:
- snapshot.db           checkpointed copy of the live database
- audit_recent.csv      most recent audit rows, newest first
- db_stats.json         page counts, per-table row counts, indexes
- environment.json      build and platform info
- settings.json         the settings blob as stored
- manifest.json         bundle metadata
Members may carry a .gz suffix when the bundle was exported compressed.
";

pub fn export_debug_bundle(
    db: &Database,
    dest_dir: &Path,
    options: &BundleOptions,
) -> Result<PathBuf> {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let bundle_dir = dest_dir.join(format!("debug_bundle_{}", stamp));
    fs::create_dir_all(&bundle_dir)
        .with_context(|| format!("creating {}", bundle_dir.display()))?;

    // Database snapshot after a checkpoint.
    db.with_conn(|conn| {
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    })
    .context("checkpoint before snapshot")?;
    let snapshot = fs::read(db.path()).context("reading database file")?;
    write_member(&bundle_dir, "snapshot.db", &snapshot, options.compress)?;

    // Recent audit rows, tabular.
    let audit = AuditRepo::new(db).recent(options.audit_rows)?;
    let mut table = String::from("audit_id,timestamp,operation,user,sku,details,run_id\n");
    for entry in &audit {
        table.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            entry.audit_id,
            entry.timestamp,
            csv(&entry.operation),
            csv(&entry.user),
            csv(entry.sku.as_deref().unwrap_or("")),
            csv(&entry.details),
            csv(entry.run_id.as_deref().unwrap_or("")),
        ));
    }
    write_member(&bundle_dir, "audit_recent.csv", table.as_bytes(), options.compress)?;

    // Statistics.
    let stats = db.with_conn(|conn| health::collect_stats(conn))?;
    write_member(
        &bundle_dir,
        "db_stats.json",
        serde_json::to_string_pretty(&stats)?.as_bytes(),
        options.compress,
    )?;

    // Environment.
    let environment = json!({
        "engine_version": env!("CARGO_PKG_VERSION"),
        "os": std::env::consts::OS,
        "arch": std::env::consts::ARCH,
        "exported_at": Utc::now().to_rfc3339(),
    });
    write_member(
        &bundle_dir,
        "environment.json",
        serde_json::to_string_pretty(&environment)?.as_bytes(),
        options.compress,
    )?;

    // Settings blob.
    let settings = SettingsRepo::new(db).get()?;
    write_member(
        &bundle_dir,
        "settings.json",
        serde_json::to_string_pretty(&settings)?.as_bytes(),
        options.compress,
    )?;

    // Manifest + README.
    let manifest = json!({
        "bundle": bundle_dir.file_name().map(|n| n.to_string_lossy().to_string()),
        "database_path": db.path().display().to_string(),
        "audit_rows": audit.len(),
        "compressed": options.compress,
    });
    write_member(
        &bundle_dir,
        "manifest.json",
        serde_json::to_string_pretty(&manifest)?.as_bytes(),
        options.compress,
    )?;
    write_member(&bundle_dir, "README.md", BUNDLE_README.as_bytes(), false)?;

    info!(bundle = %bundle_dir.display(), "debug bundle exported");
    Ok(bundle_dir)
}

fn write_member(dir: &Path, name: &str, data: &[u8], compress: bool) -> Result<()> {
    if compress {
        let path = dir.join(format!("{}.gz", name));
        let file = fs::File::create(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(data)?;
        encoder.finish()?;
    } else {
        fs::write(dir.join(name), data)
            .with_context(|| format!("writing {}", dir.join(name).display()))?;
    }
    Ok(())
}

fn csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
