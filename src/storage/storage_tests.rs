use tempfile::TempDir;

use crate::errors::DomainError;
use crate::storage::{backup, migrations, Database, TxBehavior};

fn temp_db() -> (TempDir, Database) {
    let dir = TempDir::new().unwrap();
    let db = Database::open(dir.path().join("engine.db")).unwrap();
    (dir, db)
}

#[test]
fn open_applies_all_migrations() {
    let (_dir, db) = temp_db();
    let version = db
        .with_conn(|conn| migrations::current_version(conn))
        .unwrap();
    assert_eq!(version, migrations::latest_version());
}

#[test]
fn reopen_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("engine.db");
    {
        let _db = Database::open(&path).unwrap();
    }
    // Second open must find the schema already at the latest version.
    let db = Database::open(&path).unwrap();
    let version = db
        .with_conn(|conn| migrations::current_version(conn))
        .unwrap();
    assert_eq!(version, migrations::latest_version());
}

#[test]
fn tx_rolls_back_on_error() {
    let (_dir, db) = temp_db();

    let result: Result<(), DomainError> = db.with_tx(TxBehavior::Immediate, |conn| {
        conn.execute(
            "INSERT INTO skus (sku, description) VALUES ('S1', 'probe')",
            [],
        )?;
        Err(DomainError::business_rule("forced failure"))
    });
    assert!(result.is_err());

    let count: i64 = db
        .with_conn(|conn| {
            Ok(conn
                .query_row("SELECT COUNT(*) FROM skus", [], |r| r.get(0))
                .unwrap())
        })
        .unwrap();
    assert_eq!(count, 0, "rollback must discard the insert");
}

#[test]
fn tx_commits_on_success() {
    let (_dir, db) = temp_db();

    db.with_tx(TxBehavior::Immediate, |conn| {
        conn.execute(
            "INSERT INTO skus (sku, description) VALUES ('S1', 'probe')",
            [],
        )?;
        Ok(())
    })
    .unwrap();

    let count: i64 = db
        .with_conn(|conn| {
            Ok(conn
                .query_row("SELECT COUNT(*) FROM skus", [], |r| r.get(0))
                .unwrap())
        })
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn unique_breach_maps_to_duplicate_key() {
    let (_dir, db) = temp_db();

    db.with_tx(TxBehavior::Immediate, |conn| {
        conn.execute(
            "INSERT INTO skus (sku, description) VALUES ('S1', 'probe')",
            [],
        )?;
        conn.execute(
            "INSERT INTO order_logs (order_id, date, sku, qty_ordered)
             VALUES ('ORD_1', '2026-01-05', 'S1', 10)",
            [],
        )?;
        Ok(())
    })
    .unwrap();

    let err = db
        .with_tx(TxBehavior::Immediate, |conn| {
            conn.execute(
                "INSERT INTO order_logs (order_id, date, sku, qty_ordered)
                 VALUES ('ORD_1', '2026-01-06', 'S1', 5)",
                [],
            )?;
            Ok(())
        })
        .unwrap_err();
    assert!(err.is_duplicate(), "got {:?}", err);
}

#[test]
fn fk_restrict_maps_to_foreign_key() {
    let (_dir, db) = temp_db();

    db.with_tx(TxBehavior::Immediate, |conn| {
        conn.execute(
            "INSERT INTO skus (sku, description) VALUES ('S1', 'probe')",
            [],
        )?;
        conn.execute(
            "INSERT INTO transactions (date, sku, event, qty)
             VALUES ('2026-01-05', 'S1', 'SALE', 3)",
            [],
        )?;
        Ok(())
    })
    .unwrap();

    let err = db
        .with_tx(TxBehavior::Immediate, |conn| {
            conn.execute("DELETE FROM skus WHERE sku = 'S1'", [])?;
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, DomainError::ForeignKey { .. }), "got {:?}", err);
}

#[test]
fn backup_creates_stamped_file() {
    let (dir, db) = temp_db();
    let backup_dir = dir.path().join("backups");
    let path = backup::create_backup(&db, Some(&backup_dir)).unwrap();
    assert!(path.is_file());
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("app_backup_"));
    assert!(name.ends_with(".db"));
}

#[test]
fn retention_keeps_daily_weekly_monthly_buckets() {
    let dir = TempDir::new().unwrap();
    // Thirty synthetic daily backups, one per day.
    for day in 1..=30 {
        let name = format!("app_backup_202601{:02}_120000.db", day);
        std::fs::write(dir.path().join(name), b"x").unwrap();
    }
    backup::apply_retention(
        dir.path(),
        backup::BackupRetention {
            daily: 7,
            weekly: 4,
            monthly: 12,
        },
    )
    .unwrap();

    let remaining: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    // The 7 newest days survive; older files survive only as weekly or
    // monthly bucket representatives.
    assert!(remaining.contains(&"app_backup_20260130_120000.db".to_string()));
    assert!(remaining.contains(&"app_backup_20260124_120000.db".to_string()));
    assert!(remaining.len() < 30);
    assert!(remaining.len() >= 7);
}
