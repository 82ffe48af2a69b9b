//! Numbered schema migrations.
//!
//! Applied in order inside one transaction each; `schema_migrations` holds
//! the current-version row. A database written by a newer schema than this
//! build knows is refused (mixing schemas at runtime is disallowed).

use rusqlite::Connection;
use tracing::info;

use crate::errors::{DomainError, DomainResult};

pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub sql: &'static str,
}

/// Base schema: every aggregate table with its CHECK constraints and
/// foreign-key actions.
const V1_BASE_SCHEMA: &str = r#"
CREATE TABLE skus (
    sku TEXT PRIMARY KEY,
    description TEXT NOT NULL DEFAULT '',
    ean TEXT,
    category TEXT,
    department TEXT,
    in_assortment INTEGER NOT NULL DEFAULT 1 CHECK (in_assortment IN (0, 1)),
    moq INTEGER NOT NULL DEFAULT 0 CHECK (moq >= 0),
    pack_size INTEGER NOT NULL DEFAULT 1 CHECK (pack_size >= 1),
    lead_time_days INTEGER NOT NULL DEFAULT 1,
    review_period_days INTEGER NOT NULL DEFAULT 1,
    safety_stock REAL NOT NULL DEFAULT 0,
    reorder_point REAL NOT NULL DEFAULT 0,
    max_stock INTEGER NOT NULL DEFAULT 0,
    shelf_life_days INTEGER NOT NULL DEFAULT 0 CHECK (shelf_life_days >= 0),
    min_shelf_life_days INTEGER NOT NULL DEFAULT 0,
    waste_penalty_mode TEXT NOT NULL DEFAULT ''
        CHECK (waste_penalty_mode IN ('', 'soft', 'hard')),
    waste_penalty_factor REAL NOT NULL DEFAULT 0
        CHECK (waste_penalty_factor BETWEEN 0 AND 1),
    waste_risk_threshold REAL NOT NULL DEFAULT 0
        CHECK (waste_risk_threshold BETWEEN 0 AND 100),
    demand_variability TEXT
        CHECK (demand_variability IS NULL
               OR demand_variability IN ('STABLE', 'LOW', 'HIGH', 'SEASONAL')),
    target_csl REAL NOT NULL DEFAULT 0 CHECK (target_csl >= 0 AND target_csl < 1),
    forecast_method TEXT,
    mc_distribution TEXT,
    mc_n_simulations INTEGER,
    mc_random_seed INTEGER,
    mc_output_stat TEXT,
    mc_output_percentile REAL,
    mc_horizon_mode TEXT,
    mc_horizon_days INTEGER,
    oos_popup_preference TEXT NOT NULL DEFAULT 'ask'
        CHECK (oos_popup_preference IN ('ask', 'always_yes', 'always_no')),
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE transactions (
    transaction_id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    sku TEXT NOT NULL REFERENCES skus(sku) ON DELETE RESTRICT,
    event TEXT NOT NULL CHECK (event IN
        ('SNAPSHOT', 'ORDER', 'RECEIPT', 'SALE', 'WASTE', 'ADJUST', 'UNFULFILLED')),
    qty INTEGER NOT NULL,
    receipt_date TEXT,
    note TEXT
);

CREATE TABLE sales (
    date TEXT NOT NULL,
    sku TEXT NOT NULL REFERENCES skus(sku) ON DELETE RESTRICT,
    qty_sold INTEGER NOT NULL CHECK (qty_sold >= 0),
    promo_flag INTEGER NOT NULL DEFAULT 0 CHECK (promo_flag IN (0, 1)),
    PRIMARY KEY (date, sku)
);

CREATE TABLE order_logs (
    order_id TEXT NOT NULL UNIQUE,
    date TEXT NOT NULL,
    sku TEXT NOT NULL REFERENCES skus(sku) ON DELETE RESTRICT,
    qty_ordered INTEGER NOT NULL CHECK (qty_ordered > 0),
    qty_received INTEGER NOT NULL DEFAULT 0
        CHECK (qty_received >= 0 AND qty_received <= qty_ordered),
    status TEXT NOT NULL DEFAULT 'PENDING'
        CHECK (status IN ('PENDING', 'PARTIAL', 'RECEIVED')),
    receipt_date TEXT,
    explain TEXT
);

CREATE TABLE receiving_logs (
    document_id TEXT NOT NULL,
    receipt_id TEXT NOT NULL,
    date TEXT NOT NULL,
    sku TEXT NOT NULL REFERENCES skus(sku) ON DELETE RESTRICT,
    qty_received INTEGER NOT NULL CHECK (qty_received > 0),
    receipt_date TEXT NOT NULL,
    UNIQUE (document_id, sku)
);

CREATE TABLE order_receipts (
    order_id TEXT NOT NULL REFERENCES order_logs(order_id) ON DELETE CASCADE,
    document_id TEXT NOT NULL,
    PRIMARY KEY (order_id, document_id)
);

CREATE TABLE lots (
    lot_id TEXT NOT NULL UNIQUE,
    sku TEXT NOT NULL REFERENCES skus(sku) ON DELETE RESTRICT,
    qty_on_hand INTEGER NOT NULL CHECK (qty_on_hand >= 0),
    expiry_date TEXT,
    receipt_id TEXT
);

CREATE TABLE promo_calendar (
    sku TEXT NOT NULL REFERENCES skus(sku) ON DELETE RESTRICT,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL CHECK (end_date >= start_date),
    store_id TEXT NOT NULL DEFAULT '',
    UNIQUE (sku, start_date, end_date, store_id)
);

CREATE TABLE event_uplift_rules (
    delivery_date TEXT NOT NULL,
    scope_type TEXT NOT NULL CHECK (scope_type IN ('ALL', 'CATEGORY', 'DEPARTMENT', 'SKU')),
    scope_key TEXT NOT NULL DEFAULT '',
    reason TEXT NOT NULL DEFAULT '',
    strength TEXT NOT NULL CHECK (strength IN ('LOW', 'MED', 'HIGH')),
    notes TEXT,
    UNIQUE (delivery_date, scope_type, scope_key)
);

CREATE TABLE audit_log (
    audit_id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    operation TEXT NOT NULL,
    user TEXT NOT NULL DEFAULT '',
    sku TEXT,
    details TEXT NOT NULL DEFAULT '',
    run_id TEXT
);

CREATE TABLE settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    data TEXT NOT NULL
);

CREATE TABLE holidays (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    data TEXT NOT NULL
);
"#;

/// Query-path indexes, including the partial index over the active
/// assortment and the audit run-id lookups.
const V2_INDEXES: &str = r#"
CREATE INDEX idx_transactions_sku_date ON transactions(sku, date);
CREATE INDEX idx_sales_sku_date ON sales(sku, date);
CREATE INDEX idx_order_logs_sku_status ON order_logs(sku, status);
CREATE INDEX idx_lots_sku_expiry ON lots(sku, expiry_date);
CREATE INDEX idx_receiving_logs_document ON receiving_logs(document_id);
CREATE INDEX idx_skus_active ON skus(sku) WHERE in_assortment = 1;
CREATE INDEX idx_audit_log_run_id ON audit_log(run_id);
CREATE INDEX idx_audit_log_timestamp ON audit_log(timestamp DESC);
"#;

/// Computed-metric cache, keyed (sku, date, mode).
const V3_KPI_CACHE: &str = r#"
CREATE TABLE kpi_daily (
    sku TEXT NOT NULL REFERENCES skus(sku) ON DELETE RESTRICT,
    date TEXT NOT NULL,
    mode TEXT NOT NULL,
    metrics TEXT NOT NULL DEFAULT '{}',
    PRIMARY KEY (sku, date, mode)
);
"#;

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "base schema",
        sql: V1_BASE_SCHEMA,
    },
    Migration {
        version: 2,
        name: "query indexes",
        sql: V2_INDEXES,
    },
    Migration {
        version: 3,
        name: "kpi daily cache",
        sql: V3_KPI_CACHE,
    },
];

pub fn latest_version() -> i64 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

pub fn current_version(conn: &Connection) -> DomainResult<i64> {
    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |r| r.get(0),
    )?;
    Ok(version)
}

/// Apply all pending migrations in order; returns the resulting version.
pub fn apply_migrations(conn: &Connection) -> DomainResult<i64> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
             version INTEGER PRIMARY KEY,
             applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
         );",
    )?;

    let on_disk = current_version(conn)?;
    let known = latest_version();
    if on_disk > known {
        return Err(DomainError::critical(format!(
            "database schema version {} is newer than this build supports ({})",
            on_disk, known
        )));
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > on_disk) {
        conn.execute_batch("BEGIN IMMEDIATE")?;
        let applied = conn
            .execute_batch(migration.sql)
            .and_then(|_| {
                conn.execute(
                    "INSERT INTO schema_migrations (version) VALUES (?1)",
                    [migration.version],
                )
            });
        match applied {
            Ok(_) => {
                conn.execute_batch("COMMIT")?;
                info!(version = migration.version, name = migration.name, "migration applied");
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                return Err(DomainError::critical(format!(
                    "migration {} ({}) failed: {}",
                    migration.version, migration.name, e
                )));
            }
        }
    }

    current_version(conn)
}
