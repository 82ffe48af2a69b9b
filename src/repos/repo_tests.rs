use chrono::NaiveDate;
use tempfile::TempDir;

use crate::config::Settings;
use crate::errors::DomainError;
use crate::models::*;
use crate::repos::*;
use crate::storage::Database;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn temp_db() -> (TempDir, Database) {
    let dir = TempDir::new().unwrap();
    let db = Database::open(dir.path().join("engine.db")).unwrap();
    (dir, db)
}

fn seed_sku(db: &Database, code: &str) {
    SkuRepo::new(db).upsert(&Sku::new(code, "test item")).unwrap();
}

#[test]
fn sku_upsert_then_update() {
    let (_dir, db) = temp_db();
    let repo = SkuRepo::new(&db);

    let mut sku = Sku::new("S1", "Milk 1L");
    sku.pack_size = 6;
    repo.upsert(&sku).unwrap();

    sku.description = "Milk 1L UHT".to_string();
    sku.max_stock = 120;
    repo.upsert(&sku).unwrap();

    let stored = repo.require("S1").unwrap();
    assert_eq!(stored.description, "Milk 1L UHT");
    assert_eq!(stored.pack_size, 6);
    assert_eq!(stored.max_stock, 120);
}

#[test]
fn sku_soft_delete_leaves_row() {
    let (_dir, db) = temp_db();
    let repo = SkuRepo::new(&db);
    seed_sku(&db, "S1");

    repo.toggle_assortment("S1", false).unwrap();
    assert!(repo.list_active().unwrap().is_empty());
    assert_eq!(repo.list_all().unwrap().len(), 1);
}

#[test]
fn sku_hard_delete_restricted_by_ledger() {
    let (_dir, db) = temp_db();
    let skus = SkuRepo::new(&db);
    let ledger = LedgerRepo::new(&db);
    seed_sku(&db, "S1");

    ledger
        .append(&Transaction::new(d(2026, 1, 5), "S1", StockEvent::Sale, 2))
        .unwrap();

    let err = skus.delete("S1").unwrap_err();
    assert!(matches!(err, DomainError::ForeignKey { .. }));
}

#[test]
fn ledger_replay_rows_ordered_by_priority() {
    let (_dir, db) = temp_db();
    let ledger = LedgerRepo::new(&db);
    seed_sku(&db, "S1");

    // Insert deliberately out of priority order on the same date.
    ledger
        .append(&Transaction::new(d(2026, 1, 5), "S1", StockEvent::Sale, 3))
        .unwrap();
    ledger
        .append(&Transaction::new(d(2026, 1, 5), "S1", StockEvent::Snapshot, 50))
        .unwrap();
    ledger
        .append(
            &Transaction::new(d(2026, 1, 5), "S1", StockEvent::Receipt, 10)
                .with_receipt_date(d(2026, 1, 5)),
        )
        .unwrap();

    let rows = ledger.replay_rows("S1", d(2026, 1, 6)).unwrap();
    let events: Vec<StockEvent> = rows.iter().map(|t| t.event).collect();
    assert_eq!(
        events,
        vec![StockEvent::Snapshot, StockEvent::Receipt, StockEvent::Sale]
    );
}

#[test]
fn ledger_batch_is_all_or_nothing() {
    let (_dir, db) = temp_db();
    let ledger = LedgerRepo::new(&db);
    seed_sku(&db, "S1");

    let batch = vec![
        Transaction::new(d(2026, 1, 5), "S1", StockEvent::Sale, 3),
        // Missing receipt_date on an ORDER row fails validation.
        Transaction::new(d(2026, 1, 5), "S1", StockEvent::Order, 10),
    ];
    assert!(ledger.append_batch(&batch).is_err());
    assert!(ledger.replay_rows("S1", d(2026, 2, 1)).unwrap().is_empty());
}

#[test]
fn order_duplicate_id_rejected() {
    let (_dir, db) = temp_db();
    let orders = OrdersRepo::new(&db);
    seed_sku(&db, "S1");

    let log = OrderLog {
        order_id: "ORD_20260105_001".to_string(),
        date: d(2026, 1, 5),
        sku: "S1".to_string(),
        qty_ordered: 50,
        qty_received: 0,
        status: OrderStatus::Pending,
        receipt_date: Some(d(2026, 1, 6)),
        explain: None,
    };
    orders.create_log(&log).unwrap();
    let err = orders.create_log(&log).unwrap_err();
    assert!(err.is_duplicate());
}

#[test]
fn order_receive_updates_status_and_caps() {
    let (_dir, db) = temp_db();
    let orders = OrdersRepo::new(&db);
    seed_sku(&db, "S1");

    orders
        .create_log(&OrderLog {
            order_id: "ORD_1".to_string(),
            date: d(2026, 1, 5),
            sku: "S1".to_string(),
            qty_ordered: 100,
            qty_received: 0,
            status: OrderStatus::Pending,
            receipt_date: None,
            explain: None,
        })
        .unwrap();

    orders.update_qty_received("ORD_1", 70).unwrap();
    assert_eq!(
        orders.get("ORD_1").unwrap().unwrap().status,
        OrderStatus::Partial
    );

    orders.update_qty_received("ORD_1", 100).unwrap();
    assert_eq!(
        orders.get("ORD_1").unwrap().unwrap().status,
        OrderStatus::Received
    );

    let err = orders.update_qty_received("ORD_1", 101).unwrap_err();
    assert!(matches!(err, DomainError::BusinessRule { .. }));
}

#[test]
fn lots_fefo_order_nulls_last() {
    let (_dir, db) = temp_db();
    let lots = LotsRepo::new(&db);
    seed_sku(&db, "S1");

    lots.insert(&Lot {
        lot_id: "L3".to_string(),
        sku: "S1".to_string(),
        qty_on_hand: 5,
        expiry_date: None,
        receipt_id: None,
    })
    .unwrap();
    lots.insert(&Lot {
        lot_id: "L1".to_string(),
        sku: "S1".to_string(),
        qty_on_hand: 5,
        expiry_date: Some(d(2026, 3, 1)),
        receipt_id: None,
    })
    .unwrap();
    lots.insert(&Lot {
        lot_id: "L2".to_string(),
        sku: "S1".to_string(),
        qty_on_hand: 5,
        expiry_date: Some(d(2026, 2, 1)),
        receipt_id: None,
    })
    .unwrap();

    let order: Vec<String> = lots
        .list_fefo("S1")
        .unwrap()
        .into_iter()
        .map(|l| l.lot_id)
        .collect();
    assert_eq!(order, vec!["L2", "L1", "L3"]);
}

#[test]
fn event_rule_precedence_sku_wins() {
    let (_dir, db) = temp_db();
    let rules = EventRulesRepo::new(&db);

    let base = EventUpliftRule {
        delivery_date: d(2026, 2, 7),
        scope_type: ScopeType::All,
        scope_key: String::new(),
        reason: "holiday eve".to_string(),
        strength: UpliftStrength::Low,
        notes: None,
    };
    rules.upsert(&base).unwrap();
    rules
        .upsert(&EventUpliftRule {
            scope_type: ScopeType::Category,
            scope_key: "dairy".to_string(),
            strength: UpliftStrength::Med,
            ..base.clone()
        })
        .unwrap();
    rules
        .upsert(&EventUpliftRule {
            scope_type: ScopeType::Sku,
            scope_key: "S1".to_string(),
            strength: UpliftStrength::High,
            ..base.clone()
        })
        .unwrap();

    let hit = rules
        .resolve(d(2026, 2, 7), "S1", Some("dairy"), None)
        .unwrap()
        .unwrap();
    assert_eq!(hit.strength, UpliftStrength::High);

    let hit = rules
        .resolve(d(2026, 2, 7), "S2", Some("dairy"), None)
        .unwrap()
        .unwrap();
    assert_eq!(hit.strength, UpliftStrength::Med);

    let hit = rules
        .resolve(d(2026, 2, 7), "S3", None, None)
        .unwrap()
        .unwrap();
    assert_eq!(hit.strength, UpliftStrength::Low);
}

#[test]
fn settings_round_trip_with_defaults() {
    let (_dir, db) = temp_db();
    let repo = SettingsRepo::new(&db);

    // Read-through default before any write.
    let settings = repo.get().unwrap();
    assert_eq!(settings, Settings::default());

    let mut updated = settings;
    updated.monte_carlo.n_simulations = 2000;
    repo.put(&updated).unwrap();
    assert_eq!(repo.get().unwrap().monte_carlo.n_simulations, 2000);

    repo.reset().unwrap();
    assert_eq!(repo.get().unwrap(), Settings::default());
}

#[test]
fn kpi_cache_upserts_by_key() {
    let (_dir, db) = temp_db();
    seed_sku(&db, "S1");
    let repo = KpiRepo::new(&db);

    let mut kpi = KpiDaily {
        sku: "S1".to_string(),
        date: d(2026, 1, 5),
        mode: "daily".to_string(),
        metrics: serde_json::json!({"sell_through": 0.7}),
    };
    repo.upsert(&kpi).unwrap();

    kpi.metrics = serde_json::json!({"sell_through": 0.9});
    repo.upsert(&kpi).unwrap();

    let stored = repo.get("S1", d(2026, 1, 5), "daily").unwrap().unwrap();
    assert_eq!(stored.metrics["sell_through"], 0.9);
    assert!(repo.get("S1", d(2026, 1, 5), "weekly").unwrap().is_none());
}

#[test]
fn audit_query_filters_and_batches() {
    let (_dir, db) = temp_db();
    let audit = AuditRepo::new(&db);

    audit
        .append("BATCH_START", "tester", None, "batch", Some("run_x"))
        .unwrap();
    audit
        .append("ORDER_CONFIRMED", "tester", Some("S1"), "q=10", Some("run_x"))
        .unwrap();
    audit
        .append("BATCH_END", "tester", None, "batch", Some("run_x"))
        .unwrap();
    audit
        .append("SKU_UPDATED", "tester", Some("S2"), "", None)
        .unwrap();

    let by_run = audit
        .query(&AuditFilter {
            run_id: Some("run_x".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(by_run.len(), 3);

    let by_sku = audit
        .query(&AuditFilter {
            sku: Some("S2".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(by_sku.len(), 1);

    let summary = audit.batch_summary("run_x").unwrap();
    assert_eq!(summary.event_count, 3);
    assert_eq!(summary.events.first().unwrap().operation, "BATCH_START");
    assert_eq!(summary.events.last().unwrap().operation, "BATCH_END");
}
