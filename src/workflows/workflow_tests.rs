use chrono::{Duration, NaiveDate};
use tempfile::TempDir;

use crate::config::{PolicyMode, Settings};
use crate::models::*;
use crate::repos::*;
use crate::stock::StockService;
use crate::storage::Database;
use crate::workflows::{ReceiptClose, ReceiptItem, Workflows};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn temp_db() -> (TempDir, Database) {
    let dir = TempDir::new().unwrap();
    let db = Database::open(dir.path().join("engine.db")).unwrap();
    (dir, db)
}

/// Seed a plain SKU with steady sales of 10/day for the month before
/// `until` and a SNAPSHOT anchoring on-hand.
fn seed_steady_sku(db: &Database, code: &str, on_hand: i64, until: NaiveDate) {
    let mut sku = Sku::new(code, "steady mover");
    sku.lead_time_days = 1;
    sku.safety_stock = 20.0;
    sku.max_stock = 999;
    SkuRepo::new(db).upsert(&sku).unwrap();

    let sales = SalesRepo::new(db);
    for i in 1..=30 {
        sales
            .upsert(&SalesRecord {
                date: until - Duration::days(i),
                sku: code.to_string(),
                qty_sold: 10,
                promo_flag: false,
            })
            .unwrap();
    }

    LedgerRepo::new(db)
        .append(&Transaction::new(
            until - Duration::days(1),
            code,
            StockEvent::Snapshot,
            on_hand,
        ))
        .unwrap();
}

fn legacy_settings(db: &Database) {
    let repo = SettingsRepo::new(db);
    let mut settings = Settings::default();
    settings.reorder_engine.policy_mode = PolicyMode::Legacy;
    repo.put(&settings).unwrap();
}

#[test]
fn friday_dual_lane_covered_stock_orders_nothing() {
    let (_dir, db) = temp_db();
    legacy_settings(&db);
    let friday = d(2026, 2, 6);
    seed_steady_sku(&db, "S1", 50, friday);

    let wf = Workflows::new(&db, "tester");
    let settings = SettingsRepo::new(&db).get().unwrap();
    let holidays = HolidaysRepo::new(&db).get().unwrap();
    let sku = SkuRepo::new(&db).require("S1").unwrap();

    let proposals = wf
        .propose_for_sku(&sku, friday, &settings, &holidays, &[])
        .unwrap();
    assert_eq!(proposals.len(), 2);

    let sat = &proposals[0];
    assert_eq!(sat.lane, crate::calendar::Lane::Saturday);
    assert_eq!(sat.receipt_date, d(2026, 2, 7));
    assert_eq!(sat.explain.p_days, 3);
    assert_eq!(sat.explain.s, 50.0, "S = 10*3 + 20");
    assert_eq!(sat.qty, 0, "IP 50 covers S 50");

    let mon = &proposals[1];
    assert_eq!(mon.lane, crate::calendar::Lane::Monday);
    assert_eq!(mon.explain.p_days, 1);
    assert_eq!(mon.explain.s, 30.0, "S = 10*1 + 20");
    assert_eq!(mon.qty, 0);
}

#[test]
fn friday_dual_lane_saturday_feeds_monday_pipeline() {
    let (_dir, db) = temp_db();
    legacy_settings(&db);
    let friday = d(2026, 2, 6);
    seed_steady_sku(&db, "S1", 20, friday);

    let wf = Workflows::new(&db, "tester");
    let settings = SettingsRepo::new(&db).get().unwrap();
    let holidays = HolidaysRepo::new(&db).get().unwrap();
    let sku = SkuRepo::new(&db).require("S1").unwrap();

    let proposals = wf
        .propose_for_sku(&sku, friday, &settings, &holidays, &[])
        .unwrap();

    let sat = &proposals[0];
    assert_eq!(sat.qty, 30, "Q_sat = max(0, 50 - 20)");

    // Monday sees the Saturday 30 in its pipeline: IP = 20 + 30 = 50.
    let mon = &proposals[1];
    assert_eq!(mon.explain.inventory_position, 50);
    assert_eq!(mon.qty, 0, "Q_mon = max(0, 30 - 50)");
}

#[test]
fn proposals_are_deterministic() {
    let (_dir, db) = temp_db();
    let friday = d(2026, 2, 6);
    seed_steady_sku(&db, "S1", 20, friday);

    let wf = Workflows::new(&db, "tester");
    let settings = SettingsRepo::new(&db).get().unwrap();
    let holidays = HolidaysRepo::new(&db).get().unwrap();
    let sku = SkuRepo::new(&db).require("S1").unwrap();

    let a = wf
        .propose_for_sku(&sku, friday, &settings, &holidays, &[])
        .unwrap();
    let b = wf
        .propose_for_sku(&sku, friday, &settings, &holidays, &[])
        .unwrap();
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap(),
        "same inputs and seed must reproduce byte-identical explains"
    );
}

#[test]
fn confirmation_assigns_sequential_ids_and_writes_ledger() {
    let (_dir, db) = temp_db();
    legacy_settings(&db);
    let friday = d(2026, 2, 6);
    seed_steady_sku(&db, "S1", 0, friday);

    let wf = Workflows::new(&db, "tester");
    let settings = SettingsRepo::new(&db).get().unwrap();
    let holidays = HolidaysRepo::new(&db).get().unwrap();
    let sku = SkuRepo::new(&db).require("S1").unwrap();

    let proposals = wf
        .propose_for_sku(&sku, friday, &settings, &holidays, &[])
        .unwrap();
    let confirmations = wf.confirm_orders(&proposals).unwrap();
    assert!(!confirmations.is_empty());
    assert_eq!(confirmations[0].order_id, "ORD_20260206_001");
    if confirmations.len() > 1 {
        assert_eq!(confirmations[1].order_id, "ORD_20260206_002");
    }

    // ORDER events landed with receipt dates, and the logs carry explain.
    let orders = OrdersRepo::new(&db);
    let log = orders.get("ORD_20260206_001").unwrap().unwrap();
    assert_eq!(log.status, OrderStatus::Pending);
    assert!(log.explain.is_some());

    let stock = StockService::new(&db);
    let snapshot = stock.stock_asof("S1", d(2026, 2, 7)).unwrap();
    assert_eq!(
        snapshot.on_order,
        confirmations.iter().map(|c| c.qty).sum::<i64>()
    );
}

#[test]
fn receipt_closure_fifo_then_explicit_allocation() {
    let (_dir, db) = temp_db();
    SkuRepo::new(&db).upsert(&Sku::new("S1", "test")).unwrap();
    let orders = OrdersRepo::new(&db);
    orders
        .create_log(&OrderLog {
            order_id: "ORD_A".to_string(),
            date: d(2026, 1, 5),
            sku: "S1".to_string(),
            qty_ordered: 100,
            qty_received: 0,
            status: OrderStatus::Pending,
            receipt_date: Some(d(2026, 1, 7)),
            explain: None,
        })
        .unwrap();
    orders
        .create_log(&OrderLog {
            order_id: "ORD_B".to_string(),
            date: d(2026, 1, 6),
            sku: "S1".to_string(),
            qty_ordered: 50,
            qty_received: 0,
            status: OrderStatus::Pending,
            receipt_date: Some(d(2026, 1, 8)),
            explain: None,
        })
        .unwrap();

    let wf = Workflows::new(&db, "tester");

    // DOC1: 70 units, FIFO lands on the older ORD_A.
    let result = wf
        .close_receipt(&ReceiptClose {
            document_id: "DOC1".to_string(),
            receipt_date: d(2026, 1, 7),
            items: vec![ReceiptItem {
                sku: "S1".to_string(),
                qty_received: 70,
                order_ids: Vec::new(),
            }],
            mark_shortfall_unfulfilled: false,
        })
        .unwrap();
    assert_eq!(result.status, "closed");
    assert_eq!(result.allocations, vec![("ORD_A".to_string(), 70)]);
    assert_eq!(
        orders.get("ORD_A").unwrap().unwrap().status,
        OrderStatus::Partial
    );

    // Replaying DOC1 is a no-op.
    let replay = wf
        .close_receipt(&ReceiptClose {
            document_id: "DOC1".to_string(),
            receipt_date: d(2026, 1, 7),
            items: vec![ReceiptItem {
                sku: "S1".to_string(),
                qty_received: 70,
                order_ids: Vec::new(),
            }],
            mark_shortfall_unfulfilled: false,
        })
        .unwrap();
    assert_eq!(replay.status, "already_processed");
    assert_eq!(orders.get("ORD_A").unwrap().unwrap().qty_received, 70);
    assert_eq!(
        ReceivingRepo::new(&db)
            .lines_for_document("DOC1")
            .unwrap()
            .len(),
        1
    );

    // DOC2: 50 units explicitly against ORD_A; allocation clamps at the
    // ordered quantity and ORD_B stays untouched.
    let result = wf
        .close_receipt(&ReceiptClose {
            document_id: "DOC2".to_string(),
            receipt_date: d(2026, 1, 8),
            items: vec![ReceiptItem {
                sku: "S1".to_string(),
                qty_received: 50,
                order_ids: vec!["ORD_A".to_string()],
            }],
            mark_shortfall_unfulfilled: false,
        })
        .unwrap();
    assert_eq!(result.allocations, vec![("ORD_A".to_string(), 30)]);
    let ord_a = orders.get("ORD_A").unwrap().unwrap();
    assert_eq!(ord_a.qty_received, 100);
    assert_eq!(ord_a.status, OrderStatus::Received);
    let ord_b = orders.get("ORD_B").unwrap().unwrap();
    assert_eq!(ord_b.qty_received, 0);

    // Junction rows tie ORD_A to both documents.
    let docs = orders.documents_for_order("ORD_A").unwrap();
    assert_eq!(docs, vec!["DOC1".to_string(), "DOC2".to_string()]);

    // The full 120 received units are on hand.
    let stock = StockService::new(&db);
    assert_eq!(stock.stock_asof("S1", d(2026, 1, 9)).unwrap().on_hand, 120);
}

#[test]
fn receipt_closure_creates_lots_for_perishables() {
    let (_dir, db) = temp_db();
    let mut sku = Sku::new("YOG", "yogurt");
    sku.shelf_life_days = 21;
    SkuRepo::new(&db).upsert(&sku).unwrap();

    let wf = Workflows::new(&db, "tester");
    wf.close_receipt(&ReceiptClose {
        document_id: "DOC9".to_string(),
        receipt_date: d(2026, 1, 7),
        items: vec![ReceiptItem {
            sku: "YOG".to_string(),
            qty_received: 40,
            order_ids: Vec::new(),
        }],
        mark_shortfall_unfulfilled: false,
    })
    .unwrap();

    let lots = LotsRepo::new(&db).list_fefo("YOG").unwrap();
    assert_eq!(lots.len(), 1);
    assert_eq!(lots[0].qty_on_hand, 40);
    assert_eq!(lots[0].expiry_date, Some(d(2026, 1, 28)));
}

#[test]
fn eod_reconciliation_derives_sales_and_adjust() {
    let (_dir, db) = temp_db();
    SkuRepo::new(&db).upsert(&Sku::new("S1", "test")).unwrap();
    LedgerRepo::new(&db)
        .append(&Transaction::new(
            d(2026, 1, 5),
            "S1",
            StockEvent::Snapshot,
            100,
        ))
        .unwrap();

    let wf = Workflows::new(&db, "tester");
    let stock = StockService::new(&db);

    // Declared 90: ten units sold, no residual adjust.
    let result = wf
        .reconcile_eod(d(2026, 1, 6), &[("S1".to_string(), 90)])
        .unwrap();
    assert_eq!(result.lines[0].theoretical, 100);
    assert_eq!(result.lines[0].qty_sold, 10);
    assert!(!result.lines[0].adjusted);
    assert_eq!(stock.stock_asof("S1", d(2026, 1, 7)).unwrap().on_hand, 90);
    assert_eq!(
        SalesRepo::new(&db)
            .get(d(2026, 1, 6), "S1")
            .unwrap()
            .unwrap()
            .qty_sold,
        10
    );

    // Re-running with the same counts is stable.
    let rerun = wf
        .reconcile_eod(d(2026, 1, 6), &[("S1".to_string(), 90)])
        .unwrap();
    assert_eq!(rerun.lines[0].qty_sold, 10);
    assert_eq!(stock.stock_asof("S1", d(2026, 1, 7)).unwrap().on_hand, 90);

    // Declared above theoretical: sales clamp at zero, ADJUST sets the
    // absolute quantity.
    let result = wf
        .reconcile_eod(d(2026, 1, 6), &[("S1".to_string(), 120)])
        .unwrap();
    assert_eq!(result.lines[0].qty_sold, 0);
    assert!(result.lines[0].adjusted);
    assert_eq!(stock.stock_asof("S1", d(2026, 1, 7)).unwrap().on_hand, 120);
}

#[test]
fn exceptions_are_idempotent_and_revertible() {
    let (_dir, db) = temp_db();
    SkuRepo::new(&db).upsert(&Sku::new("S1", "test")).unwrap();
    LedgerRepo::new(&db)
        .append(&Transaction::new(
            d(2026, 1, 5),
            "S1",
            StockEvent::Snapshot,
            100,
        ))
        .unwrap();

    let wf = Workflows::new(&db, "tester");
    let stock = StockService::new(&db);

    let first = wf
        .record_exception(StockEvent::Waste, "S1", 5, d(2026, 1, 6), Some("broken"))
        .unwrap();
    assert!(!first.already_recorded);

    let second = wf
        .record_exception(StockEvent::Waste, "S1", 5, d(2026, 1, 6), None)
        .unwrap();
    assert!(second.already_recorded);
    assert_eq!(second.transaction_id, first.transaction_id);
    assert_eq!(stock.stock_asof("S1", d(2026, 1, 7)).unwrap().on_hand, 95);

    let revert = wf
        .revert_exception_day(d(2026, 1, 6), "S1", StockEvent::Waste)
        .unwrap();
    assert_eq!(revert.deleted_rows, 1);
    assert_eq!(stock.stock_asof("S1", d(2026, 1, 7)).unwrap().on_hand, 100);

    // SALE is not an exception event.
    assert!(wf
        .record_exception(StockEvent::Sale, "S1", 5, d(2026, 1, 6), None)
        .is_err());
}

#[test]
fn adjust_exception_is_absolute() {
    let (_dir, db) = temp_db();
    SkuRepo::new(&db).upsert(&Sku::new("S1", "test")).unwrap();
    LedgerRepo::new(&db)
        .append(&Transaction::new(
            d(2026, 1, 5),
            "S1",
            StockEvent::Snapshot,
            100,
        ))
        .unwrap();

    let wf = Workflows::new(&db, "tester");
    wf.record_exception(StockEvent::Adjust, "S1", 50, d(2026, 1, 6), None)
        .unwrap();

    let stock = StockService::new(&db);
    assert_eq!(
        stock.stock_asof("S1", d(2026, 1, 7)).unwrap().on_hand,
        50,
        "ADJUST sets on-hand, it does not add"
    );
}

#[test]
fn batch_proposal_wraps_audit_in_run_id() {
    let (_dir, db) = temp_db();
    legacy_settings(&db);
    let friday = d(2026, 2, 6);
    seed_steady_sku(&db, "S1", 20, friday);
    seed_steady_sku(&db, "S2", 50, friday);

    let wf = Workflows::new(&db, "tester");
    let batch = wf.propose_orders(friday).unwrap();
    assert_eq!(batch.proposals.len(), 4, "two SKUs, two lanes each");
    assert!(batch.skipped.is_empty());

    let summary = AuditRepo::new(&db).batch_summary(&batch.run_id).unwrap();
    assert_eq!(summary.events.first().unwrap().operation, "BATCH_START");
    assert_eq!(summary.events.last().unwrap().operation, "BATCH_END");
}
