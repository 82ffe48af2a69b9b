//! Core Domain Rows
//!
//! Typed records for every aggregate the store persists. The ledger row
//! (`Transaction`) is the single source of truth for stock; everything else
//! is either master data (`Sku`), derived bookkeeping (`OrderLog`,
//! `ReceivingLog`, `Lot`), or calendar/uplift inputs.
//!
//! Enum fields are stored as TEXT in the database; each enum carries
//! `as_str`/`parse` so the repositories never hand raw strings around.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};

// =============================================================================
// LEDGER EVENTS
// =============================================================================

/// Event type of a ledger transaction.
///
/// Replay ordering within a date is governed by `priority()`:
/// SNAPSHOT(0) < RECEIPT(1) = ORDER(1) < SALE(2) = WASTE(2) = ADJUST(2)
/// < UNFULFILLED(3). Ties are broken by transaction_id ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockEvent {
    Snapshot,
    Order,
    Receipt,
    Sale,
    Waste,
    Adjust,
    Unfulfilled,
}

impl StockEvent {
    pub const ALL: [StockEvent; 7] = [
        StockEvent::Snapshot,
        StockEvent::Order,
        StockEvent::Receipt,
        StockEvent::Sale,
        StockEvent::Waste,
        StockEvent::Adjust,
        StockEvent::Unfulfilled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StockEvent::Snapshot => "SNAPSHOT",
            StockEvent::Order => "ORDER",
            StockEvent::Receipt => "RECEIPT",
            StockEvent::Sale => "SALE",
            StockEvent::Waste => "WASTE",
            StockEvent::Adjust => "ADJUST",
            StockEvent::Unfulfilled => "UNFULFILLED",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "SNAPSHOT" => Ok(StockEvent::Snapshot),
            "ORDER" => Ok(StockEvent::Order),
            "RECEIPT" => Ok(StockEvent::Receipt),
            "SALE" => Ok(StockEvent::Sale),
            "WASTE" => Ok(StockEvent::Waste),
            "ADJUST" => Ok(StockEvent::Adjust),
            "UNFULFILLED" => Ok(StockEvent::Unfulfilled),
            other => Err(DomainError::business_rule(format!(
                "invalid event type: {}",
                other
            ))),
        }
    }

    /// Same-date replay priority. Lower applies first.
    pub fn priority(&self) -> u8 {
        match self {
            StockEvent::Snapshot => 0,
            StockEvent::Receipt | StockEvent::Order => 1,
            StockEvent::Sale | StockEvent::Waste | StockEvent::Adjust => 2,
            StockEvent::Unfulfilled => 3,
        }
    }
}

impl std::fmt::Display for StockEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable ledger row. Appended, never updated; the only sanctioned
/// deletion is exception revert through the ledger repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Assigned by the store on append; 0 before insertion.
    pub transaction_id: i64,
    pub date: NaiveDate,
    pub sku: String,
    pub event: StockEvent,
    /// Integer quantity; signed only for ADJUST (absolute set semantics).
    pub qty: i64,
    /// Populated for ORDER and RECEIPT rows only.
    pub receipt_date: Option<NaiveDate>,
    pub note: Option<String>,
}

impl Transaction {
    pub fn new(date: NaiveDate, sku: impl Into<String>, event: StockEvent, qty: i64) -> Self {
        Self {
            transaction_id: 0,
            date,
            sku: sku.into(),
            event,
            qty,
            receipt_date: None,
            note: None,
        }
    }

    pub fn with_receipt_date(mut self, receipt_date: NaiveDate) -> Self {
        self.receipt_date = Some(receipt_date);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

// =============================================================================
// SKU MASTER DATA
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DemandVariability {
    Stable,
    Low,
    High,
    Seasonal,
}

impl DemandVariability {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemandVariability::Stable => "STABLE",
            DemandVariability::Low => "LOW",
            DemandVariability::High => "HIGH",
            DemandVariability::Seasonal => "SEASONAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "STABLE" => Some(DemandVariability::Stable),
            "LOW" => Some(DemandVariability::Low),
            "HIGH" => Some(DemandVariability::High),
            "SEASONAL" => Some(DemandVariability::Seasonal),
            _ => None,
        }
    }
}

/// Shelf-life penalty behavior when forward waste risk crosses the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WastePenaltyMode {
    /// Penalty disabled (stored as the empty string).
    #[default]
    Off,
    /// Scale the order down by the penalty factor.
    Soft,
    /// Zero the order.
    Hard,
}

impl WastePenaltyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WastePenaltyMode::Off => "",
            WastePenaltyMode::Soft => "soft",
            WastePenaltyMode::Hard => "hard",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "soft" => WastePenaltyMode::Soft,
            "hard" => WastePenaltyMode::Hard,
            _ => WastePenaltyMode::Off,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OosPopupPreference {
    #[default]
    Ask,
    AlwaysYes,
    AlwaysNo,
}

impl OosPopupPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            OosPopupPreference::Ask => "ask",
            OosPopupPreference::AlwaysYes => "always_yes",
            OosPopupPreference::AlwaysNo => "always_no",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "always_yes" => OosPopupPreference::AlwaysYes,
            "always_no" => OosPopupPreference::AlwaysNo,
            _ => OosPopupPreference::Ask,
        }
    }
}

/// SKU master row. Identity is the opaque `sku` code.
///
/// Invariant: `min_shelf_life_days <= shelf_life_days` whenever
/// `shelf_life_days > 0` (enforced at upsert).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sku {
    pub sku: String,
    pub description: String,
    pub ean: Option<String>,
    pub category: Option<String>,
    pub department: Option<String>,
    pub in_assortment: bool,

    // Packaging
    pub moq: i64,
    pub pack_size: i64,

    // Stocking
    pub lead_time_days: i64,
    pub review_period_days: i64,
    pub safety_stock: f64,
    pub reorder_point: f64,
    pub max_stock: i64,

    // Perishability
    pub shelf_life_days: i64,
    pub min_shelf_life_days: i64,
    pub waste_penalty_mode: WastePenaltyMode,
    pub waste_penalty_factor: f64,
    pub waste_risk_threshold: f64,

    // Demand
    pub demand_variability: Option<DemandVariability>,

    // Service level override; 0 means unset.
    pub target_csl: f64,

    // Forecast overrides; None means use the global setting.
    pub forecast_method: Option<String>,
    pub mc_distribution: Option<String>,
    pub mc_n_simulations: Option<i64>,
    pub mc_random_seed: Option<i64>,
    pub mc_output_stat: Option<String>,
    pub mc_output_percentile: Option<f64>,
    pub mc_horizon_mode: Option<String>,
    pub mc_horizon_days: Option<i64>,

    pub oos_popup_preference: OosPopupPreference,
}

impl Sku {
    pub fn new(sku: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            description: description.into(),
            ean: None,
            category: None,
            department: None,
            in_assortment: true,
            moq: 0,
            pack_size: 1,
            lead_time_days: 1,
            review_period_days: 1,
            safety_stock: 0.0,
            reorder_point: 0.0,
            max_stock: 0,
            shelf_life_days: 0,
            min_shelf_life_days: 0,
            waste_penalty_mode: WastePenaltyMode::Off,
            waste_penalty_factor: 0.0,
            waste_risk_threshold: 0.0,
            demand_variability: None,
            target_csl: 0.0,
            forecast_method: None,
            mc_distribution: None,
            mc_n_simulations: None,
            mc_random_seed: None,
            mc_output_stat: None,
            mc_output_percentile: None,
            mc_horizon_mode: None,
            mc_horizon_days: None,
            oos_popup_preference: OosPopupPreference::Ask,
        }
    }

    pub fn is_perishable(&self) -> bool {
        self.shelf_life_days > 0
    }

    /// Validate field-level invariants before persisting.
    pub fn validate(&self) -> DomainResult<()> {
        if self.sku.trim().is_empty() {
            return Err(DomainError::business_rule("sku code must not be empty"));
        }
        if self.pack_size < 1 {
            return Err(DomainError::business_rule("pack_size must be >= 1"));
        }
        if self.moq < 0 {
            return Err(DomainError::business_rule("moq must be >= 0"));
        }
        if self.shelf_life_days < 0 {
            return Err(DomainError::business_rule("shelf_life_days must be >= 0"));
        }
        if self.shelf_life_days > 0 && self.min_shelf_life_days > self.shelf_life_days {
            return Err(DomainError::business_rule(
                "min_shelf_life_days must not exceed shelf_life_days",
            ));
        }
        if !(0.0..=1.0).contains(&self.waste_penalty_factor) {
            return Err(DomainError::business_rule(
                "waste_penalty_factor must be in [0, 1]",
            ));
        }
        if !(0.0..=100.0).contains(&self.waste_risk_threshold) {
            return Err(DomainError::business_rule(
                "waste_risk_threshold must be in [0, 100]",
            ));
        }
        if self.target_csl != 0.0 && !(self.target_csl > 0.0 && self.target_csl < 1.0) {
            return Err(DomainError::business_rule("target_csl must be in (0, 1)"));
        }
        Ok(())
    }
}

// =============================================================================
// SALES / ORDERS / RECEIPTS
// =============================================================================

/// Daily sales row; primary key (date, sku).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub date: NaiveDate,
    pub sku: String,
    pub qty_sold: i64,
    pub promo_flag: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Partial,
    Received,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Partial => "PARTIAL",
            OrderStatus::Received => "RECEIVED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(OrderStatus::Pending),
            "PARTIAL" => Some(OrderStatus::Partial),
            "RECEIVED" => Some(OrderStatus::Received),
            _ => None,
        }
    }

    /// Status is derived, never stored independently of the quantities.
    pub fn derive(qty_ordered: i64, qty_received: i64) -> Self {
        if qty_received == 0 {
            OrderStatus::Pending
        } else if qty_received < qty_ordered {
            OrderStatus::Partial
        } else {
            OrderStatus::Received
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLog {
    pub order_id: String,
    pub date: NaiveDate,
    pub sku: String,
    pub qty_ordered: i64,
    pub qty_received: i64,
    pub status: OrderStatus,
    pub receipt_date: Option<NaiveDate>,
    /// Serialized OrderExplain, attached at confirmation time.
    pub explain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivingLog {
    pub document_id: String,
    pub receipt_id: String,
    pub date: NaiveDate,
    pub sku: String,
    pub qty_received: i64,
    pub receipt_date: NaiveDate,
}

/// Junction row linking an order to the receiving documents that closed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub order_id: String,
    pub document_id: String,
}

// =============================================================================
// LOTS
// =============================================================================

/// Physical lot; FEFO order is ascending expiry_date, NULL expiries last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub lot_id: String,
    pub sku: String,
    pub qty_on_hand: i64,
    pub expiry_date: Option<NaiveDate>,
    /// Weak link to the receipt that created the lot (presence not enforced).
    pub receipt_id: Option<String>,
}

// =============================================================================
// PROMO / EVENT UPLIFT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoWindow {
    pub sku: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub store_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeType {
    All,
    Category,
    Department,
    Sku,
}

impl ScopeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeType::All => "ALL",
            ScopeType::Category => "CATEGORY",
            ScopeType::Department => "DEPARTMENT",
            ScopeType::Sku => "SKU",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ALL" => Some(ScopeType::All),
            "CATEGORY" => Some(ScopeType::Category),
            "DEPARTMENT" => Some(ScopeType::Department),
            "SKU" => Some(ScopeType::Sku),
            _ => None,
        }
    }

    /// Resolution precedence: SKU > DEPARTMENT > CATEGORY > ALL.
    pub fn precedence(&self) -> u8 {
        match self {
            ScopeType::Sku => 0,
            ScopeType::Department => 1,
            ScopeType::Category => 2,
            ScopeType::All => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpliftStrength {
    Low,
    Med,
    High,
}

impl UpliftStrength {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpliftStrength::Low => "LOW",
            UpliftStrength::Med => "MED",
            UpliftStrength::High => "HIGH",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LOW" => Some(UpliftStrength::Low),
            "MED" => Some(UpliftStrength::Med),
            "HIGH" => Some(UpliftStrength::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventUpliftRule {
    pub delivery_date: NaiveDate,
    pub scope_type: ScopeType,
    /// Empty for ALL scope; category / department / sku code otherwise.
    pub scope_key: String,
    pub reason: String,
    pub strength: UpliftStrength,
    pub notes: Option<String>,
}

// =============================================================================
// KPI CACHE / AUDIT
// =============================================================================

/// Optional computed-metric cache keyed (sku, date, mode).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiDaily {
    pub sku: String,
    pub date: NaiveDate,
    pub mode: String,
    /// Metric payload, JSON-encoded.
    pub metrics: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub audit_id: i64,
    /// Assigned by the store (DEFAULT now); RFC 3339 text.
    pub timestamp: String,
    pub operation: String,
    pub user: String,
    pub sku: Option<String>,
    pub details: String,
    pub run_id: Option<String>,
}
