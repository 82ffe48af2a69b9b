//! Domain Error Taxonomy
//!
//! Every repository and workflow surfaces errors from this small closed set.
//! Each variant carries a stable error code, a severity, and an actionable
//! recovery hint so callers can render guidance without string-matching.
//!
//! Low-level `rusqlite` errors are mapped here exactly once (`From` impl);
//! nothing above the storage layer sees SQLite error codes.

use serde::{Deserialize, Serialize};

/// Severity classification carried on every domain error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// The closed domain error set.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Unique constraint breach (order_id, document_id, sku, ...).
    DuplicateKey { entity: String, key: String },

    /// Referenced entity missing, or RESTRICT violation on delete.
    ForeignKey { entity: String, detail: String },

    /// Entity requested by id does not exist.
    NotFound { entity: String, key: String },

    /// CHECK-constraint or policy breach (qty <= 0, received > ordered,
    /// invalid event type, invalid alpha, ...).
    BusinessRule { message: String },

    /// order_date is not one of the configured order days.
    InvalidOrderDay { date: String },

    /// Lot totals disagree with the ledger on-hand beyond tolerance.
    IntegrityDiscrepancy {
        sku: String,
        ledger_qty: i64,
        lots_qty: i64,
    },

    /// Store busy/locked after the retry budget was exhausted.
    Transient { message: String },

    /// Disk full, corrupt database, failed startup invariant.
    Critical { message: String },
}

impl DomainError {
    pub fn business_rule(message: impl Into<String>) -> Self {
        DomainError::BusinessRule {
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, key: impl Into<String>) -> Self {
        DomainError::NotFound {
            entity: entity.into(),
            key: key.into(),
        }
    }

    pub fn critical(message: impl Into<String>) -> Self {
        DomainError::Critical {
            message: message.into(),
        }
    }

    /// Stable error code, safe to match on and to show to users.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::DuplicateKey { .. } => "DB_002",
            DomainError::ForeignKey { .. } => "DB_003",
            DomainError::NotFound { .. } => "WF_001",
            DomainError::BusinessRule { .. } => "WF_002",
            DomainError::InvalidOrderDay { .. } => "CAL_001",
            DomainError::IntegrityDiscrepancy { .. } => "INV_001",
            DomainError::Transient { .. } => "DB_001",
            DomainError::Critical { .. } => "SYS_001",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            DomainError::DuplicateKey { .. } => Severity::Warning,
            DomainError::ForeignKey { .. } => Severity::Error,
            DomainError::NotFound { .. } => Severity::Warning,
            DomainError::BusinessRule { .. } => Severity::Error,
            DomainError::InvalidOrderDay { .. } => Severity::Warning,
            DomainError::IntegrityDiscrepancy { .. } => Severity::Error,
            DomainError::Transient { .. } => Severity::Warning,
            DomainError::Critical { .. } => Severity::Critical,
        }
    }

    /// Actionable recovery guidance, always attached to user-visible output.
    pub fn recovery(&self) -> &'static str {
        match self {
            DomainError::DuplicateKey { .. } => {
                "the record already exists; use the existing row or a new key"
            }
            DomainError::ForeignKey { .. } => {
                "verify the referenced entity exists (or has no dependents)"
            }
            DomainError::NotFound { .. } => {
                "verify prerequisites: the requested entity is missing"
            }
            DomainError::BusinessRule { .. } => {
                "the request violates a business rule; correct the input"
            }
            DomainError::InvalidOrderDay { .. } => "pick a configured order day",
            DomainError::IntegrityDiscrepancy { .. } => {
                "reconcile lot stock against the ledger"
            }
            DomainError::Transient { .. } => "the store is busy; wait and retry",
            DomainError::Critical { .. } => {
                "check disk space and database integrity; restore from backup if corrupt"
            }
        }
    }

    /// True when a duplicate-key outcome is an expected idempotency signal
    /// (receipt closure, exception recording) rather than a failure.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, DomainError::DuplicateKey { .. })
    }
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomainError::DuplicateKey { entity, key } => {
                write!(f, "[{}] duplicate {}: {}", self.code(), entity, key)
            }
            DomainError::ForeignKey { entity, detail } => {
                write!(f, "[{}] foreign key on {}: {}", self.code(), entity, detail)
            }
            DomainError::NotFound { entity, key } => {
                write!(f, "[{}] {} not found: {}", self.code(), entity, key)
            }
            DomainError::BusinessRule { message } => {
                write!(f, "[{}] business rule: {}", self.code(), message)
            }
            DomainError::InvalidOrderDay { date } => {
                write!(f, "[{}] {} is not an order day", self.code(), date)
            }
            DomainError::IntegrityDiscrepancy {
                sku,
                ledger_qty,
                lots_qty,
            } => {
                write!(
                    f,
                    "[{}] lot/ledger mismatch for {}: ledger={} lots={}",
                    self.code(),
                    sku,
                    ledger_qty,
                    lots_qty
                )
            }
            DomainError::Transient { message } => {
                write!(f, "[{}] store busy: {}", self.code(), message)
            }
            DomainError::Critical { message } => {
                write!(f, "[{}] critical: {}", self.code(), message)
            }
        }
    }
}

impl std::error::Error for DomainError {}

pub type DomainResult<T> = Result<T, DomainError>;

/// Map a low-level rusqlite error into the domain taxonomy.
///
/// Constraint breaches are classified by extended result code; busy/locked
/// errors map to `Transient` (the retry wrapper decides when to surface
/// them); corruption and disk-full map to `Critical`. Everything else is a
/// business-rule breach with the original message preserved.
impl From<rusqlite::Error> for DomainError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match &err {
            rusqlite::Error::SqliteFailure(e, msg) => {
                let detail = msg.clone().unwrap_or_else(|| e.to_string());
                match e.code {
                    ErrorCode::ConstraintViolation => {
                        // Extended codes distinguish UNIQUE / FK / CHECK.
                        match e.extended_code {
                            rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                            | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                                DomainError::DuplicateKey {
                                    entity: "row".to_string(),
                                    key: detail,
                                }
                            }
                            rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
                            | rusqlite::ffi::SQLITE_CONSTRAINT_TRIGGER => {
                                DomainError::ForeignKey {
                                    entity: "row".to_string(),
                                    detail,
                                }
                            }
                            _ => DomainError::BusinessRule { message: detail },
                        }
                    }
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                        DomainError::Transient { message: detail }
                    }
                    ErrorCode::DatabaseCorrupt
                    | ErrorCode::DiskFull
                    | ErrorCode::NotADatabase => DomainError::Critical { message: detail },
                    _ => DomainError::BusinessRule { message: detail },
                }
            }
            rusqlite::Error::QueryReturnedNoRows => DomainError::NotFound {
                entity: "row".to_string(),
                key: String::new(),
            },
            other => DomainError::BusinessRule {
                message: other.to_string(),
            },
        }
    }
}
