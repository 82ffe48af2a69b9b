//! Storage Engine
//!
//! Embedded SQLite store shared by every repository. One database file,
//! WAL journaling so readers proceed while a writer holds the lock,
//! foreign keys enforced, and a busy-retry wrapper over transient lock
//! errors. All writes go through the scoped transaction helper; commit on
//! success, rollback on any error.
//!
//! Startup order is fixed: pragmas, numbered migrations, pragma
//! verification, health checks. A critical health failure refuses to open.

pub mod backup;
pub mod db;
pub mod health;
pub mod migrations;

pub use backup::{create_backup, restore_backup, BackupRetention};
pub use db::{Database, TxBehavior};
pub use health::{run_health_checks, DatabaseStats, HealthReport};

#[cfg(test)]
mod storage_tests;
