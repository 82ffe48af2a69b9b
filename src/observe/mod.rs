//! Observability
//!
//! Run identifiers shared by every audit row of a batch workflow, and the
//! debug bundle export (database snapshot, recent audit rows, statistics,
//! environment, settings, manifest). Audit queries live on the audit
//! repository; this module adds the run-scoped conveniences.

pub mod bundle;
pub mod logging;
pub mod run_id;

pub use bundle::{export_debug_bundle, BundleOptions};
pub use logging::init_logging;
pub use run_id::generate_run_id;
