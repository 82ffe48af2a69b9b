//! Run identifiers: `run_YYYYMMDD_HHMMSS_<8-hex>`.

use chrono::Utc;
use uuid::Uuid;

pub fn generate_run_id() -> String {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("run_{}_{}", stamp, &suffix[..8])
}
