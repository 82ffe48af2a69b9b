//! Configuration
//!
//! Two process-wide singletons persisted as one-row JSON blobs: the
//! settings option tree and the holiday rule set. Both are read through the
//! repositories with typed defaults; unknown keys survive a read/write
//! round-trip untouched.

pub mod holidays;
pub mod settings;

pub use holidays::{HolidayEffect, HolidayKind, HolidayRule, HolidayScope, HolidaySet};
pub use settings::{PolicyMode, Settings};
