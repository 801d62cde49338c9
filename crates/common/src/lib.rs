//! Shared types and utilities used across all ombud crates.

pub mod types;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as unix milliseconds. All persisted timestamps use this.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
