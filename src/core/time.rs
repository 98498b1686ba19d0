//! Shared timestamp and id helpers.

use ulid::Ulid;

/// Milliseconds since the unix epoch; `0` if the clock is before it.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

pub fn new_id() -> String {
    Ulid::new().to_string()
}
