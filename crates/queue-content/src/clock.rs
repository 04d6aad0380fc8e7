//! Wall-clock timestamps for node and log mutations.

use web_time::{SystemTime, UNIX_EPOCH};

/// Current time in milliseconds since Unix epoch.
pub fn now_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}
