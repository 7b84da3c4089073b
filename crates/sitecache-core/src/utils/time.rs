use chrono::{DateTime, Utc};

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Version stamp for a payload: its own modification time, or now when the
/// payload carries none.
pub fn stamp_or_now(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.timestamp_millis()).unwrap_or_else(now_ms).to_string()
}
