//! Time helpers.
//!
//! All timeouts in CEPS are expiry fields on credentials and validation
//! tokens, expressed as Unix epoch milliseconds. Components take `now`
//! as a parameter so tests can pin the clock; this helper is for the
//! boundary that owns the real clock.

/// Current time in Unix epoch milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}
