//! Timestamp utilities
//!
//! Watch records store `watched_at` as epoch milliseconds so cooldown
//! arithmetic stays in integers; these helpers convert at the edges.

use chrono::Utc;

/// Milliseconds in one minute
pub const MILLIS_PER_MINUTE: i64 = 60_000;

/// Get current time as epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Whole minutes remaining until `deadline_ms`, rounded up
///
/// Zero once the deadline has passed.
pub fn minutes_until(deadline_ms: i64, now_ms: i64) -> i64 {
    let remaining = (deadline_ms - now_ms).max(0);
    (remaining + MILLIS_PER_MINUTE - 1) / MILLIS_PER_MINUTE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_millis_is_recent() {
        let millis = now_millis();
        // After 2020-01-01, before 2100-01-01
        assert!(millis > 1_577_836_800_000);
        assert!(millis < 4_102_444_800_000);
    }

    #[test]
    fn test_minutes_until_rounds_up() {
        let t = 1_000_000;
        assert_eq!(minutes_until(t + 60_000, t), 1);
        assert_eq!(minutes_until(t + 60_001, t), 2);
        assert_eq!(minutes_until(t + 1, t), 1);
    }

    #[test]
    fn test_minutes_until_past_deadline_is_zero() {
        assert_eq!(minutes_until(1_000, 1_000), 0);
        assert_eq!(minutes_until(1_000, 5_000), 0);
    }
}
