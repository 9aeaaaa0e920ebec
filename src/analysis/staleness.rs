/// Reading staleness detection.
///
/// When a window holds no readings the engine falls back to the single most
/// recent reading for a point. That reading is only trustworthy if it is not
/// too old; a point whose feed has been down for days should report
/// "insufficient data" rather than a days-old index.
///
/// # Clock injection
/// All functions accept a `now: DateTime<Utc>` parameter rather than calling
/// `Utc::now()` internally, so staleness is deterministic in tests.

use chrono::{DateTime, Duration, Utc};

use crate::model::Reading;

/// Age of `reading` relative to `now`. Readings stamped in the future have
/// zero age.
pub fn age_at(reading: &Reading, now: DateTime<Utc>) -> Duration {
    (now - reading.timestamp).max(Duration::zero())
}

/// Returns `true` if the reading is older than `max_age` relative to `now`.
///
/// Staleness is strictly greater than the threshold:
///   age > max_age  →  stale
///   age == max_age →  not stale
pub fn is_stale_at(reading: &Reading, max_age: Duration, now: DateTime<Utc>) -> bool {
    age_at(reading, now) > max_age
}

/// Convenience wrapper that uses the real current time.
/// Use `is_stale_at` in tests to keep them deterministic.
pub fn is_stale(reading: &Reading, max_age: Duration) -> bool {
    is_stale_at(reading, max_age, Utc::now())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
