//! Data-quality tiers for a rolling window.
//!
//! A tier is a pure function of how many distinct reading timestamps the
//! window holds and how much time they span. Tiers are checked from best
//! to worst and the first match wins.

use chrono::Duration;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Excellent,
    Good,
    Fair,
    Limited,
    /// No readings at all; callers fall back to the most recent reading.
    Estimated,
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityTier::Excellent => write!(f, "excellent"),
            QualityTier::Good => write!(f, "good"),
            QualityTier::Fair => write!(f, "fair"),
            QualityTier::Limited => write!(f, "limited"),
            QualityTier::Estimated => write!(f, "estimated"),
        }
    }
}

/// (minimum readings, minimum span in hours, tier)
const TIERS: [(usize, i64, QualityTier); 3] = [
    (15, 3, QualityTier::Excellent),
    (10, 2, QualityTier::Good),
    (5, 1, QualityTier::Fair),
];

pub fn classify_quality(reading_count: usize, span: Duration) -> QualityTier {
    if reading_count == 0 {
        return QualityTier::Estimated;
    }
    TIERS
        .iter()
        .find(|(min_count, min_hours, _)| {
            reading_count >= *min_count && span >= Duration::hours(*min_hours)
        })
        .map(|(_, _, tier)| *tier)
        // Anything with data that misses every span/count threshold.
        .unwrap_or(QualityTier::Limited)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
