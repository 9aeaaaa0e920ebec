//! Rolling-window fusion of readings across feeds.
//!
//! Each monitoring point owns an append-only log of normalized readings
//! keyed by (timestamp, source). `get_window` is a pure query over that
//! log: it filters to `[now - window, now]` and merges per pollutant.
//!
//! # Source priority
//! For each pollutant, if any primary-feed reading supplies it, the mean is
//! computed from primary readings only. Secondary feeds are consulted only
//! when the primary has nothing for that pollutant in the window, and the
//! result is then marked `supplemented`. Primary and secondary values are
//! never blended for the same pollutant.
//!
//! # Locking
//! The point map is behind an `RwLock`, and each point's log behind its own
//! `RwLock`. Appends take the write lock of a single point and queries take
//! read locks, so queries never serialize on each other or on appends to
//! other points. A query for a point does wait while an append to that same
//! point holds its write lock; the critical section is one map insert.
//! The aggregator never deletes; retention is an external concern.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::analysis::quality::{QualityTier, classify_quality};
use crate::config::EngineConfig;
use crate::error::ConfigError;
use crate::model::{Concentrations, Pollutant, PollutantMap, Reading, SourceRole};

// ---------------------------------------------------------------------------
// Window output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollutantAggregate {
    pub mean: f64,
    /// Readings that went into `mean`, per source tag.
    pub source_breakdown: BTreeMap<String, usize>,
    /// True when the mean comes from secondary feeds because the primary had none.
    pub supplemented: bool,
}

impl PollutantAggregate {
    pub fn count(&self) -> usize {
        self.source_breakdown.values().sum()
    }
}

/// Derived view of one point's readings over the trailing window. Never
/// persisted as authoritative state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateWindow {
    pub point_id: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// A pollutant is present only if at least one reading supplied it.
    pub pollutants: PollutantMap<PollutantAggregate>,
    /// Distinct reading timestamps across all sources.
    pub total_reading_count: usize,
    /// Time between the first and last reading timestamps, in minutes.
    pub span_minutes: i64,
    pub quality: QualityTier,
}

impl AggregateWindow {
    pub fn means(&self) -> Concentrations {
        self.pollutants.map(|_, agg| agg.mean)
    }

    pub fn is_empty(&self) -> bool {
        self.total_reading_count == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Inserted,
    /// A reading with the same (point, timestamp, source) existed and was replaced.
    Replaced,
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct PointLog {
    readings: BTreeMap<(DateTime<Utc>, String), Reading>,
}

#[derive(Debug)]
pub struct WindowAggregator {
    window: Duration,
    roles: BTreeMap<String, SourceRole>,
    logs: RwLock<HashMap<String, Arc<RwLock<PointLog>>>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl WindowAggregator {
    pub fn new(window: Duration, roles: BTreeMap<String, SourceRole>) -> Self {
        Self {
            window,
            roles,
            logs: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.window_duration(), config.source_roles())
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn role_of(&self, source: &str) -> Result<SourceRole, ConfigError> {
        self.roles
            .get(source)
            .copied()
            .ok_or_else(|| ConfigError::UnknownSource(source.to_string()))
    }

    /// Appends a reading. A second append for the same (point, timestamp,
    /// source) replaces the first; feeds resend corrected values.
    pub fn append(&self, reading: Reading) -> Result<AppendOutcome, ConfigError> {
        self.role_of(&reading.source)?;

        let log = self.log_for_append(&reading.point_id);
        let key = (reading.timestamp, reading.source.clone());
        let point_id = reading.point_id.clone();
        let previous = write(&*log).readings.insert(key, reading);

        Ok(match previous {
            Some(_) => {
                tracing::debug!(point_id = %point_id, "replaced reading with corrected values");
                AppendOutcome::Replaced
            }
            None => AppendOutcome::Inserted,
        })
    }

    fn log_for_append(&self, point_id: &str) -> Arc<RwLock<PointLog>> {
        if let Some(log) = read(&self.logs).get(point_id) {
            return Arc::clone(log);
        }
        let mut logs = write(&self.logs);
        Arc::clone(logs.entry(point_id.to_string()).or_default())
    }

    fn log(&self, point_id: &str) -> Option<Arc<RwLock<PointLog>>> {
        read(&self.logs).get(point_id).map(Arc::clone)
    }

    /// Merged view of `point_id` over `[now - window, now]`.
    pub fn get_window(&self, point_id: &str, now: DateTime<Utc>) -> AggregateWindow {
        let start = now
            .checked_sub_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let readings: Vec<Reading> = match self.log(point_id) {
            Some(log) => {
                let guard = read(&*log);
                guard
                    .readings
                    .range((start, String::new())..)
                    .take_while(|((ts, _), _)| *ts <= now)
                    .map(|(_, r)| r.clone())
                    .collect()
            }
            None => Vec::new(),
        };

        self.merge(point_id, start, now, &readings)
    }

    fn merge(
        &self,
        point_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        readings: &[Reading],
    ) -> AggregateWindow {
        let mut pollutants = PollutantMap::new();
        for pollutant in Pollutant::ALL {
            if let Some(aggregate) = self.merge_pollutant(pollutant, readings) {
                pollutants.set(pollutant, aggregate);
            }
        }

        let timestamps: BTreeSet<DateTime<Utc>> = readings.iter().map(|r| r.timestamp).collect();
        let span = match (timestamps.first(), timestamps.last()) {
            (Some(first), Some(last)) => *last - *first,
            _ => Duration::zero(),
        };

        AggregateWindow {
            point_id: point_id.to_string(),
            window_start,
            window_end,
            pollutants,
            total_reading_count: timestamps.len(),
            span_minutes: span.num_minutes(),
            quality: classify_quality(timestamps.len(), span),
        }
    }

    fn merge_pollutant(&self, pollutant: Pollutant, readings: &[Reading]) -> Option<PollutantAggregate> {
        let mut primary = Vec::new();
        let mut secondary = Vec::new();
        for reading in readings {
            let Some(&value) = reading.values.get(pollutant) else {
                continue;
            };
            // Readings only enter the log through `append`, which rejects unknown tags.
            match self.roles.get(&reading.source) {
                Some(SourceRole::Primary) => primary.push((reading.source.as_str(), value)),
                Some(SourceRole::Secondary) => secondary.push((reading.source.as_str(), value)),
                None => {}
            }
        }

        if !primary.is_empty() {
            Some(aggregate(&primary, false))
        } else if !secondary.is_empty() {
            Some(aggregate(&secondary, true))
        } else {
            None
        }
    }

    /// Most recent reading for a point at or before `now`, regardless of window.
    pub fn latest_reading(&self, point_id: &str, now: DateTime<Utc>) -> Option<Reading> {
        let log = self.log(point_id)?;
        let guard = read(&*log);
        guard
            .readings
            .iter()
            .rev()
            .find(|((ts, _), _)| *ts <= now)
            .map(|(_, r)| r.clone())
    }

    pub fn point_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = read(&self.logs).keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn reading_count(&self, point_id: &str) -> usize {
        match self.log(point_id) {
            Some(log) => {
                let guard = read(&*log);
                guard.readings.len()
            }
            None => 0,
        }
    }
}

fn aggregate(values: &[(&str, f64)], supplemented: bool) -> PollutantAggregate {
    let mut source_breakdown = BTreeMap::new();
    for (source, _) in values {
        *source_breakdown.entry(source.to_string()).or_insert(0) += 1;
    }
    let mean = values.iter().map(|(_, v)| v).sum::<f64>() / values.len() as f64;
    PollutantAggregate {
        mean,
        source_breakdown,
        supplemented,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap()
    }

    fn aggregator() -> WindowAggregator {
        let roles = BTreeMap::from([
            ("waqi".to_string(), SourceRole::Primary),
            ("openaq".to_string(), SourceRole::Secondary),
            ("open_meteo".to_string(), SourceRole::Secondary),
        ]);
        WindowAggregator::new(Duration::hours(3), roles)
    }

    fn reading(source: &str, minutes_ago: i64, values: Concentrations) -> Reading {
        Reading {
            point_id: "P1".to_string(),
            timestamp: fixed_now() - Duration::minutes(minutes_ago),
            source: source.to_string(),
            values,
        }
    }

    fn pm25(value: f64) -> Concentrations {
        Concentrations::new().with(Pollutant::Pm25, value)
    }

    // --- Source priority ----------------------------------------------------

    #[test]
    fn test_primary_readings_override_secondary_for_same_pollutant() {
        let agg = aggregator();
        agg.append(reading("waqi", 10, pm25(10.0))).unwrap();
        agg.append(reading("waqi", 70, pm25(20.0))).unwrap();
        for (i, value) in [100.0, 110.0, 120.0, 130.0, 140.0].into_iter().enumerate() {
            agg.append(reading("openaq", 5 + i as i64 * 20, pm25(value))).unwrap();
        }

        let window = agg.get_window("P1", fixed_now());
        let pm = window.pollutants.pm25.as_ref().unwrap();
        assert_eq!(pm.mean, 15.0);
        assert!(!pm.supplemented);
        assert_eq!(pm.source_breakdown, BTreeMap::from([("waqi".to_string(), 2)]));
    }

    #[test]
    fn test_secondary_fills_gap_when_primary_lacks_pollutant() {
        let agg = aggregator();
        agg.append(reading("waqi", 10, pm25(10.0))).unwrap();
        agg.append(reading("openaq", 20, Concentrations::new().with(Pollutant::No2, 30.0)))
            .unwrap();
        agg.append(reading("open_meteo", 30, Concentrations::new().with(Pollutant::No2, 40.0)))
            .unwrap();

        let window = agg.get_window("P1", fixed_now());
        let no2 = window.pollutants.no2.as_ref().unwrap();
        assert_eq!(no2.mean, 35.0);
        assert!(no2.supplemented);
        assert_eq!(no2.count(), 2);
        assert_eq!(no2.source_breakdown.get("openaq"), Some(&1));
        assert_eq!(no2.source_breakdown.get("open_meteo"), Some(&1));
        assert!(!window.pollutants.pm25.as_ref().unwrap().supplemented);
    }

    #[test]
    fn test_pollutant_without_readings_is_absent_not_zero() {
        let agg = aggregator();
        agg.append(reading("waqi", 10, pm25(10.0))).unwrap();
        let window = agg.get_window("P1", fixed_now());
        assert!(window.pollutants.o3.is_none());
        assert_eq!(window.means().get(Pollutant::O3), None);
    }

    // --- Window bounds ------------------------------------------------------

    #[test]
    fn test_window_includes_both_ends_and_excludes_older_and_future() {
        let agg = aggregator();
        agg.append(reading("waqi", 180, pm25(1.0))).unwrap(); // exactly now - 3h
        agg.append(reading("waqi", 0, pm25(3.0))).unwrap(); // exactly now
        agg.append(reading("waqi", 181, pm25(1000.0))).unwrap(); // too old
        agg.append(reading("waqi", -5, pm25(1000.0))).unwrap(); // future

        let window = agg.get_window("P1", fixed_now());
        assert_eq!(window.total_reading_count, 2);
        assert_eq!(window.pollutants.pm25.as_ref().unwrap().mean, 2.0);
        assert_eq!(window.span_minutes, 180);
        // The log still holds everything; the window only filters.
        assert_eq!(agg.reading_count("P1"), 4);
    }

    #[test]
    fn test_unknown_point_yields_empty_estimated_window() {
        let window = aggregator().get_window("nowhere", fixed_now());
        assert!(window.is_empty());
        assert_eq!(window.quality, QualityTier::Estimated);
        assert!(window.pollutants.is_empty());
    }

    // --- Quality ------------------------------------------------------------

    fn append_spread(agg: &WindowAggregator, count_before_end: i64) {
        // Readings every 12 minutes from now-3h, plus one exactly at now.
        for i in 0..count_before_end {
            agg.append(reading("waqi", 180 - i * 12, pm25(10.0))).unwrap();
        }
        agg.append(reading("waqi", 0, pm25(10.0))).unwrap();
    }

    #[test]
    fn test_fifteen_readings_over_three_hours_is_excellent() {
        let agg = aggregator();
        append_spread(&agg, 14);
        let window = agg.get_window("P1", fixed_now());
        assert_eq!(window.total_reading_count, 15);
        assert_eq!(window.span_minutes, 180);
        assert_eq!(window.quality, QualityTier::Excellent);
    }

    #[test]
    fn test_fourteen_readings_over_three_hours_is_good() {
        let agg = aggregator();
        append_spread(&agg, 13);
        let window = agg.get_window("P1", fixed_now());
        assert_eq!(window.total_reading_count, 14);
        assert_eq!(window.quality, QualityTier::Good);
    }

    #[test]
    fn test_count_uses_distinct_timestamps_across_sources() {
        let agg = aggregator();
        agg.append(reading("waqi", 30, pm25(10.0))).unwrap();
        agg.append(reading("openaq", 30, Concentrations::new().with(Pollutant::O3, 40.0)))
            .unwrap();
        let window = agg.get_window("P1", fixed_now());
        assert_eq!(window.total_reading_count, 1);
        assert_eq!(window.quality, QualityTier::Limited);
    }

    // --- Appends ------------------------------------------------------------

    #[test]
    fn test_duplicate_append_is_last_write_wins() {
        let agg = aggregator();
        assert!(matches!(
            agg.append(reading("waqi", 10, pm25(10.0))).unwrap(),
            AppendOutcome::Inserted
        ));
        assert!(matches!(
            agg.append(reading("waqi", 10, pm25(12.0))).unwrap(),
            AppendOutcome::Replaced
        ));
        assert_eq!(agg.reading_count("P1"), 1);
        let window = agg.get_window("P1", fixed_now());
        assert_eq!(window.pollutants.pm25.as_ref().unwrap().mean, 12.0);
    }

    #[test]
    fn test_unknown_source_is_rejected() {
        let err = aggregator()
            .append(reading("mystery_feed", 10, pm25(10.0)))
            .unwrap_err();
        assert_eq!(err, ConfigError::UnknownSource("mystery_feed".to_string()));
    }

    #[test]
    fn test_latest_reading_ignores_future_entries() {
        let agg = aggregator();
        agg.append(reading("waqi", 600, pm25(5.0))).unwrap();
        agg.append(reading("waqi", 300, pm25(6.0))).unwrap();
        agg.append(reading("waqi", -60, pm25(7.0))).unwrap();
        let latest = agg.latest_reading("P1", fixed_now()).unwrap();
        assert_eq!(latest.values.pm25, Some(6.0));
        assert!(agg.latest_reading("other", fixed_now()).is_none());
    }

    #[test]
    fn test_query_does_not_wait_on_another_points_append() {
        let agg = aggregator();
        agg.append(reading("waqi", 10, pm25(10.0))).unwrap();
        let mut other = reading("waqi", 10, pm25(20.0));
        other.point_id = "P2".to_string();
        agg.append(other).unwrap();

        // Hold P1's write lock as an in-flight append would.
        let p1 = agg.log("P1").unwrap();
        let _append_in_flight = write(&*p1);

        let window = agg.get_window("P2", fixed_now());
        assert_eq!(window.pollutants.pm25.as_ref().unwrap().mean, 20.0);
        assert_eq!(agg.reading_count("P2"), 1);
    }

    #[test]
    fn test_concurrent_appends_across_threads() {
        let agg = Arc::new(aggregator());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let agg = Arc::clone(&agg);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        let mut r = reading("waqi", i, pm25(1.0));
                        r.point_id = format!("P{}", t);
                        agg.append(r).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(agg.point_ids(), vec!["P0", "P1", "P2", "P3"]);
        for t in 0..4 {
            assert_eq!(agg.reading_count(&format!("P{}", t)), 25);
        }
    }
}
