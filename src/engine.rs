/// The composed fusion flow.
///
///   feed adapter → `ingest` → per-point log → `window` → `health_index`
///
/// Primary feeds that carry station metadata register points on first
/// sight; secondary feeds only ever attach to existing, active points.
/// When a point's window is empty the health index falls back to the most
/// recent reading, provided it is not older than the configured fallback
/// age.
///
/// The engine is `Send + Sync`. Schedulers for each feed share it through
/// an `Arc` and call `ingest` concurrently with dashboard queries.

use chrono::{DateTime, Utc};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::analysis::quality::QualityTier;
use crate::analysis::staleness::{age_at, is_stale_at};
use crate::analysis::window::{AggregateWindow, WindowAggregator};
use crate::config::EngineConfig;
use crate::error::ConfigError;
use crate::health::{HealthIndexCalculator, HealthIndexResult};
use crate::ingest::{IngestOutcome, Ingestor};
use crate::logging::log_ingest_summary;
use crate::model::{Coordinates, MonitoringPoint, RawReading, Reading, ReadingTarget, SourceRole};
use crate::points::PointRegistry;

/// Counts for one feed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub accepted: usize,
    pub dropped: usize,
}

#[derive(Debug)]
pub struct AirQualityEngine {
    config: EngineConfig,
    registry: RwLock<PointRegistry>,
    aggregator: WindowAggregator,
    ingestor: Ingestor,
    health: HealthIndexCalculator,
}

impl AirQualityEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            registry: RwLock::new(PointRegistry::new()),
            aggregator: WindowAggregator::from_config(&config),
            ingestor: Ingestor::from_config(&config),
            health: config.health_calculator(),
            config,
        }
    }

    /// Engine over the embedded default configuration.
    pub fn builtin() -> Result<Self, ConfigError> {
        Ok(Self::new(EngineConfig::builtin()?))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn aggregator(&self) -> &WindowAggregator {
        &self.aggregator
    }

    pub fn health_calculator(&self) -> &HealthIndexCalculator {
        &self.health
    }

    fn registry(&self) -> RwLockReadGuard<'_, PointRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry_mut(&self) -> RwLockWriteGuard<'_, PointRegistry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Points
    // -----------------------------------------------------------------------

    /// Registers a point outside the feed flow (seeding from a station list).
    pub fn register_point(&self, id: &str, name: &str, location: Coordinates) -> bool {
        self.registry_mut().observe(id, name, location)
    }

    pub fn set_point_active(&self, id: &str, active: bool) -> bool {
        let changed = self.registry_mut().set_active(id, active);
        if changed {
            tracing::info!(point_id = %id, active, "monitoring point status changed");
        }
        changed
    }

    pub fn point(&self, id: &str) -> Option<MonitoringPoint> {
        self.registry().find(id).cloned()
    }

    pub fn active_points(&self) -> Vec<MonitoringPoint> {
        self.registry().active_points().cloned().collect()
    }

    // -----------------------------------------------------------------------
    // Ingest
    // -----------------------------------------------------------------------

    /// Normalizes and stores one feed reading.
    ///
    /// Unknown source tags and table gaps are configuration errors; every
    /// data-availability problem is reported as `IngestOutcome::Dropped`.
    pub fn ingest(&self, raw: &RawReading) -> Result<IngestOutcome, ConfigError> {
        let role = self.aggregator.role_of(&raw.source)?;

        if role == SourceRole::Primary {
            if let ReadingTarget::Point {
                id,
                name,
                location: Some(location),
            } = &raw.target
            {
                let name = name.as_deref().unwrap_or(id.as_str());
                self.registry_mut().observe(id, name, *location);
            }
        }

        let outcome = {
            let registry = self.registry();
            self.ingestor.normalize(raw, &registry)?
        };

        if let IngestOutcome::Accepted(reading) = &outcome {
            self.aggregator.append(reading.clone())?;
        }
        Ok(outcome)
    }

    /// Ingests a batch from one feed and logs a summary.
    pub fn ingest_batch<'a>(
        &self,
        source: &str,
        readings: impl IntoIterator<Item = &'a RawReading>,
    ) -> Result<BatchSummary, ConfigError> {
        let mut summary = BatchSummary::default();
        for raw in readings {
            summary.total += 1;
            match self.ingest(raw)? {
                IngestOutcome::Accepted(_) => summary.accepted += 1,
                IngestOutcome::Dropped(_) => summary.dropped += 1,
            }
        }
        log_ingest_summary(source, summary.total, summary.accepted, summary.dropped);
        Ok(summary)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn window(&self, point_id: &str, now: DateTime<Utc>) -> AggregateWindow {
        self.aggregator.get_window(point_id, now)
    }

    pub fn latest_reading(&self, point_id: &str, now: DateTime<Utc>) -> Option<Reading> {
        self.aggregator.latest_reading(point_id, now)
    }

    /// Health index for a point at `now`. `variant` defaults to the
    /// configured `default_variant`.
    pub fn health_index(
        &self,
        point_id: &str,
        now: DateTime<Utc>,
        variant: Option<&str>,
    ) -> Result<HealthIndexResult, ConfigError> {
        let variant = variant.unwrap_or(self.config.default_variant.as_str());
        self.health.variant(variant)?;

        let window = self.aggregator.get_window(point_id, now);
        if window.quality != QualityTier::Estimated {
            return self.health.compute_for_window(&window, variant);
        }

        match self.aggregator.latest_reading(point_id, now) {
            Some(reading) if !is_stale_at(&reading, self.config.fallback_max_age(), now) => {
                self.health.compute_for_reading(&reading, variant)
            }
            Some(reading) => {
                tracing::debug!(
                    point_id = %point_id,
                    source = %reading.source,
                    age_minutes = age_at(&reading, now).num_minutes(),
                    "latest reading too old for fallback"
                );
                Ok(HealthIndexResult::no_data(variant))
            }
            None => Ok(HealthIndexResult::no_data(variant)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
