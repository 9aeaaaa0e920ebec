//! Raw reading normalization.

use std::fmt;

use crate::analysis::nearest::match_to_nearest_point;
use crate::config::EngineConfig;
use crate::convert::index::IndexConverter;
use crate::convert::units::UnitConverter;
use crate::error::ConfigError;
use crate::model::{Concentrations, RawReading, Reading, ReadingTarget, ReadingValues};
use crate::points::PointRegistry;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a raw reading did not make it into the log. These are expected
/// steady-state conditions, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Supplemental coordinate with no active point within range.
    NoNearbyPoint,
    /// Named point that is not registered and cannot be registered from this reading.
    UnknownPoint,
    /// Named point that has been deactivated.
    InactivePoint,
    /// Every value was out of range or non-finite.
    NoUsableValues,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::NoNearbyPoint => write!(f, "no monitoring point within range"),
            DropReason::UnknownPoint => write!(f, "unknown monitoring point"),
            DropReason::InactivePoint => write!(f, "monitoring point is inactive"),
            DropReason::NoUsableValues => write!(f, "no usable pollutant values"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Accepted(Reading),
    Dropped(DropReason),
}

// ---------------------------------------------------------------------------
// Ingestor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Ingestor {
    index: IndexConverter,
    units: UnitConverter,
    max_distance_km: f64,
}

impl Ingestor {
    pub fn new(index: IndexConverter, units: UnitConverter, max_distance_km: f64) -> Self {
        Self {
            index,
            units,
            max_distance_km,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.index_converter(),
            config.unit_converter(),
            config.matching.max_distance_km,
        )
    }

    /// Converts feed values into canonical-unit concentrations.
    ///
    /// Index values use each pollutant's default averaging period. Values
    /// that fall outside the breakpoint table are dropped individually.
    pub fn normalize_values(
        &self,
        values: &ReadingValues,
        source: &str,
    ) -> Result<Concentrations, ConfigError> {
        let mut out = Concentrations::new();
        match values {
            ReadingValues::Index(indices) => {
                for (pollutant, &index) in indices.iter() {
                    let period = self.index.default_period(pollutant)?;
                    match self.index.index_to_measured(index, pollutant, period)? {
                        Some(measured) => {
                            out.set(pollutant, self.units.to_canonical(measured, pollutant)?);
                        }
                        None => {
                            tracing::debug!(
                                source = %source,
                                pollutant = %pollutant,
                                index,
                                "index outside breakpoint table, value dropped"
                            );
                        }
                    }
                }
            }
            ReadingValues::Concentration(measured) => {
                for (pollutant, m) in measured.iter() {
                    if !m.value.is_finite() {
                        continue;
                    }
                    out.set(pollutant, self.units.to_canonical(*m, pollutant)?);
                }
            }
        }
        Ok(out)
    }

    /// Resolves the reading's target to a registered, active point id.
    pub fn resolve_point(
        &self,
        target: &ReadingTarget,
        registry: &PointRegistry,
    ) -> Result<String, DropReason> {
        match target {
            ReadingTarget::Point { id, .. } => match registry.find(id) {
                Some(point) if point.active => Ok(point.id.clone()),
                Some(_) => Err(DropReason::InactivePoint),
                None => Err(DropReason::UnknownPoint),
            },
            ReadingTarget::Location(coord) => {
                match_to_nearest_point(*coord, registry.active_points(), self.max_distance_km)
                    .map(|m| m.point_id)
                    .ok_or(DropReason::NoNearbyPoint)
            }
        }
    }

    /// Full normalization of one raw reading against the current registry.
    pub fn normalize(
        &self,
        raw: &RawReading,
        registry: &PointRegistry,
    ) -> Result<IngestOutcome, ConfigError> {
        let point_id = match self.resolve_point(&raw.target, registry) {
            Ok(id) => id,
            Err(reason) => {
                tracing::debug!(source = %raw.source, %reason, "reading dropped");
                return Ok(IngestOutcome::Dropped(reason));
            }
        };

        let values = self.normalize_values(&raw.values, &raw.source)?;
        if values.is_empty() {
            tracing::debug!(
                point_id = %point_id,
                source = %raw.source,
                "reading dropped: no usable values"
            );
            return Ok(IngestOutcome::Dropped(DropReason::NoUsableValues));
        }

        Ok(IngestOutcome::Accepted(Reading {
            point_id,
            timestamp: raw.timestamp,
            source: raw.source.clone(),
            values,
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
