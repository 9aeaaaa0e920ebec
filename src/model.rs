/// Core data types for the air-quality fusion engine.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no I/O and no conversion logic, only types and the small
/// helpers needed to move between string codes and enum variants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Pollutant codes
// ---------------------------------------------------------------------------

/// The fixed set of pollutants the engine understands.
///
/// Feeds report sparse, varying subsets of these; a `PollutantMap` carries
/// one optional slot per code so "missing" is never confused with zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pollutant {
    Pm25,
    Pm10,
    O3,
    No2,
    So2,
    Co,
}

impl Pollutant {
    pub const ALL: [Pollutant; 6] = [
        Pollutant::Pm25,
        Pollutant::Pm10,
        Pollutant::O3,
        Pollutant::No2,
        Pollutant::So2,
        Pollutant::Co,
    ];

    /// Short code used in configuration files and feed payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Pollutant::Pm25 => "pm25",
            Pollutant::Pm10 => "pm10",
            Pollutant::O3 => "o3",
            Pollutant::No2 => "no2",
            Pollutant::So2 => "so2",
            Pollutant::Co => "co",
        }
    }

    /// Particulates are mass-only; they have no molar-fraction form.
    pub fn is_particulate(&self) -> bool {
        matches!(self, Pollutant::Pm25 | Pollutant::Pm10)
    }

    /// Unit every stored reading is normalized into.
    pub fn canonical_unit(&self) -> Unit {
        match self {
            Pollutant::Pm25 | Pollutant::Pm10 => Unit::MicrogramsPerCubicMeter,
            Pollutant::O3 | Pollutant::No2 | Pollutant::So2 => Unit::Ppb,
            Pollutant::Co => Unit::Ppm,
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Pollutant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['.', '_'], "").as_str() {
            "pm25" => Ok(Pollutant::Pm25),
            "pm10" => Ok(Pollutant::Pm10),
            "o3" => Ok(Pollutant::O3),
            "no2" => Ok(Pollutant::No2),
            "so2" => Ok(Pollutant::So2),
            "co" => Ok(Pollutant::Co),
            _ => Err(ConfigError::UnknownPollutant(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Averaging periods and units
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AveragingPeriod {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "8h")]
    EightHour,
    #[serde(rename = "24h")]
    TwentyFourHour,
}

impl fmt::Display for AveragingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AveragingPeriod::OneHour => write!(f, "1h"),
            AveragingPeriod::EightHour => write!(f, "8h"),
            AveragingPeriod::TwentyFourHour => write!(f, "24h"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "ppm")]
    Ppm,
    #[serde(rename = "ppb")]
    Ppb,
    #[serde(rename = "ug/m3")]
    MicrogramsPerCubicMeter,
    #[serde(rename = "mg/m3")]
    MilligramsPerCubicMeter,
}

impl Unit {
    pub fn is_molar(&self) -> bool {
        matches!(self, Unit::Ppm | Unit::Ppb)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Ppm => write!(f, "ppm"),
            Unit::Ppb => write!(f, "ppb"),
            Unit::MicrogramsPerCubicMeter => write!(f, "µg/m³"),
            Unit::MilligramsPerCubicMeter => write!(f, "mg/m³"),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-pollutant values
// ---------------------------------------------------------------------------

/// One optional slot per known pollutant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollutantMap<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pm25: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pm10: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub o3: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no2: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub so2: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub co: Option<T>,
}

impl<T> Default for PollutantMap<T> {
    fn default() -> Self {
        Self {
            pm25: None,
            pm10: None,
            o3: None,
            no2: None,
            so2: None,
            co: None,
        }
    }
}

impl<T> PollutantMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pollutant: Pollutant) -> Option<&T> {
        self.slot(pollutant).as_ref()
    }

    pub fn set(&mut self, pollutant: Pollutant, value: T) {
        *self.slot_mut(pollutant) = Some(value);
    }

    pub fn remove(&mut self, pollutant: Pollutant) -> Option<T> {
        self.slot_mut(pollutant).take()
    }

    /// Builder-style `set`, handy in tests and feed adapters.
    pub fn with(mut self, pollutant: Pollutant, value: T) -> Self {
        self.set(pollutant, value);
        self
    }

    /// Present entries in `Pollutant::ALL` order.
    pub fn iter(&self) -> impl Iterator<Item = (Pollutant, &T)> {
        Pollutant::ALL
            .into_iter()
            .filter_map(move |p| self.get(p).map(|v| (p, v)))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn map<U>(&self, mut f: impl FnMut(Pollutant, &T) -> U) -> PollutantMap<U> {
        let mut out = PollutantMap::new();
        for (p, v) in self.iter() {
            out.set(p, f(p, v));
        }
        out
    }

    fn slot(&self, pollutant: Pollutant) -> &Option<T> {
        match pollutant {
            Pollutant::Pm25 => &self.pm25,
            Pollutant::Pm10 => &self.pm10,
            Pollutant::O3 => &self.o3,
            Pollutant::No2 => &self.no2,
            Pollutant::So2 => &self.so2,
            Pollutant::Co => &self.co,
        }
    }

    fn slot_mut(&mut self, pollutant: Pollutant) -> &mut Option<T> {
        match pollutant {
            Pollutant::Pm25 => &mut self.pm25,
            Pollutant::Pm10 => &mut self.pm10,
            Pollutant::O3 => &mut self.o3,
            Pollutant::No2 => &mut self.no2,
            Pollutant::So2 => &mut self.so2,
            Pollutant::Co => &mut self.co,
        }
    }
}

/// Concentrations keyed by pollutant, in whatever unit the caller states.
pub type Concentrations = PollutantMap<f64>;

/// A concentration as reported by a feed, with its unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Measured {
    pub value: f64,
    pub unit: Unit,
}

impl Measured {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }
}

/// Values carried by one feed reading. A feed reports either categorical
/// indices or concentrations for a reading, never a mix.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadingValues {
    Index(PollutantMap<f64>),
    Concentration(PollutantMap<Measured>),
}

impl ReadingValues {
    pub fn is_index(&self) -> bool {
        matches!(self, ReadingValues::Index(_))
    }
}

// ---------------------------------------------------------------------------
// Monitoring points and sources
// ---------------------------------------------------------------------------

/// WGS84 decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitoringPoint {
    pub id: String,
    pub name: String,
    pub location: Coordinates,
    /// Cleared by soft deactivation; points are never removed.
    pub active: bool,
}

/// Role a feed plays in fusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceRole {
    /// Authoritative feed for a point.
    Primary,
    /// Supplemental feed, only used to fill pollutant gaps.
    Secondary,
}

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// Where a raw reading belongs. Co-located feeds name the point directly;
/// gridded or otherwise non-co-located feeds only give a coordinate.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadingTarget {
    /// Station metadata is optional; a primary feed that carries it can
    /// register a point on first sight.
    Point {
        id: String,
        name: Option<String>,
        location: Option<Coordinates>,
    },
    Location(Coordinates),
}

impl ReadingTarget {
    pub fn point(id: &str) -> Self {
        ReadingTarget::Point {
            id: id.to_string(),
            name: None,
            location: None,
        }
    }

    pub fn station(id: &str, name: &str, location: Coordinates) -> Self {
        ReadingTarget::Point {
            id: id.to_string(),
            name: Some(name.to_string()),
            location: Some(location),
        }
    }
}

/// A reading as it arrives from a feed adapter, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    pub target: ReadingTarget,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub values: ReadingValues,
}

/// A normalized, immutable observation stored in the per-point log.
///
/// `values` are concentrations in each pollutant's canonical unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub point_id: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub values: Concentrations,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
