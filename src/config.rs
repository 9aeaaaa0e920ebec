/// Engine configuration.
///
/// Breakpoint tables, molecular weights, source roles and formula variants
/// are static configuration, loaded once at startup from TOML. A default
/// configuration ships inside the crate (`config/engine.toml`); deployments
/// can point `AQMON_CONFIG` at a replacement file.
///
/// Every configuration is verified before it is handed out, so a table that
/// overlaps or a variant with no coefficients fails at load time rather
/// than while serving readings.

use chrono::Duration;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::convert::breakpoints::{BreakpointEntry, BreakpointTable};
use crate::convert::index::IndexConverter;
use crate::convert::units::{STANDARD_MOLAR_VOLUME_L, UnitConverter};
use crate::error::ConfigError;
use crate::health::{FormulaVariant, HealthIndexCalculator};
use crate::model::{AveragingPeriod, Pollutant, SourceRole, Unit};
use crate::verify;

/// Environment variable naming an alternative configuration file.
pub const CONFIG_PATH_ENV: &str = "AQMON_CONFIG";

/// Upper bound for the hour-valued window settings (one leap year).
pub const MAX_SETTING_HOURS: i64 = 24 * 366;

const BUILTIN_CONFIG: &str = include_str!("../config/engine.toml");

// ---------------------------------------------------------------------------
// File layout
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ConfigFile {
    default_variant: String,
    #[serde(default)]
    window: WindowSettings,
    #[serde(default)]
    matching: MatchingSettings,
    #[serde(default)]
    sources: Vec<SourceConfig>,
    #[serde(default)]
    units: UnitsFile,
    #[serde(default)]
    default_periods: BTreeMap<String, AveragingPeriod>,
    #[serde(default)]
    breakpoints: Vec<BreakpointGroupFile>,
    #[serde(default)]
    variants: Vec<FormulaVariant>,
}

#[derive(Debug, Deserialize)]
struct UnitsFile {
    #[serde(default = "default_molar_volume")]
    molar_volume_l: f64,
    #[serde(default)]
    molecular_weights: BTreeMap<String, f64>,
}

impl Default for UnitsFile {
    fn default() -> Self {
        Self {
            molar_volume_l: STANDARD_MOLAR_VOLUME_L,
            molecular_weights: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BreakpointGroupFile {
    pollutant: String,
    period: AveragingPeriod,
    unit: Unit,
    /// Rows of `[index_low, index_high, conc_low, conc_high]`.
    ranges: Vec<[f64; 4]>,
}

fn default_molar_volume() -> f64 {
    STANDARD_MOLAR_VOLUME_L
}

fn default_window_hours() -> i64 {
    3
}

fn default_fallback_hours() -> i64 {
    24
}

fn default_max_distance_km() -> f64 {
    10.0
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WindowSettings {
    /// Trailing window length.
    #[serde(default = "default_window_hours")]
    pub hours: i64,
    /// Oldest single reading the current-reading fallback will use.
    #[serde(default = "default_fallback_hours")]
    pub fallback_max_age_hours: i64,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            hours: default_window_hours(),
            fallback_max_age_hours: default_fallback_hours(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MatchingSettings {
    #[serde(default = "default_max_distance_km")]
    pub max_distance_km: f64,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            max_distance_km: default_max_distance_km(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceConfig {
    pub tag: String,
    pub role: SourceRole,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub default_variant: String,
    pub window: WindowSettings,
    pub matching: MatchingSettings,
    pub sources: Vec<SourceConfig>,
    pub molar_volume_l: f64,
    pub molecular_weights: BTreeMap<Pollutant, f64>,
    pub default_periods: BTreeMap<Pollutant, AveragingPeriod>,
    pub breakpoints: Vec<BreakpointEntry>,
    pub variants: Vec<FormulaVariant>,
}

impl EngineConfig {
    /// The configuration compiled into the crate.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_toml_str(BUILTIN_CONFIG)
    }

    /// Loads and verifies a TOML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Reads `.env`, then loads the file named by `AQMON_CONFIG`, or the
    /// built-in configuration when the variable is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => {
                tracing::info!(path = %path, "loading engine configuration");
                Self::from_file(path.trim())
            }
            _ => Self::builtin(),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(text)?;
        let config = Self::resolve(file)?;

        let report = verify::verify_config(&config);
        if !report.is_valid() {
            return Err(ConfigError::InvalidTable(report.errors.join("; ")));
        }
        for warning in &report.warnings {
            tracing::warn!(warning = %warning, "configuration warning");
        }
        Ok(config)
    }

    fn resolve(file: ConfigFile) -> Result<Self, ConfigError> {
        let molecular_weights = file
            .units
            .molecular_weights
            .into_iter()
            .map(|(code, mw)| Ok((code.parse::<Pollutant>()?, mw)))
            .collect::<Result<BTreeMap<_, _>, ConfigError>>()?;

        let default_periods = file
            .default_periods
            .into_iter()
            .map(|(code, period)| Ok((code.parse::<Pollutant>()?, period)))
            .collect::<Result<BTreeMap<_, _>, ConfigError>>()?;

        let mut breakpoints = Vec::new();
        for group in file.breakpoints {
            let pollutant = group.pollutant.parse::<Pollutant>()?;
            for [index_low, index_high, conc_low, conc_high] in group.ranges {
                breakpoints.push(BreakpointEntry {
                    pollutant,
                    period: group.period,
                    index_low,
                    index_high,
                    conc_low,
                    conc_high,
                    unit: group.unit,
                });
            }
        }

        Ok(Self {
            default_variant: file.default_variant,
            window: file.window,
            matching: file.matching,
            sources: file.sources,
            molar_volume_l: file.units.molar_volume_l,
            molecular_weights,
            default_periods,
            breakpoints,
            variants: file.variants,
        })
    }

    // --- Component construction ---------------------------------------------

    pub fn breakpoint_table(&self) -> BreakpointTable {
        BreakpointTable::new(self.breakpoints.clone(), self.default_periods.clone())
    }

    pub fn index_converter(&self) -> IndexConverter {
        IndexConverter::new(Arc::new(self.breakpoint_table()))
    }

    pub fn unit_converter(&self) -> UnitConverter {
        UnitConverter::new(self.molar_volume_l, self.molecular_weights.clone())
    }

    pub fn health_calculator(&self) -> HealthIndexCalculator {
        HealthIndexCalculator::new(self.variants.clone(), self.unit_converter())
    }

    // --- Lookups ------------------------------------------------------------

    pub fn source_role(&self, tag: &str) -> Result<SourceRole, ConfigError> {
        self.sources
            .iter()
            .find(|s| s.tag == tag)
            .map(|s| s.role)
            .ok_or_else(|| ConfigError::UnknownSource(tag.to_string()))
    }

    pub fn source_roles(&self) -> BTreeMap<String, SourceRole> {
        self.sources.iter().map(|s| (s.tag.clone(), s.role)).collect()
    }

    /// Clamped to `0..=MAX_SETTING_HOURS`; verification rejects values outside it.
    pub fn window_duration(&self) -> Duration {
        Duration::hours(self.window.hours.clamp(0, MAX_SETTING_HOURS))
    }

    pub fn fallback_max_age(&self) -> Duration {
        Duration::hours(self.window.fallback_max_age_hours.clamp(0, MAX_SETTING_HOURS))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
