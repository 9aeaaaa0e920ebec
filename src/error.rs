//! Configuration errors.
//!
//! Only programmer / configuration mistakes are errors. Missing or
//! out-of-range data is an expected steady state and is modelled with
//! `Option` or a null `HealthIndexResult` instead.

use thiserror::Error;

use crate::model::{AveragingPeriod, Pollutant, Unit};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown pollutant code: {0}")]
    UnknownPollutant(String),

    #[error("unknown health formula variant: {0}")]
    UnknownVariant(String),

    #[error("unknown source tag: {0}")]
    UnknownSource(String),

    #[error("no breakpoints configured for {pollutant} ({period})")]
    MissingBreakpoints {
        pollutant: Pollutant,
        period: AveragingPeriod,
    },

    #[error("cannot convert {pollutant} from {from} to {to}")]
    UnsupportedConversion {
        pollutant: Pollutant,
        from: Unit,
        to: Unit,
    },

    #[error("invalid configuration table: {0}")]
    InvalidTable(String),

    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("failed to read configuration file {path}: {message}")]
    Io { path: String, message: String },
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}
