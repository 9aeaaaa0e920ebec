//! Air-quality fusion engine.
//!
//! Converts categorical index readings from several monitoring feeds into
//! pollutant concentrations, fuses them per monitoring point over a rolling
//! window with primary-over-secondary priority, and computes a composite
//! health-risk index from the fused window.

pub mod analysis;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod health;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod points;
pub mod verify;

pub use config::EngineConfig;
pub use engine::{AirQualityEngine, BatchSummary};
pub use error::ConfigError;
