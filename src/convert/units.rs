//! Molar-fraction ↔ mass-concentration conversion.
//!
//! At fixed standard conditions (25 °C, 1 atm) one mole of ideal gas
//! occupies `molar_volume_l` litres, so
//!
//!   µg/m³ = ppb × MW / molar_volume_l
//!   mg/m³ = ppm × MW / molar_volume_l
//!
//! This is a pure linear scale per pollutant. Particulates have no
//! molecular weight and only convert between µg/m³ and mg/m³.

use std::collections::BTreeMap;

use crate::error::ConfigError;
use crate::model::{Measured, Pollutant, Unit};

/// Molar volume of an ideal gas at 25 °C and 1 atm, in litres.
pub const STANDARD_MOLAR_VOLUME_L: f64 = 24.45;

#[derive(Debug, Clone)]
pub struct UnitConverter {
    molar_volume_l: f64,
    molecular_weights: BTreeMap<Pollutant, f64>,
}

impl UnitConverter {
    pub fn new(molar_volume_l: f64, molecular_weights: BTreeMap<Pollutant, f64>) -> Self {
        Self {
            molar_volume_l,
            molecular_weights,
        }
    }

    pub fn molar_volume_l(&self) -> f64 {
        self.molar_volume_l
    }

    /// µg/m³ per ppb (equivalently mg/m³ per ppm) for a gas.
    pub fn factor(&self, pollutant: Pollutant) -> Option<f64> {
        if pollutant.is_particulate() {
            return None;
        }
        self.molecular_weights
            .get(&pollutant)
            .map(|mw| mw / self.molar_volume_l)
    }

    fn molar_factor(&self, pollutant: Pollutant, from: Unit, to: Unit) -> Result<f64, ConfigError> {
        self.factor(pollutant)
            .ok_or(ConfigError::UnsupportedConversion { pollutant, from, to })
    }

    /// Converts `value` in `native_unit` into µg/m³.
    pub fn to_mass_concentration(
        &self,
        value: f64,
        native_unit: Unit,
        pollutant: Pollutant,
    ) -> Result<f64, ConfigError> {
        let target = Unit::MicrogramsPerCubicMeter;
        Ok(match native_unit {
            Unit::MicrogramsPerCubicMeter => value,
            Unit::MilligramsPerCubicMeter => value * 1000.0,
            Unit::Ppb => value * self.molar_factor(pollutant, native_unit, target)?,
            Unit::Ppm => value * 1000.0 * self.molar_factor(pollutant, native_unit, target)?,
        })
    }

    /// Converts a µg/m³ value into `target_unit`. Inverse of `to_mass_concentration`.
    pub fn from_mass_concentration(
        &self,
        mass_ugm3: f64,
        target_unit: Unit,
        pollutant: Pollutant,
    ) -> Result<f64, ConfigError> {
        let source = Unit::MicrogramsPerCubicMeter;
        Ok(match target_unit {
            Unit::MicrogramsPerCubicMeter => mass_ugm3,
            Unit::MilligramsPerCubicMeter => mass_ugm3 / 1000.0,
            Unit::Ppb => mass_ugm3 / self.molar_factor(pollutant, source, target_unit)?,
            Unit::Ppm => mass_ugm3 / (1000.0 * self.molar_factor(pollutant, source, target_unit)?),
        })
    }

    /// `from` → µg/m³ → `to`. Same-unit conversions pass through untouched.
    pub fn convert(
        &self,
        value: f64,
        from: Unit,
        to: Unit,
        pollutant: Pollutant,
    ) -> Result<f64, ConfigError> {
        if from == to {
            return Ok(value);
        }
        if pollutant.is_particulate() && (from.is_molar() || to.is_molar()) {
            return Err(ConfigError::UnsupportedConversion { pollutant, from, to });
        }
        let mass = self.to_mass_concentration(value, from, pollutant)?;
        self.from_mass_concentration(mass, to, pollutant)
    }

    /// Normalizes a reported value into the pollutant's canonical unit.
    pub fn to_canonical(&self, measured: Measured, pollutant: Pollutant) -> Result<f64, ConfigError> {
        self.convert(measured.value, measured.unit, pollutant.canonical_unit(), pollutant)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn converter() -> UnitConverter {
        EngineConfig::builtin()
            .expect("built-in config should load")
            .unit_converter()
    }

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {} ± {}, got {}",
            expected,
            tol,
            actual
        );
    }

    #[test]
    fn test_builtin_molar_volume_is_standard_conditions() {
        assert_eq!(converter().molar_volume_l(), STANDARD_MOLAR_VOLUME_L);
        assert_eq!(converter().factor(Pollutant::Pm25), None);
    }

    #[test]
    fn test_ozone_ppb_to_mass() {
        // MW 48.00 / 24.45 ≈ 1.9632 µg/m³ per ppb
        let mass = converter()
            .to_mass_concentration(60.0, Unit::Ppb, Pollutant::O3)
            .unwrap();
        assert_close(mass, 117.79, 0.01);
    }

    #[test]
    fn test_carbon_monoxide_ppm_to_mg() {
        // MW 28.01 / 24.45 ≈ 1.1456 mg/m³ per ppm
        let mg = converter()
            .convert(1.0, Unit::Ppm, Unit::MilligramsPerCubicMeter, Pollutant::Co)
            .unwrap();
        assert_close(mg, 1.1456, 0.0001);
    }

    #[test]
    fn test_two_step_chain_ppm_to_mass_to_ppb() {
        let c = converter();
        let mass = c.to_mass_concentration(0.05, Unit::Ppm, Pollutant::No2).unwrap();
        let ppb = c.from_mass_concentration(mass, Unit::Ppb, Pollutant::No2).unwrap();
        assert_close(ppb, 50.0, 1e-9);
    }

    #[test]
    fn test_mass_units_scale_by_thousand() {
        let c = converter();
        let ug = c
            .convert(0.035, Unit::MilligramsPerCubicMeter, Unit::MicrogramsPerCubicMeter, Pollutant::Pm25)
            .unwrap();
        assert_close(ug, 35.0, 1e-9);
    }

    #[test]
    fn test_particulates_have_no_molar_form() {
        let err = converter()
            .convert(12.0, Unit::MicrogramsPerCubicMeter, Unit::Ppb, Pollutant::Pm25)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedConversion { pollutant: Pollutant::Pm25, .. }));
    }

    #[test]
    fn test_same_unit_is_identity() {
        let c = converter();
        assert_eq!(c.convert(7.5, Unit::Ppb, Unit::Ppb, Pollutant::So2).unwrap(), 7.5);
    }

    #[test]
    fn test_to_canonical_uses_pollutant_default_unit() {
        let c = converter();
        let so2 = c
            .to_canonical(Measured::new(26.2, Unit::MicrogramsPerCubicMeter), Pollutant::So2)
            .unwrap();
        assert_close(so2, 10.0, 0.01);
    }
}
