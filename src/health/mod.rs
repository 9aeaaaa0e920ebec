//! Composite health-risk index.
//!
//! Every formula variant has the same shape:
//!
//!   r_i   = exp(β_i · x_i) − 1            (or 100 · (exp(β_i · x_i) − 1) when percent-weighted)
//!   index = max(floor, (10 / C) · Σ r_i), rounded to the nearest integer
//!
//! Variants differ only in `C`, `floor`, and the coefficient set, so they
//! live in configuration and are selected by name. Pollutants a variant
//! has no coefficient for, or that are absent from the input, contribute
//! nothing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analysis::window::AggregateWindow;
use crate::convert::units::UnitConverter;
use crate::error::ConfigError;
use crate::model::{Concentrations, Pollutant, PollutantMap, Reading, Unit};

/// Reason attached to a null result.
pub const NO_DATA_REASON: &str = "no data";

// ---------------------------------------------------------------------------
// Formula variants
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCoefficient {
    pub pollutant: Pollutant,
    pub beta: f64,
    #[serde(default)]
    pub percent_weighted: bool,
    /// Unit the coefficient was fitted against.
    pub unit: Unit,
}

impl HealthCoefficient {
    /// Relative-risk term for concentration `x` (already in `self.unit`).
    pub fn relative_risk(&self, x: f64) -> f64 {
        let r = (self.beta * x).exp() - 1.0;
        if self.percent_weighted { 100.0 * r } else { r }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaVariant {
    pub name: String,
    /// Scaling constant `C`.
    pub scale: f64,
    #[serde(default)]
    pub floor: f64,
    /// Marks a historical variant whose percent-weighting is knowingly
    /// inconsistent across pollutants.
    #[serde(default)]
    pub legacy: bool,
    pub coefficients: Vec<HealthCoefficient>,
}

impl FormulaVariant {
    pub fn coefficient(&self, pollutant: Pollutant) -> Option<&HealthCoefficient> {
        self.coefficients.iter().find(|c| c.pollutant == pollutant)
    }

    /// True when every coefficient agrees on percent-weighting.
    pub fn has_uniform_weighting(&self) -> bool {
        match self.coefficients.first() {
            Some(first) => self
                .coefficients
                .iter()
                .all(|c| c.percent_weighted == first.percent_weighted),
            None => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Fixed category thresholds, shared by every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthCategory {
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl HealthCategory {
    pub fn from_index(index: u32) -> Self {
        match index {
            0..=3 => HealthCategory::Low,
            4..=6 => HealthCategory::Moderate,
            7..=10 => HealthCategory::High,
            _ => HealthCategory::VeryHigh,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CalculationMethod {
    /// From a single, most recent reading.
    #[serde(rename = "current")]
    Current,
    /// From the rolling window means.
    #[serde(rename = "windowAverage")]
    WindowAverage,
    /// No usable data; the result carries no value.
    #[serde(rename = "estimated")]
    Estimated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthIndexResult {
    /// `None` means "insufficient data", which is distinct from a low index.
    pub value: Option<u32>,
    pub category: Option<HealthCategory>,
    /// Σ r_i before scaling.
    pub total_relative_risk: Option<f64>,
    /// r_i per pollutant that contributed.
    pub contributions: PollutantMap<f64>,
    pub method: CalculationMethod,
    pub variant: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl HealthIndexResult {
    pub fn no_data(variant: &str) -> Self {
        Self {
            value: None,
            category: None,
            total_relative_risk: None,
            contributions: PollutantMap::new(),
            method: CalculationMethod::Estimated,
            variant: variant.to_string(),
            reason: Some(NO_DATA_REASON.to_string()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.value.is_some()
    }
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

/// Applies `variant` to concentrations already expressed in each
/// coefficient's unit.
///
/// Returns the null "no data" result when none of the variant's pollutants
/// has a finite value.
pub fn compute_health_index(
    concentrations: &Concentrations,
    variant: &FormulaVariant,
    method: CalculationMethod,
) -> HealthIndexResult {
    let mut contributions = PollutantMap::new();
    for coefficient in &variant.coefficients {
        if let Some(&x) = concentrations.get(coefficient.pollutant) {
            if x.is_finite() {
                contributions.set(coefficient.pollutant, coefficient.relative_risk(x));
            }
        }
    }

    if contributions.is_empty() {
        return HealthIndexResult::no_data(&variant.name);
    }

    let total: f64 = contributions.iter().map(|(_, r)| *r).sum();
    let scaled = (10.0 / variant.scale) * total;
    let value = scaled.max(variant.floor).round().max(0.0) as u32;

    HealthIndexResult {
        value: Some(value),
        category: Some(HealthCategory::from_index(value)),
        total_relative_risk: Some(total),
        contributions,
        method,
        variant: variant.name.clone(),
        reason: None,
    }
}

/// Converts canonical-unit concentrations into the units `variant` expects.
///
/// Only pollutants the variant uses are carried over.
pub fn normalize_for_variant(
    canonical: &Concentrations,
    variant: &FormulaVariant,
    units: &UnitConverter,
) -> Result<Concentrations, ConfigError> {
    let mut out = Concentrations::new();
    for coefficient in &variant.coefficients {
        let p = coefficient.pollutant;
        if let Some(&value) = canonical.get(p) {
            out.set(p, units.convert(value, p.canonical_unit(), coefficient.unit, p)?);
        }
    }
    Ok(out)
}

/// Named variants plus the unit conversion needed to feed them.
#[derive(Debug, Clone)]
pub struct HealthIndexCalculator {
    variants: BTreeMap<String, FormulaVariant>,
    units: UnitConverter,
}

impl HealthIndexCalculator {
    pub fn new(variants: Vec<FormulaVariant>, units: UnitConverter) -> Self {
        Self {
            variants: variants.into_iter().map(|v| (v.name.clone(), v)).collect(),
            units,
        }
    }

    pub fn variant(&self, name: &str) -> Result<&FormulaVariant, ConfigError> {
        self.variants
            .get(name)
            .ok_or_else(|| ConfigError::UnknownVariant(name.to_string()))
    }

    pub fn variant_names(&self) -> impl Iterator<Item = &str> {
        self.variants.keys().map(String::as_str)
    }

    /// Concentrations must already be in the variant's units.
    pub fn compute(
        &self,
        concentrations: &Concentrations,
        variant: &str,
    ) -> Result<HealthIndexResult, ConfigError> {
        let variant = self.variant(variant)?;
        Ok(compute_health_index(concentrations, variant, CalculationMethod::Current))
    }

    /// Index over a window's per-pollutant means.
    pub fn compute_for_window(
        &self,
        window: &AggregateWindow,
        variant: &str,
    ) -> Result<HealthIndexResult, ConfigError> {
        let variant = self.variant(variant)?;
        let inputs = normalize_for_variant(&window.means(), variant, &self.units)?;
        Ok(compute_health_index(&inputs, variant, CalculationMethod::WindowAverage))
    }

    /// Index over a single stored reading.
    pub fn compute_for_reading(
        &self,
        reading: &Reading,
        variant: &str,
    ) -> Result<HealthIndexResult, ConfigError> {
        let variant = self.variant(variant)?;
        let inputs = normalize_for_variant(&reading.values, variant, &self.units)?;
        Ok(compute_health_index(&inputs, variant, CalculationMethod::Current))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use rstest::rstest;

    fn calculator() -> HealthIndexCalculator {
        EngineConfig::builtin()
            .expect("built-in config should load")
            .health_calculator()
    }

    fn worked_example() -> Concentrations {
        Concentrations::new()
            .with(Pollutant::Pm25, 12.0)
            .with(Pollutant::No2, 25.0)
            .with(Pollutant::O3, 60.0)
    }

    // --- Worked examples, locked per variant -------------------------------

    #[test]
    fn test_standard_variant_worked_example() {
        let result = calculator().compute(&worked_example(), "standard").unwrap();
        let total = result.total_relative_risk.unwrap();
        // exp-based terms: 1.4504 + 13.8828 + 6.1837
        assert!((total - 21.517).abs() < 0.001, "total relative risk was {}", total);
        assert!((total - 21.56).abs() < 0.05);
        assert_eq!(result.value, Some(2));
        assert_eq!(result.category, Some(HealthCategory::Low));
        assert_eq!(result.method, CalculationMethod::Current);
    }

    #[rstest]
    #[case("standard", 2)]
    #[case("legacy_mixed", 0)]
    #[case("canada_aqhi", 6)]
    fn test_each_named_variant_is_locked(#[case] variant: &str, #[case] expected: u32) {
        let result = calculator().compute(&worked_example(), variant).unwrap();
        assert_eq!(result.value, Some(expected), "variant {}", variant);
    }

    #[test]
    fn test_legacy_variant_scales_only_pm25() {
        let result = calculator().compute(&worked_example(), "legacy_mixed").unwrap();
        let no2 = *result.contributions.get(Pollutant::No2).unwrap();
        let pm25 = *result.contributions.get(Pollutant::Pm25).unwrap();
        assert!((no2 - 0.1388).abs() < 0.0001);
        assert!((pm25 - 1.4504).abs() < 0.0001);
    }

    // --- Missing data -------------------------------------------------------

    #[test]
    fn test_absent_pollutants_never_contribute() {
        let c = calculator();
        let only_pm = Concentrations::new().with(Pollutant::Pm25, 50.0);
        let mut with_gap = only_pm.clone();
        with_gap.no2 = None;
        assert_eq!(
            c.compute(&only_pm, "standard").unwrap(),
            c.compute(&with_gap, "standard").unwrap()
        );
    }

    #[test]
    fn test_all_absent_is_null_result_not_zero() {
        let result = calculator()
            .compute(&Concentrations::new(), "standard")
            .unwrap();
        assert_eq!(result.value, None);
        assert_eq!(result.method, CalculationMethod::Estimated);
        assert_eq!(result.reason.as_deref(), Some(NO_DATA_REASON));
        assert!(!result.is_available());
    }

    #[test]
    fn test_pollutants_outside_variant_are_ignored() {
        let only_so2 = Concentrations::new().with(Pollutant::So2, 40.0);
        let result = calculator().compute(&only_so2, "standard").unwrap();
        assert_eq!(result.value, None);
    }

    #[test]
    fn test_zero_concentration_is_data_and_hits_floor() {
        let zero = Concentrations::new().with(Pollutant::O3, 0.0);
        let standard = calculator().compute(&zero, "standard").unwrap();
        assert_eq!(standard.value, Some(1));
        let legacy = calculator().compute(&zero, "legacy_mixed").unwrap();
        assert_eq!(legacy.value, Some(0));
    }

    // --- Configuration errors -----------------------------------------------

    #[test]
    fn test_unknown_variant_fails_fast() {
        let err = calculator().compute(&worked_example(), "nope").unwrap_err();
        assert_eq!(err, ConfigError::UnknownVariant("nope".to_string()));
    }

    #[test]
    fn test_variant_names_are_sorted() {
        let calc = calculator();
        let names: Vec<&str> = calc.variant_names().collect();
        assert_eq!(names, vec!["canada_aqhi", "legacy_mixed", "standard"]);
    }

    // --- Categories ---------------------------------------------------------

    #[rstest]
    #[case(0, HealthCategory::Low)]
    #[case(3, HealthCategory::Low)]
    #[case(4, HealthCategory::Moderate)]
    #[case(6, HealthCategory::Moderate)]
    #[case(7, HealthCategory::High)]
    #[case(10, HealthCategory::High)]
    #[case(11, HealthCategory::VeryHigh)]
    #[case(25, HealthCategory::VeryHigh)]
    fn test_category_thresholds(#[case] index: u32, #[case] expected: HealthCategory) {
        assert_eq!(HealthCategory::from_index(index), expected);
    }

    #[test]
    fn test_high_pollution_reaches_very_high() {
        let heavy = Concentrations::new()
            .with(Pollutant::Pm25, 150.0)
            .with(Pollutant::No2, 200.0)
            .with(Pollutant::O3, 120.0);
        let result = calculator().compute(&heavy, "standard").unwrap();
        assert_eq!(result.value, Some(20));
        assert_eq!(result.category, Some(HealthCategory::VeryHigh));
    }

    #[test]
    fn test_result_serializes_method_names() {
        let result = calculator().compute(&worked_example(), "standard").unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["method"], "current");
        assert_eq!(json["category"], "low");
        assert!(json.get("reason").is_none());
    }

    #[test]
    fn test_uniform_weighting_check() {
        let c = calculator();
        assert!(c.variant("standard").unwrap().has_uniform_weighting());
        assert!(!c.variant("legacy_mixed").unwrap().has_uniform_weighting());
    }
}
