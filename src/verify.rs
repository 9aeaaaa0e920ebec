//! Configuration Verification Module
//!
//! Checks a loaded configuration for the structural invariants the engine
//! relies on: breakpoint groups are well-formed, sorted, contiguous and
//! non-overlapping; every default period has a table; formula variants are
//! usable and convertible. Errors make the configuration unusable;
//! warnings are reported but tolerated.
//!
//! `EngineConfig` runs this on every load. The report is serializable so
//! deployment tooling can print or archive it.

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::config::{EngineConfig, MAX_SETTING_HOURS};
use crate::convert::breakpoints::BreakpointEntry;
use crate::model::{AveragingPeriod, Pollutant, SourceRole};

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub timestamp: String,
    pub tables: Vec<TableVerification>,
    pub variants: Vec<VariantVerification>,
    /// Every error, including those already listed per table/variant.
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl VerificationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TableVerification {
    pub pollutant: Pollutant,
    pub period: AveragingPeriod,
    pub entry_count: usize,
    pub status: VerificationStatus,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VariantVerification {
    pub name: String,
    pub coefficient_count: usize,
    pub uniform_weighting: bool,
    pub status: VerificationStatus,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub enum VerificationStatus {
    Success,
    PartialSuccess,
    Failed,
}

fn status_for(errors: usize, warnings: usize) -> VerificationStatus {
    if errors > 0 {
        VerificationStatus::Failed
    } else if warnings > 0 {
        VerificationStatus::PartialSuccess
    } else {
        VerificationStatus::Success
    }
}

// ============================================================================
// Breakpoint tables
// ============================================================================

/// Checks one (pollutant, period) group. `entries` must be sorted by `index_low`.
pub fn verify_breakpoint_group(
    pollutant: Pollutant,
    period: AveragingPeriod,
    entries: &[BreakpointEntry],
) -> TableVerification {
    let mut issues = Vec::new();

    for e in entries {
        if !(e.index_low < e.index_high) {
            issues.push(format!(
                "index range {}–{} is not increasing",
                e.index_low, e.index_high
            ));
        }
        if !(e.conc_low < e.conc_high) {
            issues.push(format!(
                "concentration range {}–{} is not increasing",
                e.conc_low, e.conc_high
            ));
        }
        if e.index_low < 0.0 || e.index_high > 500.0 {
            issues.push(format!(
                "index range {}–{} leaves the 0–500 scale",
                e.index_low, e.index_high
            ));
        }
    }

    if let Some(first) = entries.first() {
        if entries.iter().any(|e| e.unit != first.unit) {
            issues.push("entries mix concentration units".to_string());
        }
    }

    for pair in entries.windows(2) {
        let (below, above) = (&pair[0], &pair[1]);
        if above.index_low <= below.index_high {
            issues.push(format!(
                "index ranges {}–{} and {}–{} overlap",
                below.index_low, below.index_high, above.index_low, above.index_high
            ));
        } else if above.index_low - below.index_high != 1.0 {
            issues.push(format!(
                "gap in index coverage between {} and {}",
                below.index_high, above.index_low
            ));
        }
        if above.conc_low <= below.conc_high {
            issues.push(format!(
                "concentration ranges {}–{} and {}–{} overlap",
                below.conc_low, below.conc_high, above.conc_low, above.conc_high
            ));
        }
    }

    TableVerification {
        pollutant,
        period,
        entry_count: entries.len(),
        status: status_for(issues.len(), 0),
        issues,
    }
}

// ============================================================================
// Full configuration
// ============================================================================

pub fn verify_config(config: &EngineConfig) -> VerificationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // --- Tables -------------------------------------------------------------

    let table = config.breakpoint_table();
    let mut tables = Vec::new();
    for ((pollutant, period), entries) in table.groups() {
        let result = verify_breakpoint_group(*pollutant, *period, entries);
        for issue in &result.issues {
            errors.push(format!("{} {}: {}", pollutant, period, issue));
        }
        tables.push(result);
    }

    for p in Pollutant::ALL {
        match table.default_period(p) {
            Some(period) => {
                if table.entries(p, period).is_err() {
                    errors.push(format!(
                        "{}: default period {} has no breakpoints",
                        p, period
                    ));
                }
            }
            None => warnings.push(format!("{}: no default averaging period", p)),
        }
    }

    // --- Variants -----------------------------------------------------------

    let units = config.unit_converter();
    let mut names = BTreeSet::new();
    let mut variants = Vec::new();
    for variant in &config.variants {
        let mut issues = Vec::new();
        let mut variant_warnings = 0;

        if !names.insert(variant.name.as_str()) {
            issues.push("duplicate variant name".to_string());
        }
        if !(variant.scale.is_finite() && variant.scale > 0.0) {
            issues.push(format!("scale {} must be positive", variant.scale));
        }
        if !(variant.floor.is_finite() && variant.floor >= 0.0) {
            issues.push(format!("floor {} must be non-negative", variant.floor));
        }
        if variant.coefficients.is_empty() {
            issues.push("no coefficients".to_string());
        }

        let mut seen = BTreeSet::new();
        for c in &variant.coefficients {
            if !seen.insert(c.pollutant) {
                issues.push(format!("{} listed twice", c.pollutant));
            }
            if !c.beta.is_finite() {
                issues.push(format!("{} coefficient is not finite", c.pollutant));
            }
            if let Err(e) = units.convert(1.0, c.pollutant.canonical_unit(), c.unit, c.pollutant) {
                issues.push(e.to_string());
            }
        }

        let uniform = variant.has_uniform_weighting();
        if !uniform {
            if variant.legacy {
                variant_warnings += 1;
                warnings.push(format!(
                    "variant {}: percent weighting differs across pollutants (legacy)",
                    variant.name
                ));
            } else {
                issues.push("percent weighting differs across pollutants".to_string());
            }
        }

        for issue in &issues {
            errors.push(format!("variant {}: {}", variant.name, issue));
        }
        variants.push(VariantVerification {
            name: variant.name.clone(),
            coefficient_count: variant.coefficients.len(),
            uniform_weighting: uniform,
            status: status_for(issues.len(), variant_warnings),
            issues,
        });
    }

    if !config.variants.is_empty() && !names.contains(config.default_variant.as_str()) {
        errors.push(format!(
            "default variant {} is not defined",
            config.default_variant
        ));
    }

    // --- Sources and settings -----------------------------------------------

    let mut tags = BTreeSet::new();
    for source in &config.sources {
        if !tags.insert(source.tag.as_str()) {
            errors.push(format!("source {} listed twice", source.tag));
        }
    }
    if !config.sources.is_empty() && !config.sources.iter().any(|s| s.role == SourceRole::Primary) {
        warnings.push("no primary source configured".to_string());
    }

    if config.window.hours <= 0 || config.window.hours > MAX_SETTING_HOURS {
        errors.push(format!(
            "window hours {} must be between 1 and {}",
            config.window.hours, MAX_SETTING_HOURS
        ));
    }
    if config.window.fallback_max_age_hours < 0
        || config.window.fallback_max_age_hours > MAX_SETTING_HOURS
    {
        errors.push(format!(
            "fallback_max_age_hours {} must be between 0 and {}",
            config.window.fallback_max_age_hours, MAX_SETTING_HOURS
        ));
    }
    if !(config.matching.max_distance_km.is_finite() && config.matching.max_distance_km >= 0.0) {
        errors.push(format!(
            "max_distance_km {} must be non-negative",
            config.matching.max_distance_km
        ));
    }
    if !(config.molar_volume_l.is_finite() && config.molar_volume_l > 0.0) {
        errors.push(format!("molar volume {} must be positive", config.molar_volume_l));
    }

    VerificationReport {
        timestamp: Utc::now().to_rfc3339(),
        tables,
        variants,
        errors,
        warnings,
    }
}

// ============================================================================
// Tests
// ============================================================================
