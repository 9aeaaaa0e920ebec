//! Breakpoint tables.
//!
//! A breakpoint pairs a categorical index range with the concentration
//! range it was published against. Tables are static configuration loaded
//! once at startup and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ConfigError;
use crate::model::{AveragingPeriod, Pollutant, Unit};

/// One published (index range ↔ concentration range) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakpointEntry {
    pub pollutant: Pollutant,
    pub period: AveragingPeriod,
    pub index_low: f64,
    pub index_high: f64,
    pub conc_low: f64,
    pub conc_high: f64,
    /// Unit the concentration bounds are published in.
    pub unit: Unit,
}

impl BreakpointEntry {
    pub fn contains_index(&self, index: f64) -> bool {
        self.index_low <= index && index <= self.index_high
    }

    pub fn contains_concentration(&self, conc: f64) -> bool {
        self.conc_low <= conc && conc <= self.conc_high
    }
}

/// All breakpoints, grouped per (pollutant, period) and sorted by `index_low`,
/// plus the period used when a caller does not name one.
#[derive(Debug, Clone, Default)]
pub struct BreakpointTable {
    entries: BTreeMap<(Pollutant, AveragingPeriod), Vec<BreakpointEntry>>,
    default_periods: BTreeMap<Pollutant, AveragingPeriod>,
}

impl BreakpointTable {
    pub fn new(
        entries: Vec<BreakpointEntry>,
        default_periods: BTreeMap<Pollutant, AveragingPeriod>,
    ) -> Self {
        let mut grouped: BTreeMap<_, Vec<BreakpointEntry>> = BTreeMap::new();
        for entry in entries {
            grouped
                .entry((entry.pollutant, entry.period))
                .or_default()
                .push(entry);
        }
        for list in grouped.values_mut() {
            list.sort_by(|a, b| a.index_low.total_cmp(&b.index_low));
        }
        Self {
            entries: grouped,
            default_periods,
        }
    }

    /// Entries for a pollutant and period, sorted ascending.
    ///
    /// Asking for a combination with no entries is a configuration error.
    pub fn entries(
        &self,
        pollutant: Pollutant,
        period: AveragingPeriod,
    ) -> Result<&[BreakpointEntry], ConfigError> {
        self.entries
            .get(&(pollutant, period))
            .map(Vec::as_slice)
            .filter(|list| !list.is_empty())
            .ok_or(ConfigError::MissingBreakpoints { pollutant, period })
    }

    pub fn default_period(&self, pollutant: Pollutant) -> Option<AveragingPeriod> {
        self.default_periods.get(&pollutant).copied()
    }

    /// Every (pollutant, period) group, for verification.
    pub fn groups(&self) -> impl Iterator<Item = (&(Pollutant, AveragingPeriod), &Vec<BreakpointEntry>)> {
        self.entries.iter()
    }

    pub fn default_periods(&self) -> &BTreeMap<Pollutant, AveragingPeriod> {
        &self.default_periods
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
