//! Categorical index ↔ concentration interpolation.
//!
//! The reverse direction (index → concentration) is what the ingest path
//! needs for feeds that only publish AQI-style sub-indices. The forward
//! direction is the standard published AQI formula and is kept for
//! displaying a sub-index next to concentration-only feeds.

use std::sync::Arc;

use crate::convert::breakpoints::{BreakpointEntry, BreakpointTable};
use crate::error::ConfigError;
use crate::model::{AveragingPeriod, Measured, Pollutant};

/// Round to two decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone)]
pub struct IndexConverter {
    table: Arc<BreakpointTable>,
}

impl IndexConverter {
    pub fn new(table: Arc<BreakpointTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &BreakpointTable {
        &self.table
    }

    /// The period used when a caller does not name one.
    pub fn default_period(&self, pollutant: Pollutant) -> Result<AveragingPeriod, ConfigError> {
        self.table.default_period(pollutant).ok_or_else(|| {
            ConfigError::InvalidTable(format!("no default averaging period for {}", pollutant))
        })
    }

    /// Reverse-interpolates `index` into a concentration in the table's
    /// native unit for `pollutant`, rounded to two decimals.
    ///
    /// Returns `Ok(None)` when the index lies outside every entry; the
    /// converter never extrapolates. Asking for a pollutant/period with no
    /// breakpoints is a configuration error.
    pub fn index_to_concentration(
        &self,
        index: f64,
        pollutant: Pollutant,
        period: AveragingPeriod,
    ) -> Result<Option<f64>, ConfigError> {
        Ok(self
            .index_to_measured(index, pollutant, period)?
            .map(|m| m.value))
    }

    /// Same as `index_to_concentration`, keeping the native unit alongside the value.
    pub fn index_to_measured(
        &self,
        index: f64,
        pollutant: Pollutant,
        period: AveragingPeriod,
    ) -> Result<Option<Measured>, ConfigError> {
        let entries = self.table.entries(pollutant, period)?;
        let unit = entries[0].unit;
        Ok(lookup(entries, index, |e| (e.index_low, e.index_high), |e| {
            (e.conc_low, e.conc_high)
        })
        .map(|conc| Measured::new(round2(conc), unit)))
    }

    pub fn index_to_concentration_default(
        &self,
        index: f64,
        pollutant: Pollutant,
    ) -> Result<Option<f64>, ConfigError> {
        let period = self.default_period(pollutant)?;
        self.index_to_concentration(index, pollutant, period)
    }

    /// Forward AQI formula: concentration (in the table's native unit) → integer index.
    ///
    /// Returns `Ok(None)` for concentrations outside the published table.
    pub fn concentration_to_index(
        &self,
        concentration: f64,
        pollutant: Pollutant,
        period: AveragingPeriod,
    ) -> Result<Option<u32>, ConfigError> {
        let entries = self.table.entries(pollutant, period)?;
        Ok(lookup(entries, concentration, |e| (e.conc_low, e.conc_high), |e| {
            (e.index_low, e.index_high)
        })
        .map(|index| index.round() as u32))
    }
}

/// Finds the entry whose `from` range holds `x` and interpolates into its
/// `to` range.
///
/// Published tables are contiguous on integer (or table-precision) steps,
/// so a fractional `x` can fall between two entries, e.g. index 50.5
/// between 0–50 and 51–100. Such values snap to the nearer boundary; ties
/// go to the lower entry.
fn lookup(
    entries: &[BreakpointEntry],
    x: f64,
    from: impl Fn(&BreakpointEntry) -> (f64, f64),
    to: impl Fn(&BreakpointEntry) -> (f64, f64),
) -> Option<f64> {
    if !x.is_finite() {
        return None;
    }
    let first = entries.first()?;
    let last = entries.last()?;
    if x < from(first).0 || x > from(last).1 {
        return None;
    }

    for entry in entries {
        let (lo, hi) = from(entry);
        if lo <= x && x <= hi {
            let (out_lo, out_hi) = to(entry);
            return Some(((x - lo) / (hi - lo)) * (out_hi - out_lo) + out_lo);
        }
    }

    entries.windows(2).find_map(|pair| {
        let (_, below_hi) = from(&pair[0]);
        let (above_lo, _) = from(&pair[1]);
        if below_hi < x && x < above_lo {
            if x - below_hi <= above_lo - x {
                Some(to(&pair[0]).1)
            } else {
                Some(to(&pair[1]).0)
            }
        } else {
            None
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
