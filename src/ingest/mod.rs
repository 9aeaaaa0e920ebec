/// Feed ingestion.
///
/// Feed adapters (outside this crate) hand over `RawReading`s. This module
/// turns them into normalized `Reading`s ready for the window log:
///
///   raw index  → breakpoint reverse interpolation → native unit
///   any unit   → canonical unit per pollutant
///   coordinate → nearest active monitoring point (or dropped)
///
/// Submodules:
/// - `normalize`: the `Ingestor` doing the steps above.

pub mod normalize;

pub use normalize::{DropReason, IngestOutcome, Ingestor};
