/// Fusion and analysis over normalized readings.
///
/// Submodules:
/// - `nearest`: great-circle matching of supplemental coordinates to points.
/// - `window`: per-point reading log and the rolling-window merge.
/// - `quality`: confidence tier of a window.
/// - `staleness`: age checks for the single-reading fallback.

pub mod nearest;
pub mod quality;
pub mod staleness;
pub mod window;
