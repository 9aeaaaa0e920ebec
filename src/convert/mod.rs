/// Index and unit conversion.
///
/// Submodules:
/// - `breakpoints`: static (index range ↔ concentration range) tables.
/// - `index`: reverse and forward interpolation over those tables.
/// - `units`: molecular-weight scaling between molar and mass units.

pub mod breakpoints;
pub mod index;
pub mod units;
