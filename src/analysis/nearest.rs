/// Nearest monitoring point matching for non-co-located feeds.
///
/// Gridded or model feeds report at a cell centre rather than at a
/// monitoring point. A reading is attached to the closest point only when
/// that point lies within the configured distance; otherwise it is dropped
/// for fusion purposes and never force-assigned.

use crate::model::{Coordinates, MonitoringPoint};

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Distances closer than this are treated as equal when breaking ties.
pub const TIE_TOLERANCE_KM: f64 = 1e-6;

/// Great-circle distance between two coordinates, in kilometres.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointMatch {
    pub point_id: String,
    pub distance_km: f64,
}

/// Returns the candidate nearest to `coord` if it is within `max_distance_km`.
///
/// Candidates within `TIE_TOLERANCE_KM` of the minimum distance count as
/// equidistant and resolve to the lexicographically smallest point id, so
/// the result does not depend on candidate order.
pub fn match_to_nearest_point<'a>(
    coord: Coordinates,
    candidates: impl IntoIterator<Item = &'a MonitoringPoint>,
    max_distance_km: f64,
) -> Option<PointMatch> {
    let scored: Vec<(&'a str, f64)> = candidates
        .into_iter()
        .map(|point| (point.id.as_str(), haversine_km(coord, point.location)))
        .filter(|(_, distance)| distance.is_finite())
        .collect();

    let nearest = scored
        .iter()
        .map(|(_, distance)| *distance)
        .fold(f64::INFINITY, f64::min);
    if nearest > max_distance_km {
        return None;
    }

    scored
        .into_iter()
        .filter(|(_, distance)| *distance <= nearest + TIE_TOLERANCE_KM)
        .min_by(|a, b| a.0.cmp(b.0))
        .map(|(id, distance)| PointMatch {
            point_id: id.to_string(),
            distance_km: distance,
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
