/// Monitoring point registry.
///
/// Points are created the first time a primary feed reports them and are
/// never removed. The only mutation after creation is the active flag:
/// decommissioned points are soft-deactivated so their history remains
/// addressable, and inactive points are skipped by nearest-point matching.

use std::collections::BTreeMap;

use crate::model::{Coordinates, MonitoringPoint};

#[derive(Debug, Clone, Default)]
pub struct PointRegistry {
    points: BTreeMap<String, MonitoringPoint>,
}

impl PointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a point on first observation. Later observations of the
    /// same id do not change its name or location.
    ///
    /// Returns `true` if the point was newly created.
    pub fn observe(&mut self, id: &str, name: &str, location: Coordinates) -> bool {
        if self.points.contains_key(id) {
            return false;
        }
        self.points.insert(
            id.to_string(),
            MonitoringPoint {
                id: id.to_string(),
                name: name.to_string(),
                location,
                active: true,
            },
        );
        tracing::info!(point_id = %id, name = %name, "registered monitoring point");
        true
    }

    /// Looks up a point by id. Returns `None` if not found.
    pub fn find(&self, id: &str) -> Option<&MonitoringPoint> {
        self.points.get(id)
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.find(id).map(|p| p.active).unwrap_or(false)
    }

    /// Returns `false` if the point is unknown.
    pub fn set_active(&mut self, id: &str, active: bool) -> bool {
        match self.points.get_mut(id) {
            Some(point) => {
                point.active = active;
                true
            }
            None => false,
        }
    }

    pub fn deactivate(&mut self, id: &str) -> bool {
        self.set_active(id, false)
    }

    pub fn active_points(&self) -> impl Iterator<Item = &MonitoringPoint> {
        self.points.values().filter(|p| p.active)
    }

    pub fn all_point_ids(&self) -> Vec<&str> {
        self.points.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
