//! Drill-point annotation store. Keyed independently from survey readings and
//! never touched by dataset replacement.

use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::models::{DrillPoint, DrillPointId};

#[derive(Debug, Clone)]
pub struct DrillPointStore {
    points: Vec<DrillPoint>,
    next_id: u64,
}

impl Default for DrillPointStore {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            next_id: 1,
        }
    }
}

impl DrillPointStore {
    /// Rebuilds a store from persisted points. The counter resumes at
    /// `next_id`, or after the highest restored id if that is larger.
    pub fn restore(mut points: Vec<DrillPoint>, next_id: u64) -> Self {
        points.sort_by_key(|p| p.id);
        let after_last = points.last().map_or(1, |p| p.id.0 + 1);
        Self {
            points,
            next_id: next_id.max(after_last).max(1),
        }
    }

    pub fn add(&mut self, lat: f64, lon: f64, thickness: f64) -> Result<DrillPoint, ValidationError> {
        self.add_at(lat, lon, thickness, Utc::now())
    }

    pub fn add_at(
        &mut self,
        lat: f64,
        lon: f64,
        thickness: f64,
        created_at: DateTime<Utc>,
    ) -> Result<DrillPoint, ValidationError> {
        let point = self.propose_at(lat, lon, thickness, created_at)?;
        self.commit(point.clone());
        Ok(point)
    }

    /// Validates and builds the next point without storing it, so a caller
    /// can persist it before committing.
    pub fn propose(&self, lat: f64, lon: f64, thickness: f64) -> Result<DrillPoint, ValidationError> {
        self.propose_at(lat, lon, thickness, Utc::now())
    }

    fn propose_at(
        &self,
        lat: f64,
        lon: f64,
        thickness: f64,
        created_at: DateTime<Utc>,
    ) -> Result<DrillPoint, ValidationError> {
        validate(lat, lon, thickness)?;
        Ok(DrillPoint {
            id: DrillPointId(self.next_id),
            lat,
            lon,
            thickness,
            created_at,
        })
    }

    /// Stores a proposed point and moves the counter past its id.
    pub fn commit(&mut self, point: DrillPoint) {
        self.next_id = self.next_id.max(point.id.0 + 1);
        self.points.push(point);
    }

    pub fn remove(&mut self, id: DrillPointId) -> bool {
        let before = self.points.len();
        self.points.retain(|p| p.id != id);
        self.points.len() != before
    }

    /// Removes every point; the caller is responsible for confirming first.
    /// The id counter is not reset.
    pub fn clear(&mut self) -> usize {
        let removed = self.points.len();
        self.points.clear();
        removed
    }

    pub fn points(&self) -> &[DrillPoint] {
        &self.points
    }

    pub fn get(&self, id: DrillPointId) -> Option<&DrillPoint> {
        self.points.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }
}

/// Checks fields in order; the first failure wins.
fn validate(lat: f64, lon: f64, thickness: f64) -> Result<(), ValidationError> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(ValidationError::Latitude);
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(ValidationError::Longitude);
    }
    if !(thickness.is_finite() && thickness >= 0.0) {
        return Err(ValidationError::Thickness);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_validates_each_field() {
        let mut store = DrillPointStore::default();
        assert_eq!(store.add(91.0, 0.0, 1.0), Err(ValidationError::Latitude));
        assert_eq!(store.add(45.0, -181.0, 1.0), Err(ValidationError::Longitude));
        assert_eq!(store.add(45.0, 10.0, -0.5), Err(ValidationError::Thickness));
        assert_eq!(store.add(f64::NAN, 10.0, 1.0), Err(ValidationError::Latitude));
        assert_eq!(store.add(45.0, 10.0, f64::INFINITY), Err(ValidationError::Thickness));
        // First failure wins.
        assert_eq!(store.add(100.0, 500.0, -1.0), Err(ValidationError::Latitude));
        assert!(store.is_empty());
        assert_eq!(store.next_id(), 1);
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut store = DrillPointStore::default();
        let a = store.add(45.0, 10.0, 2.0).expect("valid point");
        let b = store.add(-90.0, 180.0, 0.0).expect("boundary values are valid");
        assert_eq!(a.id, DrillPointId(1));
        assert_eq!(b.id, DrillPointId(2));

        assert!(store.remove(b.id));
        assert!(!store.remove(b.id));
        let c = store.add(1.0, 1.0, 1.0).expect("valid point");
        assert_eq!(c.id, DrillPointId(3));

        assert_eq!(store.clear(), 2);
        assert!(store.is_empty());
        let d = store.add(1.0, 1.0, 1.0).expect("valid point");
        assert_eq!(d.id, DrillPointId(4));
        assert_eq!(d.id.to_string(), "d4");
    }

    #[test]
    fn test_propose_does_not_store_until_commit() {
        let mut store = DrillPointStore::default();
        assert_eq!(store.propose(0.0, 200.0, 1.0), Err(ValidationError::Longitude));

        let point = store.propose(45.0, 10.0, 1.0).expect("valid point");
        assert_eq!(point.id, DrillPointId(1));
        assert!(store.is_empty());
        assert_eq!(store.next_id(), 1);

        store.commit(point.clone());
        assert_eq!(store.points(), &[point]);
        assert_eq!(store.next_id(), 2);
    }

    #[test]
    fn test_restore_resumes_counter() {
        let mut previous = DrillPointStore::default();
        let kept = previous.add(10.0, 10.0, 1.0).expect("valid point");
        let dropped = previous.add(11.0, 11.0, 1.0).expect("valid point");
        previous.remove(dropped.id);

        let mut restored = DrillPointStore::restore(vec![kept.clone()], previous.next_id());
        assert_eq!(restored.get(kept.id), Some(&kept));
        let next = restored.add(12.0, 12.0, 1.0).expect("valid point");
        assert_eq!(next.id, DrillPointId(3));

        let from_points_only = DrillPointStore::restore(vec![kept], 0);
        assert_eq!(from_points_only.next_id(), 2);
    }
}
