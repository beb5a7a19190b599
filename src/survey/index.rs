use std::collections::HashMap;

use crate::models::{Reading, RowId};

/// Row id to position in the dataset's reading list. Owned by `SurveyDataset`,
/// which keeps it in lockstep with every removal.
#[derive(Debug, Clone, Default)]
pub struct ReadingIndex {
    positions: HashMap<RowId, usize>,
}

impl ReadingIndex {
    pub fn build(readings: &[Reading]) -> Self {
        let positions = readings
            .iter()
            .enumerate()
            .map(|(pos, reading)| (reading.row_id.clone(), pos))
            .collect();
        Self { positions }
    }

    pub fn position(&self, row_id: &RowId) -> Option<usize> {
        self.positions.get(row_id).copied()
    }

    pub fn contains(&self, row_id: &RowId) -> bool {
        self.positions.contains_key(row_id)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Drops `row_id` and shifts the positions behind it down by one, matching a
    /// `Vec::remove` on the reading list.
    pub(crate) fn remove(&mut self, row_id: &RowId) -> Option<usize> {
        let removed = self.positions.remove(row_id)?;
        for pos in self.positions.values_mut() {
            if *pos > removed {
                *pos -= 1;
            }
        }
        Some(removed)
    }

    pub(crate) fn insert(&mut self, row_id: RowId, position: usize) {
        self.positions.insert(row_id, position);
    }
}
