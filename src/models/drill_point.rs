//! User-placed drill annotations. Independent of survey readings.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrillPointId(pub u64);

impl fmt::Display for DrillPointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrillPoint {
    pub id: DrillPointId,
    pub lat: f64,
    pub lon: f64,
    /// Measured ice thickness at the hole, metres.
    pub thickness: f64,
    pub created_at: DateTime<Utc>,
}
