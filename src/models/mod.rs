pub mod drill_point;
pub mod payload;
pub mod reading;

pub use drill_point::{DrillPoint, DrillPointId};
pub use payload::{Feature, FeatureCollection, LineSummary, SurveyHeader, UploadResponse};
pub use reading::{Bounds, CellValue, LatLon, Reading, ReadingField, RowId, Track};
