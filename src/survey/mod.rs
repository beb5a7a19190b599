pub mod coerce;
pub mod dataset;
pub mod height;
pub mod index;

pub use dataset::SurveyDataset;
pub use height::{apply_instrument_height, HeightResolution, InstrumentHeight};
pub use index::ReadingIndex;
