//! Core of the EM31 survey viewer: the uploaded survey dataset, instrument
//! height recalculation, the conductivity colour scale, drill-point
//! annotations, and the synchronizer that keeps the map and table views
//! consistent with the data.

pub mod backend;
pub mod commands;
pub mod db;
pub mod drill;
pub mod error;
pub mod export;
pub mod models;
pub mod scale;
pub mod settings;
pub mod survey;
pub mod sync;
pub mod upload;
pub mod utils;

pub use backend::BackendClient;
pub use commands::AppState;
pub use drill::DrillPointStore;
pub use error::{SyncError, ValidationError};
pub use scale::{Scale, ScaleEngine};
pub use survey::{InstrumentHeight, SurveyDataset};
pub use sync::{EditOutcome, ViewSynchronizer};
pub use upload::{UploadController, UploadStatus};
