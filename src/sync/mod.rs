//! Map/table synchronisation: one controller owns the dataset and pushes every
//! change to both views under a single propagation lock.

pub mod canvas;
pub mod controller;
pub mod guard;
pub mod views;

pub use canvas::{CanvasMap, CanvasShape, DrillGlyph, Projection};
pub use controller::{EditOutcome, ViewSynchronizer};
pub use guard::{PropagationGuard, PropagationLock};
pub use views::{
    DisabledTable, DrillMarker, Legend, MapScene, MapView, MarkerSpec, Popup, TableRow, TableView,
    TrackSpec, TRACK_COLOR,
};
