use std::path::{Path, PathBuf};
use std::sync::{Arc, MutexGuard};

use crate::{
    drill::DrillPointStore,
    error::SyncError,
    export,
    models::{CellValue, DrillPoint, DrillPointId, FeatureCollection, Reading, ReadingField, RowId},
    scale::{Gradient, Scale, ScaleEngine},
    survey::{
        coerce::coerce,
        height::{apply_instrument_height, edit_thickness},
        InstrumentHeight, SurveyDataset,
    },
};

use super::guard::PropagationLock;
use super::views::{
    DrillMarker, Legend, MapScene, MapView, MarkerSpec, Popup, TableRow, TableView, TrackSpec,
    TRACK_COLOR,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Result of a table edit notification.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    /// Stored; carries the normalised value.
    Applied(CellValue),
    /// Raised from inside our own propagation; the notification was dropped.
    Dropped,
    UnknownRow,
    UnknownField,
    ReadOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SelectionOrigin {
    Table,
    Map,
}

struct SyncState {
    dataset: Option<SurveyDataset>,
    height: InstrumentHeight,
    scale: ScaleEngine,
    selected: Option<RowId>,
    drill: DrillPointStore,
    table: Box<dyn TableView>,
    map: Box<dyn MapView>,
    table_ready: bool,
    table_stale: bool,
}

/// Keeps the survey dataset, the map overlay and the table consistent.
///
/// Cloning yields another handle onto the same state. Every operation that
/// writes to a view runs under a single propagation lock. Notifications that
/// a view raises on the propagating thread (the view reacting to our own
/// writes) are dropped rather than queued; calls from other threads wait.
#[derive(Clone)]
pub struct ViewSynchronizer {
    state: Arc<PropagationLock<SyncState>>,
}

impl ViewSynchronizer {
    pub fn new(
        table: Box<dyn TableView>,
        map: Box<dyn MapView>,
        height: InstrumentHeight,
        drill: DrillPointStore,
    ) -> Self {
        Self {
            state: Arc::new(PropagationLock::new(SyncState {
                dataset: None,
                height,
                scale: ScaleEngine::new(Gradient::default()),
                selected: None,
                drill,
                table,
                map,
                table_ready: false,
                table_stale: false,
            })),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SyncState> {
        self.state.read()
    }

    /// Runs `op` with exclusive access to the state and the views, or returns
    /// `None` if this thread is already propagating.
    fn propagate<R>(&self, what: &str, op: impl FnOnce(&mut SyncState) -> R) -> Option<R> {
        let Some(mut state) = self.state.enter() else {
            log_debug!("{} dropped: raised during view propagation", what);
            return None;
        };
        Some(op(&mut *state))
    }

    // ---- dataset lifecycle -------------------------------------------------

    /// Replaces the dataset with a freshly ingested survey and redraws both
    /// views, fitting the map to the survey. Returns the number of readings,
    /// or `None` if the call was dropped.
    pub fn load_dataset(&self, collection: &FeatureCollection, height: InstrumentHeight) -> Option<usize> {
        self.propagate("load_dataset", |state| {
            let dataset = SurveyDataset::ingest(collection, height);
            let count = dataset.len();
            state.scale.recompute(dataset.conductivities());
            state.dataset = Some(dataset);
            state.height = height;
            state.selected = None;
            render_map(state, true);
            refresh_table(state);
            count
        })
    }

    /// Recomputes every displayed thickness for a new instrument height and
    /// redraws without moving the map viewport.
    pub fn apply_instrument_height(&self, height: InstrumentHeight) -> bool {
        self.propagate("apply_instrument_height", |state| {
            state.height = height;
            let Some(dataset) = state.dataset.as_mut() else {
                return false;
            };
            apply_instrument_height(dataset.readings_mut(), height);
            log_info!("instrument height set to {} m", height.meters());
            render_map(state, false);
            refresh_table(state);
            true
        })
        .unwrap_or(false)
    }

    pub fn instrument_height(&self) -> InstrumentHeight {
        self.lock_state().height
    }

    // ---- table notifications -----------------------------------------------

    /// A cell was edited in the table. The value is coerced, written back to the
    /// table when normalisation changed it, stored in the dataset and pushed to
    /// the reading's map marker.
    pub fn on_cell_edited(&self, row_id: &RowId, field: &str, raw: CellValue) -> EditOutcome {
        self.propagate("on_cell_edited", |state| {
            let Some(reading) = state.dataset.as_mut().and_then(|d| d.get_mut(row_id)) else {
                return EditOutcome::UnknownRow;
            };
            let Ok(field) = field.parse::<ReadingField>() else {
                return EditOutcome::UnknownField;
            };
            if !field.is_editable() {
                return EditOutcome::ReadOnly;
            }

            let value = coerce(field, &raw);
            if value != raw {
                state.table.set_cell_value(row_id, field, &value);
            }

            if field == ReadingField::Thickness {
                edit_thickness(reading, value.as_number(), state.height);
            } else {
                reading.store(field, value.clone());
            }

            let marker = marker_for(reading, &state.scale);
            state.map.update_marker(&marker);
            EditOutcome::Applied(value)
        })
        .unwrap_or(EditOutcome::Dropped)
    }

    /// A row was selected in the table.
    pub fn on_row_selected(&self, row_id: &RowId) -> bool {
        self.select(row_id, SelectionOrigin::Table)
    }

    /// A reading marker was clicked on the map.
    pub fn on_marker_clicked(&self, row_id: &RowId) -> bool {
        self.select(row_id, SelectionOrigin::Map)
    }

    /// The table widget finished building. Flushes rows that were held back
    /// while it was not ready.
    pub fn on_table_ready(&self) {
        self.propagate("on_table_ready", |state| {
            state.table_ready = true;
            if state.table_stale {
                refresh_table(state);
            }
        });
    }

    fn select(&self, row_id: &RowId, origin: SelectionOrigin) -> bool {
        self.propagate("select", |state| {
            let known = state
                .dataset
                .as_ref()
                .is_some_and(|d| d.index().contains(row_id));
            if !known {
                return false;
            }
            state.selected = Some(row_id.clone());
            if state.table_ready {
                state.table.deselect_all();
                state.table.select_row(row_id, origin == SelectionOrigin::Map);
            }
            state.map.open_popup(row_id);
            true
        })
        .unwrap_or(false)
    }

    pub fn selected_row(&self) -> Option<RowId> {
        self.lock_state().selected.clone()
    }

    // ---- deletion ----------------------------------------------------------

    /// Removes a reading from the dataset, the index, the map, the table and
    /// the selection. `false` if there was nothing to remove.
    pub fn delete_reading(&self, row_id: &RowId) -> bool {
        self.propagate("delete_reading", |state| delete_in(state, row_id))
            .unwrap_or(false)
    }

    /// Deletes the selected reading, if any. Confirmation is up to the caller.
    pub fn delete_selected(&self) -> Option<RowId> {
        self.propagate("delete_selected", |state| {
            let row_id = state.selected.clone()?;
            delete_in(state, &row_id).then_some(row_id)
        })
        .flatten()
    }

    // ---- colour scale ------------------------------------------------------

    pub fn scale(&self) -> Scale {
        self.lock_state().scale.current()
    }

    pub fn is_manual_scale(&self) -> bool {
        self.lock_state().scale.is_manual()
    }

    /// Overrides the automatic scale. Invalid bounds leave the scale as it was.
    pub fn set_manual_scale(&self, min: f64, max: f64) -> Result<Scale, SyncError> {
        self.propagate("set_manual_scale", |state| {
            let scale = state.scale.set_manual(min, max)?;
            render_map(state, false);
            Ok(scale)
        })
        .unwrap_or(Err(SyncError::Busy))
    }

    pub fn reset_scale(&self) -> Option<Scale> {
        self.propagate("reset_scale", |state| {
            let scale = state.scale.reset();
            render_map(state, false);
            scale
        })
    }

    // ---- drill points ------------------------------------------------------

    pub fn add_drill_point(&self, lat: f64, lon: f64, thickness: f64) -> Result<DrillPoint, SyncError> {
        self.propagate("add_drill_point", |state| {
            let point = state.drill.add(lat, lon, thickness)?;
            render_drill_points(state);
            Ok(point)
        })
        .unwrap_or(Err(SyncError::Busy))
    }

    /// Validates a drill point and assigns it the next id without storing it.
    pub fn propose_drill_point(&self, lat: f64, lon: f64, thickness: f64) -> Result<DrillPoint, SyncError> {
        Ok(self.lock_state().drill.propose(lat, lon, thickness)?)
    }

    /// Stores a point from `propose_drill_point` once it has been persisted.
    pub fn commit_drill_point(&self, point: DrillPoint) -> bool {
        self.propagate("commit_drill_point", |state| {
            state.drill.commit(point);
            render_drill_points(state);
        })
        .is_some()
    }

    pub fn remove_drill_point(&self, id: DrillPointId) -> bool {
        self.propagate("remove_drill_point", |state| {
            let removed = state.drill.remove(id);
            if removed {
                render_drill_points(state);
            }
            removed
        })
        .unwrap_or(false)
    }

    /// Clears all drill points and their markers. The caller confirms first.
    pub fn clear_drill_points(&self) -> usize {
        self.propagate("clear_drill_points", |state| {
            let removed = state.drill.clear();
            render_drill_points(state);
            removed
        })
        .unwrap_or(0)
    }

    /// Redraws the drill-point layer, e.g. after restoring persisted points.
    pub fn refresh_drill_points(&self) {
        self.propagate("refresh_drill_points", render_drill_points);
    }

    pub fn drill_points(&self) -> Vec<DrillPoint> {
        self.lock_state().drill.points().to_vec()
    }

    // ---- read access -------------------------------------------------------

    pub fn reading(&self, row_id: &RowId) -> Option<Reading> {
        self.lock_state()
            .dataset
            .as_ref()
            .and_then(|d| d.get(row_id))
            .cloned()
    }

    pub fn reading_count(&self) -> usize {
        self.lock_state().dataset.as_ref().map_or(0, |d| d.index().len())
    }

    pub fn has_dataset(&self) -> bool {
        self.lock_state().dataset.is_some()
    }

    /// CSV of the current readings; `None` before the first upload.
    pub fn export_csv(&self) -> anyhow::Result<Option<String>> {
        let state = self.lock_state();
        state
            .dataset
            .as_ref()
            .map(|d| export::to_csv_string(d.readings()))
            .transpose()
    }

    /// Writes `em31_points.csv` into `dir`; `None` before the first upload.
    pub fn export_to_dir(&self, dir: &Path) -> anyhow::Result<Option<PathBuf>> {
        let state = self.lock_state();
        state
            .dataset
            .as_ref()
            .map(|d| export::export_to_dir(d.readings(), dir))
            .transpose()
    }

    /// Writes the CSV to `path`; `false` before the first upload.
    pub fn export_to_file(&self, path: &Path) -> anyhow::Result<bool> {
        let state = self.lock_state();
        let Some(dataset) = state.dataset.as_ref() else {
            return Ok(false);
        };
        export::export_to_file(dataset.readings(), path)?;
        Ok(true)
    }
}

fn delete_in(state: &mut SyncState, row_id: &RowId) -> bool {
    let removed = state
        .dataset
        .as_mut()
        .is_some_and(|d| d.remove(row_id));
    if !removed {
        return false;
    }
    state.map.remove_marker(row_id);
    if state.table_ready {
        state.table.remove_row(row_id);
    }
    if state.selected.as_ref() == Some(row_id) {
        state.selected = None;
    }
    log_info!("deleted reading {}", row_id);
    true
}

fn marker_for(reading: &Reading, scale: &ScaleEngine) -> MarkerSpec {
    MarkerSpec {
        row_id: reading.row_id.clone(),
        position: reading.position,
        color: scale.color_for(reading.conductivity),
        popup: Popup::for_reading(reading),
    }
}

fn render_map(state: &mut SyncState, fit: bool) {
    let scene = match state.dataset.as_ref() {
        Some(dataset) => MapScene {
            markers: dataset
                .readings()
                .iter()
                .map(|r| marker_for(r, &state.scale))
                .collect(),
            tracks: dataset
                .tracks()
                .iter()
                .map(|t| TrackSpec {
                    path: t.path.clone(),
                    color: TRACK_COLOR,
                })
                .collect(),
            extent: dataset.extent(),
        },
        None => MapScene::default(),
    };

    state.map.render(&scene);
    if fit {
        if let Some(extent) = scene.extent {
            state.map.fit_bounds(&extent);
        }
    }
    state.map.set_legend(&Legend::from(state.scale.current()));
}

/// Pushes all rows to the table and re-applies the selection, or marks the
/// table stale until it reports ready.
fn refresh_table(state: &mut SyncState) {
    if !state.table_ready {
        state.table_stale = true;
        log_warn!("table not ready; deferring row refresh");
        return;
    }
    let rows: Vec<TableRow> = state
        .dataset
        .as_ref()
        .map(|d| d.readings().iter().map(TableRow::from).collect())
        .unwrap_or_default();
    state.table.replace_rows(rows);
    state.table_stale = false;

    if let Some(selected) = state.selected.clone() {
        state.table.deselect_all();
        state.table.select_row(&selected, false);
    }
}

fn render_drill_points(state: &mut SyncState) {
    let markers: Vec<DrillMarker> = state.drill.points().iter().map(DrillMarker::from).collect();
    state.map.render_drill_points(&markers);
}
