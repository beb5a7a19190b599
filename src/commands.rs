//! User-facing commands. Each returns `Result<_, String>` so a front end can
//! show the error text as is.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::backend::BackendClient;
use crate::db::Database;
use crate::drill::DrillPointStore;
use crate::error::SyncError;
use crate::models::{CellValue, DrillPoint, DrillPointId, RowId};
use crate::scale::Scale;
use crate::settings::SettingsStore;
use crate::survey::{coerce::parse_decimal, InstrumentHeight};
use crate::sync::{EditOutcome, MapView, TableView, ViewSynchronizer};
use crate::upload::{SurveySummary, UploadController};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const DATABASE_FILE_NAME: &str = "em31view.sqlite3";

pub struct AppState {
    pub sync: ViewSynchronizer,
    pub uploads: UploadController,
    pub db: Database,
    pub settings: SettingsStore,
}

impl AppState {
    /// Opens settings and the annotation database under `data_dir`, restores
    /// the drill points and wires the synchronizer to the given views.
    pub async fn open(data_dir: &Path, table: Box<dyn TableView>, map: Box<dyn MapView>) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;
        let settings = SettingsStore::new(data_dir.join(SETTINGS_FILE_NAME));
        let db = Database::new(data_dir.join(DATABASE_FILE_NAME))?;

        let (points, next_id) = db.load_drill_points().await?;
        log_info!("restored {} drill points", points.len());
        let drill = DrillPointStore::restore(points, next_id);

        let sync = ViewSynchronizer::new(table, map, settings.default_instrument_height(), drill);
        sync.refresh_drill_points();
        let client = BackendClient::new(settings.backend_url())?;
        let uploads = UploadController::new(client, sync.clone());

        Ok(Self {
            sync,
            uploads,
            db,
            settings,
        })
    }

    /// Parses a height, substituting the configured default when invalid.
    fn resolve_height(&self, raw: &str) -> (InstrumentHeight, Option<String>) {
        let fallback = self.settings.default_instrument_height();
        let resolution = InstrumentHeight::resolve(raw, fallback);
        let notice = resolution.rejected.map(|err| {
            log_warn!("{err}; using {} m", fallback.meters());
            format!("{err}. Using default {} m.", fallback.meters())
        });
        (resolution.height, notice)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    /// `None` when a newer upload replaced this one.
    pub summary: Option<SurveySummary>,
    pub instrument_height: f64,
    /// Set when the height input was rejected and the default substituted.
    pub notice: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeightReport {
    pub instrument_height: f64,
    pub notice: Option<String>,
}

pub async fn upload_survey(state: &AppState, path: &Path, inst_height: &str) -> Result<UploadReport, String> {
    let (height, notice) = state.resolve_height(inst_height);
    let summary = state
        .uploads
        .upload_file(path, height)
        .await
        .map_err(|e| e.to_string())?;
    Ok(UploadReport {
        summary,
        instrument_height: height.meters(),
        notice,
    })
}

pub fn apply_instrument_height(state: &AppState, raw: &str) -> Result<HeightReport, String> {
    let (height, notice) = state.resolve_height(raw);
    state.sync.apply_instrument_height(height);
    Ok(HeightReport {
        instrument_height: height.meters(),
        notice,
    })
}

pub fn reset_instrument_height(state: &AppState) -> Result<HeightReport, String> {
    let height = state.settings.default_instrument_height();
    state.sync.apply_instrument_height(height);
    Ok(HeightReport {
        instrument_height: height.meters(),
        notice: None,
    })
}

pub fn set_default_instrument_height(state: &AppState, raw: &str) -> Result<f64, String> {
    state
        .settings
        .update_default_instrument_height(raw)
        .map(InstrumentHeight::meters)
        .map_err(|e| e.to_string())
}

/// Manual scale from the two text inputs.
pub fn set_scale(state: &AppState, min: &str, max: &str) -> Result<Scale, String> {
    let min = parse_decimal(min).unwrap_or(f64::NAN);
    let max = parse_decimal(max).unwrap_or(f64::NAN);
    state.sync.set_manual_scale(min, max).map_err(|e| e.to_string())
}

pub fn reset_scale(state: &AppState) -> Result<Scale, String> {
    state
        .sync
        .reset_scale()
        .ok_or_else(|| "a view update is already in progress".to_string())
}

pub fn edit_cell(state: &AppState, row_id: &str, field: &str, value: CellValue) -> Result<EditOutcome, String> {
    Ok(state.sync.on_cell_edited(&RowId::from(row_id), field, value))
}

pub fn select_row(state: &AppState, row_id: &str) -> Result<bool, String> {
    Ok(state.sync.on_row_selected(&RowId::from(row_id)))
}

/// Deletes the selected reading. The front end asks for confirmation first.
pub fn delete_selected(state: &AppState) -> Result<Option<String>, String> {
    Ok(state.sync.delete_selected().map(|id| id.to_string()))
}

/// Persists the point before it becomes visible, so a failed write never
/// leaves an id in memory that the database would hand out again.
pub async fn add_drill_point(state: &AppState, lat: f64, lon: f64, thickness: f64) -> Result<DrillPoint, String> {
    let point = state
        .sync
        .propose_drill_point(lat, lon, thickness)
        .map_err(|e| e.to_string())?;
    state.db.insert_drill_point(&point).await.map_err(|err| {
        log_error!("failed to persist drill point {}: {err:?}", point.id);
        format!("failed to save drill point: {err}")
    })?;
    if !state.sync.commit_drill_point(point.clone()) {
        return Err(SyncError::Busy.to_string());
    }
    Ok(point)
}

pub async fn remove_drill_point(state: &AppState, id: u64) -> Result<bool, String> {
    let id = DrillPointId(id);
    if !state.sync.drill_points().iter().any(|p| p.id == id) {
        return Ok(false);
    }
    state.db.delete_drill_point(id).await.map_err(|err| {
        log_error!("failed to delete drill point {id} from storage: {err:?}");
        format!("failed to delete drill point: {err}")
    })?;
    Ok(state.sync.remove_drill_point(id))
}

/// Bulk clear; refused unless the user confirmed. Storage is cleared first so
/// a failure leaves the points on screen.
pub async fn clear_drill_points(state: &AppState, confirmed: bool) -> Result<usize, String> {
    if !confirmed {
        return Err("clearing drill points requires confirmation".into());
    }
    state.db.clear_drill_points().await.map_err(|err| {
        log_error!("failed to clear stored drill points: {err:?}");
        format!("failed to clear drill points: {err}")
    })?;
    Ok(state.sync.clear_drill_points())
}

pub fn export_csv(state: &AppState, dir: &Path) -> Result<PathBuf, String> {
    state
        .sync
        .export_to_dir(dir)
        .map_err(|e| format!("{e:#}"))?
        .ok_or_else(|| "no survey loaded".to_string())
}

pub fn tile_url(state: &AppState, z: u32, x: u32, y: u32) -> Result<String, String> {
    let template = state.settings.snapshot().tile_url_template;
    let client = BackendClient::new(state.settings.backend_url()).map_err(|e| e.to_string())?;
    Ok(client.tile_url(&template, z, x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{CanvasMap, DisabledTable};

    async fn open(dir: &tempfile::TempDir) -> AppState {
        AppState::open(dir.path(), Box::new(DisabledTable), Box::new(CanvasMap::new(800, 500)))
            .await
            .expect("state opens")
    }

    #[tokio::test]
    async fn test_invalid_height_falls_back_to_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = open(&dir).await;

        let report = apply_instrument_height(&state, "-2").expect("never fails");
        assert_eq!(report.instrument_height, 0.15);
        assert_eq!(
            report.notice.as_deref(),
            Some("instrument height must be a number >= 0 (got '-2'). Using default 0.15 m.")
        );

        let report = apply_instrument_height(&state, "0,25").expect("never fails");
        assert_eq!(report.instrument_height, 0.25);
        assert!(report.notice.is_none());
        assert_eq!(state.sync.instrument_height().meters(), 0.25);

        let report = reset_instrument_height(&state).expect("never fails");
        assert_eq!(report.instrument_height, 0.15);
    }

    #[tokio::test]
    async fn test_scale_inputs_are_validated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = open(&dir).await;

        let err = set_scale(&state, "abc", "10").expect_err("non-numeric min");
        assert_eq!(err, "invalid scale values: min and max must be numbers with min < max");
        assert!(set_scale(&state, "5", "5").is_err());
        assert_eq!(set_scale(&state, "1,5", "20").expect("valid"), Scale { min: 1.5, max: 20.0 });
        assert!(state.sync.is_manual_scale());
        reset_scale(&state).expect("reset");
        assert!(!state.sync.is_manual_scale());
    }

    #[tokio::test]
    async fn test_drill_points_persist_across_restarts() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let state = open(&dir).await;
            let err = add_drill_point(&state, 0.0, 200.0, 1.0).await.expect_err("bad lon");
            assert_eq!(err, "longitude must be between -180 and 180");
            add_drill_point(&state, 45.0, 10.0, 2.0).await.expect("valid");
            let second = add_drill_point(&state, 46.0, 11.0, 3.0).await.expect("valid");
            assert!(remove_drill_point(&state, second.id.0).await.expect("remove"));
        }

        let state = open(&dir).await;
        assert_eq!(state.sync.drill_points().len(), 1);
        let third = add_drill_point(&state, 47.0, 12.0, 1.0).await.expect("valid");
        assert_eq!(third.id, DrillPointId(3));

        assert!(clear_drill_points(&state, false).await.is_err());
        assert_eq!(state.sync.drill_points().len(), 2);
        assert_eq!(clear_drill_points(&state, true).await.expect("clear"), 2);
        assert!(state.sync.drill_points().is_empty());
    }

    #[tokio::test]
    async fn test_failed_storage_leaves_drill_points_unchanged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = open(&dir).await;
        let kept = add_drill_point(&state, 45.0, 10.0, 2.0).await.expect("valid");

        state
            .db
            .execute(|conn| {
                conn.execute_batch("DROP TABLE drill_points")?;
                Ok(())
            })
            .await
            .expect("drop table");

        let err = add_drill_point(&state, 46.0, 11.0, 1.0).await.expect_err("insert fails");
        assert!(err.starts_with("failed to save drill point"), "{err}");
        assert_eq!(state.sync.drill_points(), vec![kept.clone()]);

        let err = clear_drill_points(&state, true).await.expect_err("clear fails");
        assert!(err.starts_with("failed to clear drill points"), "{err}");
        assert_eq!(state.sync.drill_points(), vec![kept]);
    }

    #[tokio::test]
    async fn test_export_writes_into_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = open(&dir).await;
        let payload = serde_json::json!({
            "features": [{
                "geometry": {"type": "Point", "coordinates": [4.35, 50.85]},
                "properties": {"kind": "reading", "conductivity": 8.0}
            }]
        });
        let collection = serde_json::from_value(payload).expect("payload parses");
        state.sync.load_dataset(&collection, state.settings.default_instrument_height());

        let path = export_csv(&state, dir.path()).expect("export");
        assert_eq!(path, dir.path().join(crate::export::CSV_FILE_NAME));
        assert_eq!(std::fs::read_to_string(path).expect("csv").lines().count(), 2);
    }

    #[tokio::test]
    async fn test_export_requires_a_survey() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = open(&dir).await;
        assert_eq!(export_csv(&state, dir.path()).expect_err("nothing loaded"), "no survey loaded");
    }

    #[tokio::test]
    async fn test_tile_url_uses_settings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = open(&dir).await;
        state
            .settings
            .update(|s| s.backend_url = "http://localhost:9000".into())
            .expect("settings update");
        if std::env::var(crate::settings::BACKEND_URL_ENV).is_err() {
            assert_eq!(
                tile_url(&state, 5, 16, 11).expect("url"),
                "http://localhost:9000/tiles/5/16/11.png"
            );
        }
    }
}
