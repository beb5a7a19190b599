//! Capabilities the synchronizer needs from the table and map widgets, plus the
//! plain projections it hands to them.
//!
//! Adapters report user actions back through `ViewSynchronizer::on_cell_edited`,
//! `on_row_selected`, `on_marker_clicked` and `on_table_ready`. Those calls are
//! dropped while the synchronizer itself is writing to a view, so an adapter may
//! forward widget events unconditionally.

use serde::Serialize;

use crate::models::{Bounds, CellValue, DrillPoint, DrillPointId, LatLon, Reading, ReadingField, RowId};
use crate::scale::{Rgb, Scale};

pub const TRACK_COLOR: Rgb = Rgb::new(0x2c, 0x7b, 0xe5);

pub trait TableView: Send {
    fn replace_rows(&mut self, rows: Vec<TableRow>);
    fn select_row(&mut self, row_id: &RowId, scroll_into_view: bool);
    fn deselect_all(&mut self);
    /// Rewrites a cell with its normalised value without raising an edit event.
    fn set_cell_value(&mut self, row_id: &RowId, field: ReadingField, value: &CellValue);
    fn remove_row(&mut self, row_id: &RowId);
}

pub trait MapView: Send {
    /// Replaces the survey layer (reading markers and tracks).
    fn render(&mut self, scene: &MapScene);
    fn fit_bounds(&mut self, bounds: &Bounds);
    fn update_marker(&mut self, marker: &MarkerSpec);
    fn remove_marker(&mut self, row_id: &RowId);
    fn open_popup(&mut self, row_id: &RowId);
    /// Replaces the drill-point layer.
    fn render_drill_points(&mut self, points: &[DrillMarker]);
    fn set_legend(&mut self, legend: &Legend);
}

/// Stand-in when no table widget is available; every call is a no-op.
#[derive(Debug, Default)]
pub struct DisabledTable;

impl TableView for DisabledTable {
    fn replace_rows(&mut self, _rows: Vec<TableRow>) {}
    fn select_row(&mut self, _row_id: &RowId, _scroll_into_view: bool) {}
    fn deselect_all(&mut self) {}
    fn set_cell_value(&mut self, _row_id: &RowId, _field: ReadingField, _value: &CellValue) {}
    fn remove_row(&mut self, _row_id: &RowId) {}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub id: RowId,
    pub time_ms: Option<i64>,
    pub lat: f64,
    pub lon: f64,
    pub conductivity: Option<f64>,
    pub thickness: Option<f64>,
    pub inphase: Option<f64>,
    pub range: Option<String>,
    pub dipole_mode: Option<String>,
    pub gps_quality: Option<String>,
    pub gps_satellites: Option<f64>,
    pub gps_hdop: Option<f64>,
}

impl From<&Reading> for TableRow {
    fn from(r: &Reading) -> Self {
        Self {
            id: r.row_id.clone(),
            time_ms: r.time_ms,
            lat: r.position.lat,
            lon: r.position.lon,
            conductivity: r.conductivity,
            thickness: r.thickness,
            inphase: r.inphase,
            range: r.range.clone(),
            dipole_mode: r.dipole_mode.clone(),
            gps_quality: r.gps_quality.clone(),
            gps_satellites: r.gps_satellites,
            gps_hdop: r.gps_hdop,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Popup {
    pub lines: Vec<String>,
}

impl Popup {
    pub fn for_reading(r: &Reading) -> Self {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        let or_unknown = |v: CellValue| {
            if v.is_empty() {
                "?".to_string()
            } else {
                v.to_string()
            }
        };
        Self {
            lines: vec![
                format!("Cond: {} mS/m", fmt_num(r.conductivity, 3)),
                format!("Thickness: {} m", fmt_num(r.thickness, 3)),
                format!("Inphase: {} ppt", fmt_num(r.inphase, 3)),
                format!("Range: {}", text(&r.range)),
                format!("Dipole: {}", text(&r.dipole_mode)),
                format!(
                    "GPS: Q{} ({} sat.)",
                    or_unknown(r.gps_quality.clone().into()),
                    or_unknown(r.gps_satellites.into())
                ),
            ],
        }
    }

    pub fn to_html(&self) -> String {
        self.lines.join("<br>")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerSpec {
    pub row_id: RowId,
    pub position: LatLon,
    pub color: Rgb,
    pub popup: Popup,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSpec {
    pub path: Vec<LatLon>,
    pub color: Rgb,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MapScene {
    pub markers: Vec<MarkerSpec>,
    pub tracks: Vec<TrackSpec>,
    /// Area the scene covers, used by renderers that project it themselves.
    pub extent: Option<Bounds>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Legend {
    pub min: f64,
    pub max: f64,
}

impl Legend {
    pub fn min_label(&self) -> String {
        format!("{} mS/m", fmt_num(Some(self.min), 2))
    }

    pub fn max_label(&self) -> String {
        format!("{} mS/m", fmt_num(Some(self.max), 2))
    }
}

impl From<Scale> for Legend {
    fn from(scale: Scale) -> Self {
        Self {
            min: scale.min,
            max: scale.max,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrillMarker {
    pub id: DrillPointId,
    pub position: LatLon,
    pub label: String,
}

impl From<&DrillPoint> for DrillMarker {
    fn from(p: &DrillPoint) -> Self {
        Self {
            id: p.id,
            position: LatLon::new(p.lat, p.lon),
            label: format!("{}: {} m", p.id, fmt_num(Some(p.thickness), 2)),
        }
    }
}

/// Fixed-precision number, `—` when absent.
pub fn fmt_num(value: Option<f64>, digits: usize) -> String {
    match value {
        Some(v) if !v.is_nan() => format!("{v:.digits$}"),
        _ => "—".to_string(),
    }
}
