//! Static canvas renderer used when no interactive map is available. It keeps
//! a list of projected shapes that a host can paint onto a 2D surface.

use crate::models::{Bounds, DrillPointId, LatLon, RowId};
use crate::scale::Rgb;

use super::views::{DrillMarker, Legend, MapScene, MapView, MarkerSpec};

const ENABLE_LOGS: bool = false;

use crate::log_debug;

const MIN_SPAN: f64 = 1e-6;
const DOT_RADIUS: f64 = 4.0;
const TRACK_WIDTH: f64 = 2.0;

/// Linear lon/lat to pixel mapping; the y axis points down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    min_lon: f64,
    min_lat: f64,
    scale_x: f64,
    scale_y: f64,
    height: f64,
}

impl Projection {
    pub fn fit(bounds: &Bounds, width: f64, height: f64) -> Self {
        Self {
            min_lon: bounds.west,
            min_lat: bounds.south,
            scale_x: width / (bounds.east - bounds.west).max(MIN_SPAN),
            scale_y: height / (bounds.north - bounds.south).max(MIN_SPAN),
            height,
        }
    }

    pub fn project(&self, p: LatLon) -> (f64, f64) {
        (
            (p.lon - self.min_lon) * self.scale_x,
            self.height - (p.lat - self.min_lat) * self.scale_y,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CanvasShape {
    Polyline {
        points: Vec<(f64, f64)>,
        color: Rgb,
        width: f64,
    },
    Dot {
        row_id: RowId,
        x: f64,
        y: f64,
        radius: f64,
        color: Rgb,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrillGlyph {
    pub id: DrillPointId,
    pub x: f64,
    pub y: f64,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct CanvasMap {
    width: f64,
    height: f64,
    scene: MapScene,
    drill_markers: Vec<DrillMarker>,
    projection: Option<Projection>,
    shapes: Vec<CanvasShape>,
    legend: Option<Legend>,
}

impl CanvasMap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: f64::from(width),
            height: f64::from(height),
            scene: MapScene::default(),
            drill_markers: Vec::new(),
            projection: None,
            shapes: Vec::new(),
            legend: None,
        }
    }

    /// Tracks first, then reading dots, in paint order.
    pub fn shapes(&self) -> &[CanvasShape] {
        &self.shapes
    }

    pub fn legend(&self) -> Option<&Legend> {
        self.legend.as_ref()
    }

    pub fn projection(&self) -> Option<Projection> {
        self.projection
    }

    /// One glyph per drill point, whether or not a survey is drawn.
    pub fn drill_glyphs(&self) -> Vec<DrillGlyph> {
        let Some(projection) = self.projection else {
            return Vec::new();
        };
        self.drill_markers
            .iter()
            .map(|m| {
                let (x, y) = projection.project(m.position);
                DrillGlyph {
                    id: m.id,
                    x,
                    y,
                    label: m.label.clone(),
                }
            })
            .collect()
    }

    /// Area covering the survey extent, every reading and track vertex, and
    /// every drill point.
    fn extent(&self) -> Option<Bounds> {
        let corners = self
            .scene
            .extent
            .map(|b| [LatLon::new(b.south, b.west), LatLon::new(b.north, b.east)]);
        let markers = self.scene.markers.iter().map(|m| m.position);
        let tracks = self.scene.tracks.iter().flat_map(|t| t.path.iter().copied());
        let drills = self.drill_markers.iter().map(|m| m.position);
        let points: Vec<LatLon> = corners
            .into_iter()
            .flatten()
            .chain(markers)
            .chain(tracks)
            .chain(drills)
            .collect();
        Bounds::enclosing(&points)
    }

    fn layout(&mut self) {
        self.shapes.clear();
        self.projection = self
            .extent()
            .map(|extent| Projection::fit(&extent, self.width, self.height));
        let Some(projection) = self.projection else {
            return;
        };

        for track in &self.scene.tracks {
            self.shapes.push(CanvasShape::Polyline {
                points: track.path.iter().map(|p| projection.project(*p)).collect(),
                color: track.color,
                width: TRACK_WIDTH,
            });
        }
        for marker in &self.scene.markers {
            let (x, y) = projection.project(marker.position);
            self.shapes.push(CanvasShape::Dot {
                row_id: marker.row_id.clone(),
                x,
                y,
                radius: DOT_RADIUS,
                color: marker.color,
            });
        }
    }
}

impl MapView for CanvasMap {
    fn render(&mut self, scene: &MapScene) {
        self.scene = scene.clone();
        self.layout();
    }

    fn fit_bounds(&mut self, _bounds: &Bounds) {
        // The canvas always shows everything it holds.
    }

    fn update_marker(&mut self, marker: &MarkerSpec) {
        if let Some(stored) = self.scene.markers.iter_mut().find(|m| m.row_id == marker.row_id) {
            *stored = marker.clone();
        }
        for shape in &mut self.shapes {
            if let CanvasShape::Dot { row_id, color, .. } = shape {
                if *row_id == marker.row_id {
                    *color = marker.color;
                }
            }
        }
    }

    fn remove_marker(&mut self, row_id: &RowId) {
        self.scene.markers.retain(|m| m.row_id != *row_id);
        self.shapes
            .retain(|shape| !matches!(shape, CanvasShape::Dot { row_id: id, .. } if id == row_id));
    }

    fn open_popup(&mut self, row_id: &RowId) {
        log_debug!("canvas map has no popups (requested for {})", row_id);
    }

    fn render_drill_points(&mut self, points: &[DrillMarker]) {
        self.drill_markers = points.to_vec();
        self.layout();
    }

    fn set_legend(&mut self, legend: &Legend) {
        self.legend = Some(legend.clone());
    }
}
