use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Stable identifier of a reading row, assigned once at ingest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(String);

impl RowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier handed out by the per-ingest counter: `r1`, `r2`, ...
    pub fn from_sequence(seq: u64) -> Self {
        Self(format!("r{seq}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// GeoJSON position (`[lon, lat, ...]`); `None` unless both axes are finite.
    pub fn from_geojson(coords: &[serde_json::Value]) -> Option<Self> {
        let lon = coords.first()?.as_f64()?;
        let lat = coords.get(1)?.as_f64()?;
        (lon.is_finite() && lat.is_finite()).then_some(Self { lat, lon })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Bounds {
    /// Parses the `[west, south, east, north]` form used by the backend.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            [west, south, east, north] if values.iter().all(|v| v.is_finite()) => Some(Self {
                west: *west,
                south: *south,
                east: *east,
                north: *north,
            }),
            _ => None,
        }
    }

    pub fn enclosing<'a>(points: impl IntoIterator<Item = &'a LatLon>) -> Option<Self> {
        points.into_iter().fold(None, |acc, p| {
            Some(match acc {
                None => Self {
                    west: p.lon,
                    south: p.lat,
                    east: p.lon,
                    north: p.lat,
                },
                Some(b) => Self {
                    west: b.west.min(p.lon),
                    south: b.south.min(p.lat),
                    east: b.east.max(p.lon),
                    north: b.north.max(p.lat),
                },
            })
        })
    }
}

/// Walked path of one survey line. Never edited after ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub line_name: Option<String>,
    pub path: Vec<LatLon>,
}

/// Column of a reading as seen by the table and the CSV export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadingField {
    TimeMs,
    Lat,
    Lon,
    LineName,
    Conductivity,
    Thickness,
    Inphase,
    Range,
    DipoleMode,
    Marker,
    Station,
    GpsQuality,
    GpsSatellites,
    GpsHdop,
    GpsAltitude,
}

impl ReadingField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingField::TimeMs => "time_ms",
            ReadingField::Lat => "lat",
            ReadingField::Lon => "lon",
            ReadingField::LineName => "line_name",
            ReadingField::Conductivity => "conductivity",
            ReadingField::Thickness => "thickness",
            ReadingField::Inphase => "inphase",
            ReadingField::Range => "range",
            ReadingField::DipoleMode => "dipole_mode",
            ReadingField::Marker => "marker",
            ReadingField::Station => "station",
            ReadingField::GpsQuality => "gps_quality",
            ReadingField::GpsSatellites => "gps_satellites",
            ReadingField::GpsHdop => "gps_hdop",
            ReadingField::GpsAltitude => "gps_altitude",
        }
    }

    /// Fields whose table edits are parsed as numbers.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ReadingField::Conductivity
                | ReadingField::Thickness
                | ReadingField::Inphase
                | ReadingField::GpsSatellites
                | ReadingField::GpsHdop
        )
    }

    /// Geometry, timing and acquisition flags cannot be edited through the table.
    pub fn is_editable(&self) -> bool {
        self.is_numeric()
            || matches!(
                self,
                ReadingField::LineName
                    | ReadingField::Range
                    | ReadingField::DipoleMode
                    | ReadingField::GpsQuality
            )
    }
}

impl fmt::Display for ReadingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadingField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let field = match s {
            "time_ms" => ReadingField::TimeMs,
            "lat" => ReadingField::Lat,
            "lon" => ReadingField::Lon,
            "line_name" => ReadingField::LineName,
            "conductivity" => ReadingField::Conductivity,
            "thickness" => ReadingField::Thickness,
            "inphase" => ReadingField::Inphase,
            "range" => ReadingField::Range,
            "dipole_mode" => ReadingField::DipoleMode,
            "marker" => ReadingField::Marker,
            "station" => ReadingField::Station,
            "gps_quality" => ReadingField::GpsQuality,
            "gps_satellites" => ReadingField::GpsSatellites,
            "gps_hdop" => ReadingField::GpsHdop,
            "gps_altitude" => ReadingField::GpsAltitude,
            other => return Err(format!("unknown reading field '{other}'")),
        };
        Ok(field)
    }
}

/// Value of a single table cell, either as typed by the user or as stored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            CellValue::Text(s) => Some(s),
            CellValue::Number(n) => Some(n.to_string()),
            CellValue::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<Option<f64>> for CellValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(CellValue::Empty, CellValue::Number)
    }
}

impl From<Option<String>> for CellValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(CellValue::Empty, CellValue::Text)
    }
}

/// One instrument sample matched to a GPS fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub row_id: RowId,
    pub position: LatLon,
    pub line_name: Option<String>,
    pub time_ms: Option<i64>,
    pub conductivity: Option<f64>,
    pub inphase: Option<f64>,
    /// Thickness as currently displayed, i.e. relative to the active instrument height.
    pub thickness: Option<f64>,
    /// Thickness at zero instrument height; `thickness = base_thickness - height`.
    pub base_thickness: Option<f64>,
    pub range: Option<String>,
    pub dipole_mode: Option<String>,
    pub marker: Option<bool>,
    pub station: Option<f64>,
    pub gps_quality: Option<String>,
    pub gps_satellites: Option<f64>,
    pub gps_hdop: Option<f64>,
    pub gps_altitude: Option<f64>,
}

impl Reading {
    pub fn new(row_id: RowId, position: LatLon) -> Self {
        Self {
            row_id,
            position,
            line_name: None,
            time_ms: None,
            conductivity: None,
            inphase: None,
            thickness: None,
            base_thickness: None,
            range: None,
            dipole_mode: None,
            marker: None,
            station: None,
            gps_quality: None,
            gps_satellites: None,
            gps_hdop: None,
            gps_altitude: None,
        }
    }

    pub fn value(&self, field: ReadingField) -> CellValue {
        match field {
            ReadingField::TimeMs => self.time_ms.map(|t| t as f64).into(),
            ReadingField::Lat => CellValue::Number(self.position.lat),
            ReadingField::Lon => CellValue::Number(self.position.lon),
            ReadingField::LineName => self.line_name.clone().into(),
            ReadingField::Conductivity => self.conductivity.into(),
            ReadingField::Thickness => self.thickness.into(),
            ReadingField::Inphase => self.inphase.into(),
            ReadingField::Range => self.range.clone().into(),
            ReadingField::DipoleMode => self.dipole_mode.clone().into(),
            ReadingField::Marker => self.marker.map(|m| m.to_string()).into(),
            ReadingField::Station => self.station.into(),
            ReadingField::GpsQuality => self.gps_quality.clone().into(),
            ReadingField::GpsSatellites => self.gps_satellites.into(),
            ReadingField::GpsHdop => self.gps_hdop.into(),
            ReadingField::GpsAltitude => self.gps_altitude.into(),
        }
    }

    /// Writes an already coerced value into an editable field. Thickness edits
    /// must go through `survey::height::edit_thickness` to keep the base in step.
    /// Returns `false` for fields that are not editable.
    pub(crate) fn store(&mut self, field: ReadingField, value: CellValue) -> bool {
        match field {
            ReadingField::Conductivity => self.conductivity = value.as_number(),
            ReadingField::Thickness => self.thickness = value.as_number(),
            ReadingField::Inphase => self.inphase = value.as_number(),
            ReadingField::GpsSatellites => self.gps_satellites = value.as_number(),
            ReadingField::GpsHdop => self.gps_hdop = value.as_number(),
            ReadingField::LineName => self.line_name = value.into_text(),
            ReadingField::Range => self.range = value.into_text(),
            ReadingField::DipoleMode => self.dipole_mode = value.into_text(),
            ReadingField::GpsQuality => self.gps_quality = value.into_text(),
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_round_trip_through_from_str() {
        for name in ["time_ms", "lat", "conductivity", "gps_hdop", "dipole_mode"] {
            let field: ReadingField = name.parse().expect("known field");
            assert_eq!(field.as_str(), name);
        }
        assert!("colour".parse::<ReadingField>().is_err());
    }

    #[test]
    fn test_geometry_fields_are_read_only() {
        assert!(!ReadingField::Lat.is_editable());
        assert!(!ReadingField::Lon.is_editable());
        assert!(!ReadingField::TimeMs.is_editable());
        assert!(ReadingField::Range.is_editable());
        assert!(!ReadingField::Range.is_numeric());
        assert!(ReadingField::GpsSatellites.is_numeric());

        let mut reading = Reading::new(RowId::from_sequence(1), LatLon::new(1.0, 2.0));
        assert!(!reading.store(ReadingField::Lat, CellValue::Number(9.0)));
        assert_eq!(reading.position.lat, 1.0);
    }

    #[test]
    fn test_bounds_enclosing_points() {
        let points = [LatLon::new(10.0, 5.0), LatLon::new(12.0, 3.0), LatLon::new(11.0, 4.0)];
        let bounds = Bounds::enclosing(points.iter()).expect("non-empty");
        assert_eq!(
            bounds,
            Bounds {
                west: 3.0,
                south: 10.0,
                east: 5.0,
                north: 12.0
            }
        );
        assert!(Bounds::enclosing(std::iter::empty()).is_none());
        assert!(Bounds::from_slice(&[1.0, 2.0, 3.0]).is_none());
        assert!(Bounds::from_slice(&[1.0, f64::NAN, 3.0, 4.0]).is_none());
    }

    #[test]
    fn test_cell_value_deserializes_from_json_scalars() {
        let values: Vec<CellValue> =
            serde_json::from_str(r#"[null, 1.5, "12,5"]"#).expect("cells parse");
        assert_eq!(
            values,
            vec![
                CellValue::Empty,
                CellValue::Number(1.5),
                CellValue::Text("12,5".into())
            ]
        );
    }
}
