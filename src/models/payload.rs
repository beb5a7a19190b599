//! Response body of `POST /api/upload`.
//!
//! Geometry and feature properties are kept as raw JSON: the survey dataset
//! interprets them feature by feature so one malformed feature never rejects
//! the whole upload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub header: SurveyHeader,
    #[serde(default)]
    pub lines: Vec<LineSummary>,
    #[serde(default)]
    pub geojson: FeatureCollection,
}

/// Instrument file header as decoded by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SurveyHeader {
    pub program: Option<String>,
    pub version: Option<String>,
    pub survey_type: Option<String>,
    pub unit_type: Option<i64>,
    pub dipole: Option<i64>,
    pub mode: Option<i64>,
    pub component: Option<i64>,
    pub field_computer: Option<i64>,
    pub file_name: Option<String>,
    pub mode_parameter: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LineSummary {
    pub line_name: Option<String>,
    pub readings: usize,
    pub gps_points: usize,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
    /// `[west, south, east, north]`
    #[serde(default)]
    pub bounds: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub geometry: Option<Value>,
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
}

impl Feature {
    pub fn kind(&self) -> Option<&str> {
        self.property("kind").and_then(Value::as_str)
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.as_ref().and_then(|props| props.get(key))
    }

    /// Finite number property; anything else reads as absent.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.property(key)
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
    }

    /// Text property. Numbers and booleans are rendered as text, empty strings read as absent.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.property(key)? {
            Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn geometry_type(&self) -> Option<&str> {
        self.geometry
            .as_ref()
            .and_then(|g| g.get("type"))
            .and_then(Value::as_str)
    }

    pub fn coordinates(&self) -> Option<&Value> {
        self.geometry.as_ref().and_then(|g| g.get("coordinates"))
    }
}
