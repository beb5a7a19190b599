//! Height-offset recalculation: displayed thickness is the base thickness
//! (thickness at zero instrument height) minus the current instrument height.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::models::Reading;

use super::coerce::parse_decimal;

/// Height of the instrument above the surface, metres. Always finite and `>= 0`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct InstrumentHeight(f64);

impl InstrumentHeight {
    pub const ZERO: InstrumentHeight = InstrumentHeight(0.0);

    pub fn new(meters: f64) -> Result<Self, ValidationError> {
        if meters.is_finite() && meters >= 0.0 {
            Ok(Self(meters))
        } else {
            Err(ValidationError::InstrumentHeight(meters.to_string()))
        }
    }

    /// Only for compile-time constants that are known to be valid.
    pub(crate) const fn from_const(meters: f64) -> Self {
        Self(meters)
    }

    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let rejected = || ValidationError::InstrumentHeight(raw.trim().to_string());
        let meters = parse_decimal(raw).ok_or_else(rejected)?;
        Self::new(meters).map_err(|_| rejected())
    }

    /// Parses user input, substituting `fallback` when it is invalid. The
    /// rejection is returned alongside so the caller can tell the user.
    pub fn resolve(raw: &str, fallback: InstrumentHeight) -> HeightResolution {
        match Self::parse(raw) {
            Ok(height) => HeightResolution {
                height,
                rejected: None,
            },
            Err(err) => HeightResolution {
                height: fallback,
                rejected: Some(err),
            },
        }
    }

    pub fn meters(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for InstrumentHeight {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<InstrumentHeight> for f64 {
    fn from(value: InstrumentHeight) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeightResolution {
    pub height: InstrumentHeight,
    pub rejected: Option<ValidationError>,
}

pub fn base_thickness_for(thickness: Option<f64>, height: InstrumentHeight) -> Option<f64> {
    thickness
        .filter(|t| t.is_finite())
        .map(|t| t + height.meters())
}

pub fn displayed_thickness(base: Option<f64>, height: InstrumentHeight) -> Option<f64> {
    base.filter(|b| b.is_finite()).map(|b| b - height.meters())
}

/// Recomputes every displayed thickness for `height`. Touches no other field.
pub fn apply_instrument_height(readings: &mut [Reading], height: InstrumentHeight) {
    for reading in readings {
        reading.thickness = displayed_thickness(reading.base_thickness, height);
    }
}

/// Direct thickness edit: the base follows so later height changes stay consistent.
pub fn edit_thickness(reading: &mut Reading, thickness: Option<f64>, height: InstrumentHeight) {
    reading.thickness = thickness;
    reading.base_thickness = base_thickness_for(thickness, height);
}
