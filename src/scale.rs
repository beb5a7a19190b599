//! Conductivity colour scale: automatic bounds from the data, optional manual override.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Share of the observed range added below the minimum and above the maximum.
const AUTO_PADDING: f64 = 0.05;
const MIN_RANGE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Colour for missing values and degenerate scales (`#888`).
    pub const NEUTRAL: Rgb = Rgb::new(136, 136, 136);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({},{},{})", self.r, self.g, self.b)
    }
}

/// Two-stop linear gradient, `low` at `t = 0` and `high` at `t = 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gradient {
    pub low: Rgb,
    pub high: Rgb,
}

impl Default for Gradient {
    /// Blue for low conductivity, red for high.
    fn default() -> Self {
        Self {
            low: Rgb::new(0, 140, 255),
            high: Rgb::new(255, 0, 0),
        }
    }
}

impl Gradient {
    pub fn at(&self, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let lerp = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
        Rgb::new(
            lerp(self.low.r, self.high.r),
            lerp(self.low.g, self.high.g),
            lerp(self.low.b, self.high.b),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Scale {
    pub min: f64,
    pub max: f64,
}

impl Scale {
    /// Manual bounds: both finite and strictly ordered.
    pub fn manual(min: f64, max: f64) -> Result<Self, ValidationError> {
        if min.is_finite() && max.is_finite() && min < max {
            Ok(Self { min, max })
        } else {
            Err(ValidationError::ScaleBounds { min, max })
        }
    }

    /// Padded bounds over the observed values; `{0, 0}` when there are none.
    pub fn auto(values: impl IntoIterator<Item = f64>) -> Self {
        let observed = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            });

        match observed {
            None => Self { min: 0.0, max: 0.0 },
            Some((lo, hi)) => {
                let pad = (hi - lo).max(MIN_RANGE) * AUTO_PADDING;
                Self {
                    min: lo - pad,
                    max: hi + pad,
                }
            }
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.min == self.max
    }

    pub fn color_for(&self, value: Option<f64>, gradient: &Gradient) -> Rgb {
        match value {
            Some(v) if v.is_finite() && !self.is_degenerate() => {
                gradient.at((v - self.min) / (self.max - self.min))
            }
            _ => Rgb::NEUTRAL,
        }
    }
}

/// Active scale of the map: the automatic one unless a manual override is set.
#[derive(Debug, Clone, Default)]
pub struct ScaleEngine {
    auto: Scale,
    manual: Option<Scale>,
    gradient: Gradient,
}

impl ScaleEngine {
    pub fn new(gradient: Gradient) -> Self {
        Self {
            gradient,
            ..Self::default()
        }
    }

    /// New data: recompute the automatic bounds and drop any manual override.
    pub fn recompute(&mut self, values: impl IntoIterator<Item = f64>) -> Scale {
        self.auto = Scale::auto(values);
        self.manual = None;
        self.auto
    }

    pub fn set_manual(&mut self, min: f64, max: f64) -> Result<Scale, ValidationError> {
        let scale = Scale::manual(min, max)?;
        log_info!("manual colour scale set to [{}, {}]", scale.min, scale.max);
        self.manual = Some(scale);
        Ok(scale)
    }

    pub fn reset(&mut self) -> Scale {
        self.manual = None;
        self.auto
    }

    pub fn current(&self) -> Scale {
        self.manual.unwrap_or(self.auto)
    }

    pub fn auto_scale(&self) -> Scale {
        self.auto
    }

    pub fn is_manual(&self) -> bool {
        self.manual.is_some()
    }

    pub fn color_for(&self, value: Option<f64>) -> Rgb {
        self.current().color_for(value, &self.gradient)
    }
}
