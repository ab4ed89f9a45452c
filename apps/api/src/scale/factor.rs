//! Fit-to-width scale arithmetic.

use serde::Serialize;
use thiserror::Error;

/// Factors are rounded to this many steps per unit (3 decimal places).
const PRECISION: f64 = 1000.0;
/// Smallest factor we publish; a positive ratio never rounds down to zero.
const MIN_FACTOR: f64 = 1.0 / PRECISION;

/// A measurement that cannot produce a factor. Transient: callers skip it and
/// keep the previous factor.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum MeasurementError {
    #[error("Container width {0} is not measurable")]
    Container(f64),

    #[error("Sheet width {0} is not measurable")]
    Sheet(f64),
}

/// Presentation-only shrink factor in (0, 1].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct ScaleFactor(f64);

impl ScaleFactor {
    pub const IDENTITY: ScaleFactor = ScaleFactor(1.0);

    pub fn value(self) -> f64 {
        self.0
    }

    /// CSS `transform` value.
    pub fn css_transform(self) -> String {
        format!("scale({})", self.0)
    }

    /// Length after the transform is applied.
    pub fn apply(self, length: f64) -> f64 {
        length * self.0
    }
}

impl Default for ScaleFactor {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// `min(container / sheet, 1)`, rounded to three decimals.
pub fn compute_scale(container_width: f64, sheet_width: f64) -> Result<ScaleFactor, MeasurementError> {
    if !container_width.is_finite() || container_width <= 0.0 {
        return Err(MeasurementError::Container(container_width));
    }
    if !sheet_width.is_finite() || sheet_width <= 0.0 {
        return Err(MeasurementError::Sheet(sheet_width));
    }

    let ratio = (container_width / sheet_width).min(1.0);
    let rounded = ((ratio * PRECISION).round() / PRECISION).clamp(MIN_FACTOR, 1.0);
    Ok(ScaleFactor(rounded))
}
