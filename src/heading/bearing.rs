use serde::{Deserialize, Serialize};
use std::fmt;

const FULL_TURN_DEGREES: f32 = 360.0;

/// Compass bearing in degrees, always within `[0, 360)`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Bearing(f32);

impl Bearing {
    /// Normalises `degrees` into `[0, 360)`. Returns `None` for NaN or infinite input.
    pub fn from_degrees(degrees: f32) -> Option<Self> {
        if !degrees.is_finite() {
            return None;
        }
        Some(Self(normalize_degrees(degrees)))
    }

    /// Azimuth in radians as produced by the orientation extraction.
    pub fn from_radians(radians: f32) -> Option<Self> {
        Self::from_degrees(radians.to_degrees())
    }

    pub fn degrees(&self) -> f32 {
        self.0
    }

    /// Readout text: at most two decimals, trailing zeros dropped.
    ///
    /// Values that round up to a full turn read "0", the same as the encoded
    /// direction.
    pub fn display_text(&self) -> String {
        let fixed = format!("{:.2}", self.0);
        let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
        if trimmed == "360" {
            return "0".to_string();
        }
        trimmed.to_string()
    }
}

impl fmt::Display for Bearing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_text())
    }
}

/// `(degrees + 360) mod 360`, folded so the result never reaches 360.
///
/// Arctangent output lies in `(-180, 180]`, which the single shift covers. Larger
/// magnitudes are wrapped again, and an `f32` sum that rounds up to exactly 360
/// (tiny negative inputs) becomes 0.
pub fn normalize_degrees(degrees: f32) -> f32 {
    let mut normalized = (degrees + FULL_TURN_DEGREES) % FULL_TURN_DEGREES;
    if normalized < 0.0 {
        normalized += FULL_TURN_DEGREES;
    }
    if normalized >= FULL_TURN_DEGREES {
        normalized = 0.0;
    }
    normalized
}
