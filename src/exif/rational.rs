use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::heading::Bearing;

/// Fixed denominator: two decimal digits of precision.
pub const DIRECTION_DENOMINATOR: u32 = 100;

/// 360.00° in hundredths, which names the same direction as 0.00°.
const FULL_TURN_HUNDREDTHS: u32 = 36_000;

/// Unsigned rational as stored in a TIFF `RATIONAL` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionRational {
    pub numerator: u32,
    pub denominator: u32,
}

impl DirectionRational {
    pub fn new(numerator: u32, denominator: u32) -> Result<Self> {
        if denominator == 0 {
            bail!("rational denominator must be non-zero");
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }

    pub fn degrees(&self) -> f64 {
        f64::from(self.numerator) / f64::from(self.denominator)
    }
}

/// Hundredths of a degree over 100, rounded half up.
///
/// The numerator stays within `0..=35999`: a bearing that rounds up to 360.00
/// wraps to 0.
pub fn encode(bearing: Bearing) -> DirectionRational {
    let scaled = f64::from(bearing.degrees()) * f64::from(DIRECTION_DENOMINATOR);
    let rounded = (scaled + 0.5).floor() as u32;
    DirectionRational {
        numerator: rounded % FULL_TURN_HUNDREDTHS,
        denominator: DIRECTION_DENOMINATOR,
    }
}

impl fmt::Display for DirectionRational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl FromStr for DirectionRational {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let (numerator, denominator) = value
            .split_once('/')
            .ok_or_else(|| anyhow!("'{value}' is not a rational of the form n/d"))?;
        let numerator = numerator
            .trim()
            .parse::<u32>()
            .map_err(|err| anyhow!("invalid numerator in '{value}': {err}"))?;
        let denominator = denominator
            .trim()
            .parse::<u32>()
            .map_err(|err| anyhow!("invalid denominator in '{value}': {err}"))?;
        Self::new(numerator, denominator)
    }
}
