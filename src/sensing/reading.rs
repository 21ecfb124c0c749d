use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SensorAxis {
    Accelerometer,
    Magnetometer,
}

impl SensorAxis {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorAxis::Accelerometer => "accelerometer",
            SensorAxis::Magnetometer => "magnetometer",
        }
    }
}

/// One 3-axis sample. Accelerometer values are in m/s², magnetometer values in µT.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SensorReading {
    pub axis: SensorAxis,
    pub values: [f32; 3],
}

impl SensorReading {
    pub fn accelerometer(values: [f32; 3]) -> Self {
        Self {
            axis: SensorAxis::Accelerometer,
            values,
        }
    }

    pub fn magnetometer(values: [f32; 3]) -> Self {
        Self {
            axis: SensorAxis::Magnetometer,
            values,
        }
    }
}

/// Requested delivery rate for sensor listeners.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SensorRate {
    Normal,
    Ui,
    Game,
    Fastest,
}

impl Default for SensorRate {
    fn default() -> Self {
        SensorRate::Game
    }
}

impl SensorRate {
    /// Nominal interval between samples. `Fastest` asks for no throttling at all.
    pub fn sampling_period(&self) -> Duration {
        match self {
            SensorRate::Normal => Duration::from_millis(200),
            SensorRate::Ui => Duration::from_micros(66_667),
            SensorRate::Game => Duration::from_millis(20),
            SensorRate::Fastest => Duration::ZERO,
        }
    }
}
