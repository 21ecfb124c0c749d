use nalgebra::{Matrix3, Vector3};

use crate::sensing::{SensorAxis, SensorReading};

use super::bearing::Bearing;
use super::rotation::{orientation, rotation_matrix, Orientation};

/// Fuses the latest accelerometer and magnetometer samples into a bearing.
///
/// Each new sample replaces the previous one for its axis and the bearing is
/// recomputed immediately. The two vectors are not time-aligned.
#[derive(Debug, Clone)]
pub struct HeadingEstimator {
    last_accelerometer: Vector3<f32>,
    last_magnetometer: Vector3<f32>,
    accelerometer_seen: bool,
    magnetometer_seen: bool,
    /// Last rotation that could be resolved. A degenerate pair leaves it untouched.
    rotation: Matrix3<f32>,
    bearing: Option<Bearing>,
}

impl Default for HeadingEstimator {
    fn default() -> Self {
        Self {
            last_accelerometer: Vector3::zeros(),
            last_magnetometer: Vector3::zeros(),
            accelerometer_seen: false,
            magnetometer_seen: false,
            rotation: Matrix3::zeros(),
            bearing: None,
        }
    }
}

impl HeadingEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `values` for `axis` and returns the recomputed bearing, if both
    /// axes have been seen.
    pub fn update(&mut self, axis: SensorAxis, values: [f32; 3]) -> Option<Bearing> {
        let vector = Vector3::from(values);
        match axis {
            SensorAxis::Accelerometer => {
                self.last_accelerometer = vector;
                self.accelerometer_seen = true;
            }
            SensorAxis::Magnetometer => {
                self.last_magnetometer = vector;
                self.magnetometer_seen = true;
            }
        }

        if self.accelerometer_seen && self.magnetometer_seen {
            if let Some(rotation) = rotation_matrix(&self.last_accelerometer, &self.last_magnetometer) {
                self.rotation = rotation;
            }
            self.bearing = Bearing::from_radians(orientation(&self.rotation).azimuth);
        }

        self.bearing
    }

    pub fn apply(&mut self, reading: SensorReading) -> Option<Bearing> {
        self.update(reading.axis, reading.values)
    }

    /// `None` until both axes have reported at least once.
    pub fn current_bearing(&self) -> Option<Bearing> {
        self.bearing
    }

    pub fn orientation(&self) -> Option<Orientation> {
        self.bearing.map(|_| orientation(&self.rotation))
    }

    pub fn has_seen(&self, axis: SensorAxis) -> bool {
        match axis {
            SensorAxis::Accelerometer => self.accelerometer_seen,
            SensorAxis::Magnetometer => self.magnetometer_seen,
        }
    }
}
