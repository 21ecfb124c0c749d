//! Gravity/geomagnetic rotation matrix and Euler angle extraction.
//!
//! Device frame: x to the right, y up the screen, z out of the screen. The
//! world frame rows of the matrix are east, north and up.

use nalgebra::{Matrix3, Vector3};
use serde::Serialize;

/// Standard gravity in m/s².
pub const STANDARD_GRAVITY: f32 = 9.806_65;

/// Below 10% of g the device is treated as falling and has no usable "up".
const FREE_FALL_GRAVITY_SQUARED: f32 = 0.01 * STANDARD_GRAVITY * STANDARD_GRAVITY;

/// Magnetic field (nearly) parallel to gravity leaves no horizontal reference.
const MIN_HORIZONTAL_FIELD_NORM: f32 = 0.1;

/// Azimuth, pitch and roll in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Orientation {
    pub azimuth: f32,
    pub pitch: f32,
    pub roll: f32,
}

/// Resolves the device-to-world rotation from an accelerometer and a
/// magnetometer vector.
///
/// Returns `None` for non-finite samples, in free fall, or when the magnetic
/// field has no component perpendicular to gravity.
pub fn rotation_matrix(gravity: &Vector3<f32>, geomagnetic: &Vector3<f32>) -> Option<Matrix3<f32>> {
    if !gravity.iter().chain(geomagnetic.iter()).all(|v| v.is_finite()) {
        return None;
    }

    let gravity_norm_squared = gravity.norm_squared();
    if gravity_norm_squared < FREE_FALL_GRAVITY_SQUARED {
        return None;
    }

    let east = geomagnetic.cross(gravity);
    let east_norm = east.norm();
    if east_norm < MIN_HORIZONTAL_FIELD_NORM {
        return None;
    }

    let east = east / east_norm;
    let up = *gravity / gravity_norm_squared.sqrt();
    let north = up.cross(&east);

    Some(Matrix3::from_rows(&[
        east.transpose(),
        north.transpose(),
        up.transpose(),
    ]))
}

/// Euler angles of a rotation matrix produced by [`rotation_matrix`].
pub fn orientation(rotation: &Matrix3<f32>) -> Orientation {
    Orientation {
        azimuth: rotation[(0, 1)].atan2(rotation[(1, 1)]),
        pitch: (-rotation[(2, 1)]).asin(),
        roll: (-rotation[(2, 0)]).atan2(rotation[(2, 2)]),
    }
}
