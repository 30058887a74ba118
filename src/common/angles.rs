//! This module contains common constructs for working with angles and headings.
//!
//! Headings follow the host world's yaw convention: a heading of zero faces +Y, and positive
//! headings rotate counter-clockwise around +Z, so a heading of 90 degrees faces -X.

use crate::Vector3;
use std::f64::consts::PI;

/// Re-expresses an angle, specified in radians, in the range [0, 2pi).  If the angle was already
/// in that range, it is returned unchanged.
///
/// # Arguments
///
/// * `angle`: The angle to re-express, in radians
///
/// returns: f64
///
/// # Examples
///
/// ```
/// use lidarsim::common::angle_to_2pi;
/// use std::f64::consts::PI;
/// use approx::assert_relative_eq;
/// let new_angle = angle_to_2pi(-PI);
/// assert_relative_eq!(new_angle, PI, epsilon = 1.0e-10);
/// ```
pub fn angle_to_2pi(angle: f64) -> f64 {
    let mut angle = angle % (2.0 * PI);
    if angle < 0.0 {
        angle += 2.0 * PI;
    }
    angle
}

/// Re-expresses an angle, specified in radians, in the range (-pi, pi].
pub fn angle_to_pi(angle: f64) -> f64 {
    let angle = angle_to_2pi(angle);
    if angle > PI { angle - 2.0 * PI } else { angle }
}

/// Returns the unit direction for a ray tilted `elevation_deg` out of the horizontal plane and
/// rotated `azimuth_deg` around +Z from the +Y axis.
pub fn heading_direction(elevation_deg: f64, azimuth_deg: f64) -> Vector3 {
    let el = elevation_deg.to_radians();
    let az = azimuth_deg.to_radians();
    let flat = el.cos().abs();
    Vector3::new(-az.sin() * flat, az.cos() * flat, el.sin())
}

/// The horizontal forward vector for a yaw heading in degrees.
pub fn heading_forward(heading_deg: f64) -> Vector3 {
    heading_direction(0.0, heading_deg)
}

/// Signed angle in radians from `from` to `to`, measured in the XY plane only (counter-clockwise
/// positive), in the range (-pi, pi]. Vectors with no horizontal component give zero.
///
/// # Examples
///
/// ```
/// use lidarsim::Vector3;
/// use lidarsim::common::planar_angle;
/// use std::f64::consts::FRAC_PI_2;
/// use approx::assert_relative_eq;
/// let a = planar_angle(&Vector3::new(1.0, 0.0, 0.0), &Vector3::new(0.0, 1.0, 5.0));
/// assert_relative_eq!(a, FRAC_PI_2, epsilon = 1.0e-10);
/// ```
pub fn planar_angle(from: &Vector3, to: &Vector3) -> f64 {
    if from.xy().norm() == 0.0 || to.xy().norm() == 0.0 {
        return 0.0;
    }
    let a0 = from.y.atan2(from.x);
    let a1 = to.y.atan2(to.x);
    angle_to_pi(a1 - a0)
}
