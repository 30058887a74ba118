//! A level pinhole camera which can only yaw, matching the panoramic capture rig mounted above
//! the sensor.

use crate::env::Camera;
use crate::{Iso3, Point2, Point3, UnitQuat, Vector3};

#[derive(Debug, Clone)]
pub struct PinholeCamera {
    position: Point3,
    yaw_deg: f64,
    tan_half_h: f64,
    tan_half_v: f64,
    near: f64,
}

impl PinholeCamera {
    /// Create a camera at `position` facing `yaw_deg`.
    ///
    /// # Arguments
    ///
    /// * `position`: the camera center in world space
    /// * `yaw_deg`: heading in degrees, zero facing +Y
    /// * `fov_deg`: the horizontal field of view in degrees
    /// * `aspect`: image width divided by image height
    ///
    /// returns: PinholeCamera
    pub fn new(position: Point3, yaw_deg: f64, fov_deg: f64, aspect: f64) -> Self {
        let tan_half_h = (fov_deg.to_radians() / 2.0).tan();
        Self {
            position,
            yaw_deg,
            tan_half_h,
            tan_half_v: tan_half_h / aspect,
            near: 1.0e-3,
        }
    }

    pub fn position(&self) -> Point3 {
        self.position
    }

    pub fn set_position(&mut self, position: Point3) {
        self.position = position;
    }

    fn iso(&self) -> Iso3 {
        let rot = UnitQuat::from_axis_angle(&Vector3::z_axis(), self.yaw_deg.to_radians());
        Iso3::from_parts(self.position.coords.into(), rot)
    }
}

impl Camera for PinholeCamera {
    fn yaw(&self) -> f64 {
        self.yaw_deg
    }

    fn set_yaw(&mut self, yaw_deg: f64) {
        self.yaw_deg = yaw_deg;
    }

    fn project(&self, world: &Point3) -> Option<Point2> {
        // Camera frame: +X right, +Y forward (depth), +Z up
        let local = self.iso().inverse_transform_point(world);
        if local.y <= self.near {
            return None;
        }

        let nx = local.x / (local.y * self.tan_half_h);
        let ny = local.z / (local.y * self.tan_half_v);
        if nx.abs() > 1.0 || ny.abs() > 1.0 {
            return None;
        }

        Some(Point2::new((nx + 1.0) / 2.0, (1.0 - ny) / 2.0))
    }
}
