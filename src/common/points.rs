//! Common operations on f64 points, including the spherical coordinate conversions used by the
//! sensor noise model.

use crate::{Point3, Vector3};
use parry3d_f64::na::{Point, SVector};

/// Returns the distance between two points in D-dimensional space.
///
/// # Arguments
///
/// * `a`: the first point
/// * `b`: the second point
///
/// returns: f64
///
/// # Examples
///
/// ```
/// use lidarsim::common::dist;
/// use lidarsim::Point3;
/// let a = Point3::new(1.0, 2.0, 0.0);
/// let b = Point3::new(3.0, 2.0, 0.0);
/// let d = dist(&a, &b);
/// assert_eq!(d, 2.0);
/// ```
pub fn dist<const D: usize>(a: &Point<f64, D>, b: &Point<f64, D>) -> f64 {
    (a - b).norm()
}

/// Returns the mean point of a set of points in D-dimensional space.  The mean is found by summing
/// the coordinates of all points and dividing by the number of points.  There is no weighting of
/// the points in this calculation.
///
/// # Arguments
///
/// * `points`: a slice of points to compute the mean of
///
/// returns: OPoint<f64, Const<{ D }>>
///
/// # Examples
///
/// ```
/// use lidarsim::common::mean_point;
/// use lidarsim::Point3;
/// let points = vec![Point3::new(1.0, 2.0, 0.0), Point3::new(3.0, 4.0, 0.0), Point3::new(5.0, 6.0, 0.0)];
/// let mean = mean_point(&points);
/// assert_eq!(mean, Point3::new(3.0, 4.0, 0.0));
/// ```
pub fn mean_point<const D: usize>(points: &[Point<f64, D>]) -> Point<f64, D> {
    let mut sum = SVector::<f64, D>::zeros();
    for p in points {
        sum += p.coords;
    }
    Point::<f64, D>::from(sum / points.len() as f64)
}

/// A position in spherical coordinates. `elevation` is measured up from the XY plane and
/// `azimuth` counter-clockwise from +X, both in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spherical {
    pub radius: f64,
    pub elevation: f64,
    pub azimuth: f64,
}

/// Converts a Cartesian offset into spherical coordinates using the atan2 form, so that every
/// octant resolves to the correct quadrant.
pub fn cartesian_to_spherical(v: &Vector3) -> Spherical {
    let hxy = v.x.hypot(v.y);
    Spherical {
        radius: hxy.hypot(v.z),
        elevation: v.z.atan2(hxy),
        azimuth: v.y.atan2(v.x),
    }
}

pub fn spherical_to_cartesian(s: &Spherical) -> Vector3 {
    let r_cos = s.radius * s.elevation.cos();
    Vector3::new(
        r_cos * s.azimuth.cos(),
        r_cos * s.azimuth.sin(),
        s.radius * s.elevation.sin(),
    )
}

/// The eight corners of the axis-aligned box spanned by `min` and `max`. Corner `i` takes the
/// max coordinate on axis `k` when bit `k` of `i` is set, so corners 0 and 7 are `min` and `max`.
pub fn box_corners(min: &Point3, max: &Point3) -> [Point3; 8] {
    std::array::from_fn(|i| {
        Point3::new(
            if i & 1 == 0 { min.x } else { max.x },
            if i & 2 == 0 { min.y } else { max.y },
            if i & 4 == 0 { min.z } else { max.z },
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use test_case::test_case;

    #[test_case(1.0, 0.0, 0.0)]
    #[test_case(-3.0, 2.0, 1.0)]
    #[test_case(0.5, -7.0, -2.0)]
    #[test_case(-1.0, -1.0, 9.0)]
    fn spherical_round_trip(x: f64, y: f64, z: f64) {
        let v = Vector3::new(x, y, z);
        let s = cartesian_to_spherical(&v);
        assert_relative_eq!(s.radius, v.norm(), epsilon = 1.0e-12);
        assert_relative_eq!(spherical_to_cartesian(&s), v, epsilon = 1.0e-12);
    }

    #[test]
    fn zero_offset_has_zero_radius() {
        let s = cartesian_to_spherical(&Vector3::zeros());
        assert_eq!(s.radius, 0.0);
        assert_eq!(spherical_to_cartesian(&s), Vector3::zeros());
    }

    #[test]
    fn box_corners_are_distinct_and_bounded() {
        let min = Point3::new(-1.0, -2.0, -3.0);
        let max = Point3::new(1.0, 2.0, 3.0);
        let corners = box_corners(&min, &max);
        assert_eq!(corners[0], min);
        assert_eq!(corners[7], max);
        for i in 0..8 {
            for j in (i + 1)..8 {
                assert_ne!(corners[i], corners[j]);
            }
        }
        assert_eq!(mean_point(&corners), Point3::origin());
    }
}
