//! This module contains the sensor noise model, which perturbs a sample along its line of sight.
//! Only the radial distance is disturbed; the elevation and azimuth of the sample are preserved.

mod table;

use crate::Vector3;
use crate::common::{cartesian_to_spherical, spherical_to_cartesian};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub use table::DistanceErrorTable;

/// How the noise amplitude relates to the radial error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoisePolicy {
    /// The error bound is the amplitude itself, in metres
    Absolute,

    /// The error bound is the amplitude multiplied by the measured range
    Proportional,

    /// The error bound is looked up from a distance/error table at the measured range
    Empirical,
}

/// Perturbs a sensor-relative offset along its line of sight. A single sample `u` is drawn
/// uniformly from [-1, 1] and the radius becomes `r + u * bound`, where the bound depends on
/// `policy`.
///
/// A zero offset is a fixed point, and a zero amplitude disables noise for every policy; in both
/// cases the offset is returned unchanged and no sample is drawn.
///
/// # Arguments
///
/// * `offset`: the hit position relative to the sensor origin
/// * `amplitude`: the configured error amplitude
/// * `policy`: the error policy
/// * `table`: the distance/error table, only consulted by `NoisePolicy::Empirical`
/// * `rng`: the random source for `u`
///
/// returns: Matrix<f64, Const<3>, Const<1>, ArrayStorage<f64, 3, 1>>
pub fn apply_noise<R: Rng>(
    offset: &Vector3,
    amplitude: f64,
    policy: NoisePolicy,
    table: &DistanceErrorTable,
    rng: &mut R,
) -> Vector3 {
    if amplitude == 0.0 {
        return *offset;
    }

    let mut s = cartesian_to_spherical(offset);
    if s.radius == 0.0 {
        return *offset;
    }

    let u: f64 = rng.random_range(-1.0..=1.0);
    s.radius += match policy {
        NoisePolicy::Absolute => u * amplitude,
        NoisePolicy::Proportional => u * amplitude * s.radius,
        NoisePolicy::Empirical => u * table.interpolate(s.radius),
    };

    spherical_to_cartesian(&s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use test_case::test_case;

    fn table() -> DistanceErrorTable {
        DistanceErrorTable::new(&[(1.0, 0.1), (2.0, 0.4), (100.0, 2.0)]).unwrap()
    }

    #[test_case(NoisePolicy::Absolute)]
    #[test_case(NoisePolicy::Proportional)]
    #[test_case(NoisePolicy::Empirical)]
    fn zero_amplitude_is_identity(policy: NoisePolicy) {
        let mut rng = StdRng::seed_from_u64(3);
        let v = Vector3::new(3.0, -4.0, 1.5);
        assert_eq!(apply_noise(&v, 0.0, policy, &table(), &mut rng), v);
    }

    #[test_case(NoisePolicy::Absolute)]
    #[test_case(NoisePolicy::Proportional)]
    #[test_case(NoisePolicy::Empirical)]
    fn zero_offset_is_a_fixed_point(policy: NoisePolicy) {
        let mut rng = StdRng::seed_from_u64(3);
        let v = Vector3::zeros();
        assert_eq!(apply_noise(&v, 0.5, policy, &table(), &mut rng), v);
    }

    #[test_case(NoisePolicy::Absolute, 0.2)]
    #[test_case(NoisePolicy::Proportional, 0.2 * 13.0)]
    #[test_case(NoisePolicy::Empirical, 0.4 + (13.0 - 2.0) / 98.0 * 1.6)]
    fn radial_error_is_bounded(policy: NoisePolicy, bound: f64) {
        let mut rng = StdRng::seed_from_u64(11);
        let v = Vector3::new(5.0, 12.0, 0.0);
        for _ in 0..500 {
            let n = apply_noise(&v, 0.2, policy, &table(), &mut rng);
            assert!((n.norm() - 13.0).abs() <= bound + 1.0e-9);
        }
    }

    #[test]
    fn direction_is_preserved() {
        let mut rng = StdRng::seed_from_u64(5);
        let v = Vector3::new(-2.0, 7.0, -3.0);
        for _ in 0..100 {
            let n = apply_noise(&v, 0.5, NoisePolicy::Absolute, &table(), &mut rng);
            assert_relative_eq!(n.normalize(), v.normalize(), epsilon = 1.0e-12);
        }
    }

    #[test]
    fn empirical_below_table_is_unperturbed() {
        let mut rng = StdRng::seed_from_u64(5);
        let v = Vector3::new(0.3, 0.0, 0.0);
        let n = apply_noise(&v, 1.0, NoisePolicy::Empirical, &table(), &mut rng);
        assert_relative_eq!(n, v, epsilon = 1.0e-12);
    }

    #[test]
    fn seeded_noise_is_reproducible() {
        let v = Vector3::new(10.0, 1.0, 2.0);
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        for _ in 0..10 {
            let na = apply_noise(&v, 0.1, NoisePolicy::Absolute, &table(), &mut a);
            let nb = apply_noise(&v, 0.1, NoisePolicy::Absolute, &table(), &mut b);
            assert_eq!(na, nb);
        }
    }
}
