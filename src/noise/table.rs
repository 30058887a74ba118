//! Empirical distance/error lookup table for the sensor noise model.

use crate::{Result, ScanError};
use std::path::Path;

/// A piecewise-linear table mapping range (metres) to the maximum radial error at that range.
/// Distances are strictly increasing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistanceErrorTable {
    distances: Vec<f64>,
    errors: Vec<f64>,
}

impl DistanceErrorTable {
    /// Build a table from `(distance, error)` pairs, which must be sorted by strictly increasing
    /// distance.
    pub fn new(pairs: &[(f64, f64)]) -> Result<Self> {
        let (distances, errors): (Vec<f64>, Vec<f64>) = pairs.iter().copied().unzip();
        Self::from_columns(distances, errors)
    }

    fn from_columns(distances: Vec<f64>, errors: Vec<f64>) -> Result<Self> {
        if distances.len() != errors.len() {
            return Err(ScanError::table(format!(
                "{} distances but {} errors",
                distances.len(),
                errors.len()
            )));
        }
        if distances.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(ScanError::table("distances must be strictly increasing"));
        }
        if distances.iter().chain(errors.iter()).any(|v| !v.is_finite()) {
            return Err(ScanError::table("table values must be finite"));
        }
        Ok(Self { distances, errors })
    }

    /// Parses the two-line text format: a comma-separated list of errors on the first line and
    /// the matching comma-separated distances on the second.
    ///
    /// # Examples
    ///
    /// ```
    /// use lidarsim::DistanceErrorTable;
    /// let table = DistanceErrorTable::parse_csv("0.1,0.4\n1,2\n").unwrap();
    /// assert_eq!(table.len(), 2);
    /// assert_eq!(table.interpolate(2.0), 0.4);
    /// ```
    pub fn parse_csv(text: &str) -> Result<Self> {
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
        let errors = lines
            .next()
            .ok_or_else(|| ScanError::table("missing error line"))?;
        let distances = lines
            .next()
            .ok_or_else(|| ScanError::table("missing distance line"))?;
        Self::from_columns(split_values(distances)?, split_values(errors)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse_csv(&text)
    }

    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    /// The error at range `r`, linearly interpolated between the bracketing table entries. The
    /// sign of `r` is ignored. Ranges below the first entry or beyond the last cannot be
    /// interpolated and give zero, as does a zero range.
    pub fn interpolate(&self, r: f64) -> f64 {
        let r = r.abs();
        if r == 0.0 {
            return 0.0;
        }

        // Smallest index with a distance >= r
        let i = self.distances.partition_point(|&d| d < r);
        if i >= self.distances.len() {
            return 0.0;
        }
        if self.distances[i] == r {
            return self.errors[i];
        }
        if i == 0 {
            return 0.0;
        }

        let (d0, d1) = (self.distances[i - 1], self.distances[i]);
        let f = (r - d0) / (d1 - d0);
        (1.0 - f) * self.errors[i - 1] + f * self.errors[i]
    }
}

fn split_values(line: &str) -> Result<Vec<f64>> {
    line.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.parse::<f64>()
                .map_err(|e| ScanError::table(format!("cannot parse '{t}': {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use test_case::test_case;

    fn table() -> DistanceErrorTable {
        DistanceErrorTable::new(&[(1.0, 0.1), (2.0, 0.4), (10.0, 1.2)]).unwrap()
    }

    #[test_case(1.5, 0.25)]
    #[test_case(-1.5, 0.25)]
    #[test_case(1.0, 0.1)]
    #[test_case(2.0, 0.4)]
    #[test_case(6.0, 0.8)]
    #[test_case(10.0, 1.2)]
    fn interpolates_between_entries(r: f64, expected: f64) {
        assert_relative_eq!(table().interpolate(r), expected, epsilon = 1.0e-12);
    }

    #[test_case(0.0 ; "zero range")]
    #[test_case(0.5 ; "below first entry")]
    #[test_case(10.5 ; "beyond last entry")]
    fn out_of_range_lookups_are_zero(r: f64) {
        assert_eq!(table().interpolate(r), 0.0);
    }

    #[test]
    fn empty_table_is_zero_everywhere() {
        let t = DistanceErrorTable::default();
        assert!(t.is_empty());
        assert_eq!(t.interpolate(3.0), 0.0);
    }

    #[test]
    fn interpolation_is_continuous_at_entries() {
        let t = table();
        let eps = 1.0e-9;
        assert_relative_eq!(t.interpolate(2.0 - eps), 0.4, epsilon = 1.0e-6);
        assert_relative_eq!(t.interpolate(2.0 + eps), 0.4, epsilon = 1.0e-6);
    }

    #[test]
    fn parses_errors_then_distances() -> Result<()> {
        let t = DistanceErrorTable::parse_csv("0.02, 0.05,0.2\n5,50,100\n")?;
        assert_eq!(t.len(), 3);
        assert_relative_eq!(t.interpolate(27.5), 0.035, epsilon = 1.0e-12);
        Ok(())
    }

    #[test]
    fn rejects_unsorted_distances() {
        let r = DistanceErrorTable::new(&[(2.0, 0.1), (1.0, 0.4)]);
        assert!(matches!(r, Err(ScanError::InvalidTable(_))));
    }

    #[test]
    fn rejects_mismatched_lines() {
        assert!(DistanceErrorTable::parse_csv("0.1,0.2\n1,2,3").is_err());
        assert!(DistanceErrorTable::parse_csv("0.1,0.2").is_err());
        assert!(DistanceErrorTable::parse_csv("0.1,x\n1,2").is_err());
    }
}
