//! The scan grid: one sample cell per (elevation step, azimuth step), stored row-major. Cells that
//! see nothing are still recorded, so the grid stays rectangular and indices remain stable.

use crate::common::heading_direction;
use crate::config::NoiseSettings;
use crate::env::{CoarseClass, ObjectId, RayProbe};
use crate::noise::{DistanceErrorTable, apply_noise};
use crate::{Point3, Vector3};
use rand::Rng;

/// Where a sample landed in one of the scan's exposures, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projection {
    pub screen_x: i32,
    pub screen_y: i32,
    pub exposure: usize,
}

/// Everything the sensor knows about the world along one ray
#[derive(Debug, Clone, PartialEq)]
pub struct SampleCell {
    /// Set once the ray for this cell has been cast
    pub sampled: bool,

    /// Whether the ray hit anything. A miss leaves `point` at the origin, which is also a valid
    /// hit location, so this flag is the only reliable test.
    pub hit: bool,

    /// Raw hit point in world space
    pub point: Point3,

    /// Hit position relative to the sensor origin, after noise
    pub noisy: Vector3,

    pub class: CoarseClass,
    pub object: Option<ObjectId>,

    /// Projection of the ideal point; the first exposure to see the point claims it
    pub projection: Option<Projection>,

    /// Projection of the noisy point, claimed independently of the ideal point
    pub noisy_projection: Option<Projection>,
}

impl Default for SampleCell {
    fn default() -> Self {
        Self {
            sampled: false,
            hit: false,
            point: Point3::origin(),
            noisy: Vector3::zeros(),
            class: CoarseClass::NoObject,
            object: None,
            projection: None,
            noisy_projection: None,
        }
    }
}

/// The per-scan constants needed to sample a cell
#[derive(Debug, Clone, Copy)]
pub struct SampleContext<'a> {
    pub origin: Point3,
    pub range: f64,
    pub noise: NoiseSettings,
    pub table: &'a DistanceErrorTable,
}

impl SampleCell {
    /// Casts the ray at (`elevation_deg`, `azimuth_deg`) from the sensor origin and records the
    /// result, applying the noise model to any hit.
    pub fn sample<P: RayProbe + ?Sized, R: Rng>(
        probe: &P,
        ctx: &SampleContext,
        elevation_deg: f64,
        azimuth_deg: f64,
        rng: &mut R,
    ) -> Self {
        let direction = heading_direction(elevation_deg, azimuth_deg);
        let result = probe.cast(&ctx.origin, &direction, ctx.range);

        if !result.hit {
            return Self {
                sampled: true,
                ..Default::default()
            };
        }

        let offset = result.point - ctx.origin;
        let noisy = apply_noise(
            &offset,
            ctx.noise.amplitude,
            ctx.noise.policy,
            ctx.table,
            rng,
        );

        Self {
            sampled: true,
            hit: true,
            point: result.point,
            noisy,
            class: result.class,
            object: result.object,
            projection: None,
            noisy_projection: None,
        }
    }

    /// Fine-grained label: the identity of the object hit, or -1 when the hit has no identity
    pub fn fine_label(&self) -> i64 {
        self.object.map(|id| id.0).unwrap_or(-1)
    }

    /// Records the ideal point's projection unless an earlier exposure already claimed it.
    /// Returns true if this projection was recorded.
    pub fn claim_projection(&mut self, projection: Projection) -> bool {
        claim(&mut self.projection, projection)
    }

    /// Records the noisy point's projection unless an earlier exposure already claimed it
    pub fn claim_noisy_projection(&mut self, projection: Projection) -> bool {
        claim(&mut self.noisy_projection, projection)
    }
}

fn claim(slot: &mut Option<Projection>, projection: Projection) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(projection);
    true
}

/// A rectangular table of `rows x cols` sample cells, row-major
#[derive(Debug, Clone)]
pub struct ScanGrid {
    rows: usize,
    cols: usize,
    cells: Vec<SampleCell>,
    hits_per_row: Vec<usize>,
}

impl ScanGrid {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![SampleCell::default(); rows * cols],
            hits_per_row: vec![0; rows],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&SampleCell> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.cells.get(row * self.cols + col)
    }

    pub fn row(&self, row: usize) -> Option<&[SampleCell]> {
        if row >= self.rows {
            return None;
        }
        self.cells.get(row * self.cols..(row + 1) * self.cols)
    }

    /// Stores a freshly sampled cell, keeping the per-row hit counters current. Returns false and
    /// leaves the grid untouched when `(row, col)` lies outside it.
    pub fn set(&mut self, row: usize, col: usize, cell: SampleCell) -> bool {
        if row >= self.rows || col >= self.cols {
            return false;
        }
        let i = row * self.cols + col;
        if self.cells[i].hit {
            self.hits_per_row[row] -= 1;
        }
        if cell.hit {
            self.hits_per_row[row] += 1;
        }
        self.cells[i] = cell;
        true
    }

    pub fn cells(&self) -> &[SampleCell] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [SampleCell] {
        &mut self.cells
    }

    pub fn hits_per_row(&self) -> &[usize] {
        &self.hits_per_row
    }

    pub fn hit_count(&self) -> usize {
        self.hits_per_row.iter().sum()
    }

    pub fn is_fully_sampled(&self) -> bool {
        self.cells.iter().all(|c| c.sampled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::RayHit;
    use crate::noise::NoisePolicy;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use test_case::test_case;

    struct WallProbe(f64);

    impl RayProbe for WallProbe {
        fn cast(&self, origin: &Point3, direction: &Vector3, max: f64) -> RayHit {
            if self.0 > max {
                return RayHit::miss();
            }
            RayHit::new(origin + direction * self.0, Some(ObjectId(9)), CoarseClass::Prop)
        }
    }

    /// Reports a genuine hit exactly on the world origin
    struct OriginProbe;

    impl RayProbe for OriginProbe {
        fn cast(&self, _: &Point3, _: &Vector3, _: f64) -> RayHit {
            RayHit::new(Point3::origin(), None, CoarseClass::Background)
        }
    }

    fn ctx(table: &DistanceErrorTable) -> SampleContext<'_> {
        SampleContext {
            origin: Point3::new(1.0, 2.0, 3.0),
            range: 50.0,
            noise: NoiseSettings {
                amplitude: 0.0,
                policy: NoisePolicy::Absolute,
            },
            table,
        }
    }

    #[test]
    fn hit_cell_records_relative_offset() {
        let table = DistanceErrorTable::default();
        let mut rng = StdRng::seed_from_u64(1);
        let cell = SampleCell::sample(&WallProbe(10.0), &ctx(&table), 0.0, 90.0, &mut rng);
        assert!(cell.sampled && cell.hit);
        assert_relative_eq!(cell.point, Point3::new(-9.0, 2.0, 3.0), epsilon = 1.0e-12);
        assert_relative_eq!(cell.noisy, Vector3::new(-10.0, 0.0, 0.0), epsilon = 1.0e-12);
        assert_eq!(cell.class, CoarseClass::Prop);
        assert_eq!(cell.fine_label(), 9);
    }

    #[test]
    fn miss_is_recorded_not_skipped() {
        let table = DistanceErrorTable::default();
        let mut rng = StdRng::seed_from_u64(1);
        let cell = SampleCell::sample(&WallProbe(100.0), &ctx(&table), 0.0, 0.0, &mut rng);
        assert!(cell.sampled);
        assert!(!cell.hit);
        assert_eq!(cell.class, CoarseClass::NoObject);
        assert_eq!(cell.fine_label(), -1);
    }

    #[test]
    fn hit_at_world_origin_counts_as_hit() {
        // Treating a zero hit point as a miss would drop this sample
        let table = DistanceErrorTable::default();
        let mut rng = StdRng::seed_from_u64(1);
        let cell = SampleCell::sample(&OriginProbe, &ctx(&table), 0.0, 0.0, &mut rng);
        assert!(cell.hit);
        assert_eq!(cell.point, Point3::origin());

        let mut grid = ScanGrid::new(1, 1);
        grid.set(0, 0, cell);
        assert_eq!(grid.hit_count(), 1);
    }

    #[test]
    fn first_projection_wins() {
        let mut cell = SampleCell::default();
        let a = Projection {
            screen_x: 10,
            screen_y: 20,
            exposure: 0,
        };
        let b = Projection {
            screen_x: 30,
            screen_y: 40,
            exposure: 1,
        };
        assert!(cell.claim_projection(a));
        assert!(!cell.claim_projection(b));
        assert_eq!(cell.projection, Some(a));

        assert!(cell.claim_noisy_projection(b));
        assert_eq!(cell.noisy_projection, Some(b));
    }

    #[test]
    fn grid_tracks_hits_per_row() {
        let mut grid = ScanGrid::new(2, 3);
        assert_eq!(grid.len(), 6);
        assert!(!grid.is_fully_sampled());

        let hit = SampleCell {
            sampled: true,
            hit: true,
            ..Default::default()
        };
        let miss = SampleCell {
            sampled: true,
            ..Default::default()
        };
        for c in 0..3 {
            grid.set(0, c, hit.clone());
            grid.set(1, c, if c == 1 { hit.clone() } else { miss.clone() });
        }
        assert!(grid.is_fully_sampled());
        assert_eq!(grid.hits_per_row(), &[3, 1]);
        assert_eq!(grid.hit_count(), 4);

        // Overwriting a hit with a miss keeps the counters consistent
        grid.set(0, 0, miss);
        assert_eq!(grid.hits_per_row(), &[2, 1]);
        assert!(grid.get(0, 0).is_some_and(|c| !c.hit));
        assert!(grid.get(2, 0).is_none());
        assert_eq!(grid.row(1).map(|r| r.len()), Some(3));
    }

    #[test_case(2, 0 ; "row past the end")]
    #[test_case(0, 3 ; "column past the end")]
    #[test_case(usize::MAX, usize::MAX ; "far outside")]
    fn out_of_range_access_is_refused(row: usize, col: usize) {
        let mut grid = ScanGrid::new(2, 3);
        let hit = SampleCell {
            sampled: true,
            hit: true,
            ..Default::default()
        };
        assert!(!grid.set(row, col, hit));
        assert_eq!(grid.hit_count(), 0);
        assert!(grid.get(row, col).is_none());
        assert!(grid.row(2).is_none());
        assert!(grid.row(usize::MAX).is_none());
    }
}
