//! A scan from request to output. The host drives a `ScanSession` through its lifecycle: `begin`
//! once, `advance_one_frame` once per simulation tick until sampling completes, then `finish` to
//! run the exposure pass and collect the results. The session owns the grid and the object table,
//! and holds nothing but in-memory buffers, so it can be aborted or dropped at any point.

use crate::config::{Lighting, ScanConfig, SensorPose};
use crate::env::{Camera, CoarseClass, ModelCatalog, ObjectId, RayProbe};
use crate::grid::{Projection, SampleCell, SampleContext, ScanGrid};
use crate::noise::{DistanceErrorTable, NoisePolicy};
use crate::projector::{ObjectBoxProjector, ObjectRecord, ScreenMapping};
use crate::scheduler::{RowScheduler, ScanState};
use crate::{Point3, Result, ScanError, Vector3};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use uuid::Uuid;

/// Identifies one scan session, for correlating output files and log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(Uuid);

impl SessionHandle {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Display for SessionHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the host should do after a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// Rows remain, keep calling `advance_one_frame`
    Sampling,

    /// Every row has been sampled, call `finish`
    ReadyForPostProcessing,
}

/// One camera exposure the host should capture. Each lighting condition is captured at every
/// rotation, and points are labeled with the rotation index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exposure {
    pub rotation: usize,
    pub condition: Lighting,
    pub yaw_deg: f64,
}

/// A sampled point that hit something
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPoint {
    pub row: usize,
    pub col: usize,

    /// Ideal hit position relative to the sensor origin
    pub point: Vector3,

    /// Hit position relative to the sensor origin, after noise
    pub noisy: Vector3,

    pub class: CoarseClass,
    pub object: Option<ObjectId>,
    pub projection: Option<Projection>,
    pub noisy_projection: Option<Projection>,
}

impl ScanPoint {
    fn from_cell(row: usize, col: usize, cell: &SampleCell, origin: &Point3) -> Self {
        Self {
            row,
            col,
            point: cell.point - origin,
            noisy: cell.noisy,
            class: cell.class,
            object: cell.object,
            projection: cell.projection,
            noisy_projection: cell.noisy_projection,
        }
    }

    pub fn fine_label(&self) -> i64 {
        self.object.map(|id| id.0).unwrap_or(-1)
    }
}

/// Everything a completed scan produced. The core writes no files; see `crate::io` for the
/// on-disk formats.
#[derive(Debug, Clone)]
pub struct ScanOutput {
    pub session: SessionHandle,
    pub rows: usize,
    pub cols: usize,
    pub origin: Point3,

    /// Points which hit something, in row-major grid order
    pub points: Vec<ScanPoint>,

    /// One record per vehicle hit, in the order they were first hit
    pub objects: Vec<ObjectRecord>,

    pub hits_per_row: Vec<usize>,
    pub exposures: Vec<Exposure>,

    /// The configured output location, for the persistence layer
    pub output_path: PathBuf,
}

impl ScanOutput {
    pub fn ideal_points(&self) -> Vec<Vector3> {
        self.points.iter().map(|p| p.point).collect()
    }

    pub fn noisy_points(&self) -> Vec<Vector3> {
        self.points.iter().map(|p| p.noisy).collect()
    }

    pub fn coarse_labels(&self) -> Vec<i32> {
        self.points.iter().map(|p| p.class.label()).collect()
    }

    pub fn fine_labels(&self) -> Vec<i64> {
        self.points.iter().map(|p| p.fine_label()).collect()
    }
}

pub struct ScanSession {
    handle: Option<SessionHandle>,
    state: ScanState,
    config: ScanConfig,
    pose: SensorPose,
    screen: ScreenMapping,
    table: DistanceErrorTable,
    grid: ScanGrid,
    projector: ObjectBoxProjector,
    scheduler: RowScheduler,
    rng: StdRng,
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new(DistanceErrorTable::default())
    }
}

impl ScanSession {
    /// Creates an idle session which will use `table` for the empirical noise policy
    pub fn new(table: DistanceErrorTable) -> Self {
        Self {
            handle: None,
            state: ScanState::Idle,
            config: ScanConfig::default(),
            pose: SensorPose::new(Point3::origin(), 0.0),
            screen: ScreenMapping::new(0, 0, 1.0),
            table,
            grid: ScanGrid::new(0, 0),
            projector: ObjectBoxProjector::new(Point3::origin()),
            scheduler: RowScheduler::new(0, 1),
            rng: StdRng::seed_from_u64(0),
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn handle(&self) -> Option<SessionHandle> {
        self.handle
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn grid(&self) -> &ScanGrid {
        &self.grid
    }

    pub fn projector(&self) -> &ObjectBoxProjector {
        &self.projector
    }

    /// Rows sampled so far and the total number of rows
    pub fn progress(&self) -> (usize, usize) {
        (self.scheduler.cursor(), self.scheduler.total_rows())
    }

    /// Replaces the distance/error table. Only allowed between scans.
    pub fn set_table(&mut self, table: DistanceErrorTable) -> Result<()> {
        self.require_idle("replace the error table")?;
        self.table = table;
        Ok(())
    }

    /// Starts a new scan, discarding the results of any previous one. Fails if the configuration
    /// is invalid or a scan is already in progress; in both cases the session is left untouched.
    ///
    /// # Arguments
    ///
    /// * `config`: the scan parameters
    /// * `pose`: the sensor origin and heading
    /// * `resolution`: the width and height of the camera image in pixels
    ///
    /// returns: Result<SessionHandle, ScanError>
    pub fn begin(
        &mut self,
        config: ScanConfig,
        pose: SensorPose,
        resolution: (u32, u32),
    ) -> Result<SessionHandle> {
        self.require_idle("begin a scan")?;
        config.validate()?;
        if resolution.0 == 0 || resolution.1 == 0 {
            return Err(ScanError::config(format!(
                "screen resolution must be non-zero, got {}x{}",
                resolution.0, resolution.1
            )));
        }

        if config.noise.policy == NoisePolicy::Empirical && self.table.is_empty() {
            log::warn!("Empirical noise selected with an empty error table, points will be exact");
        }

        let handle = SessionHandle::new();
        let (rows, cols) = (config.rows(), config.cols());

        self.grid = ScanGrid::new(rows, cols);
        self.projector = ObjectBoxProjector::new(pose.origin);
        self.scheduler = RowScheduler::new(rows, config.frame_budget);
        self.screen = ScreenMapping::new(resolution.0, resolution.1, config.pixel_scale);
        self.rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        self.config = config;
        self.pose = pose;
        self.handle = Some(handle);
        self.state = ScanState::Prepared;

        log::info!(
            "Scan {} begun: {}x{} grid over {} frames from {:?}",
            handle,
            rows,
            cols,
            self.scheduler.frame_budget(),
            pose.origin
        );

        Ok(handle)
    }

    /// Samples this frame's share of the grid. Vehicle hits are registered with the object box
    /// projector using `camera` in its current orientation. Once all rows are sampled further
    /// calls do nothing and keep reporting `ReadyForPostProcessing`.
    pub fn advance_one_frame<P, C, M>(
        &mut self,
        probe: &P,
        camera: &C,
        catalog: &M,
    ) -> Result<FrameStatus>
    where
        P: RayProbe + ?Sized,
        C: Camera + ?Sized,
        M: ModelCatalog + ?Sized,
    {
        if self.state == ScanState::PostProcessing {
            return Ok(FrameStatus::ReadyForPostProcessing);
        }
        if !self.state.can_advance() {
            return Err(ScanError::InvalidState {
                operation: "advance a frame",
                state: self.state,
            });
        }
        self.state = ScanState::Sampling;

        let rows = self.scheduler.next_rows();
        log::debug!(
            "Frame {}: sampling rows {}..{}",
            self.scheduler.frame(),
            rows.start,
            rows.end
        );

        let ctx = SampleContext {
            origin: self.pose.origin,
            range: self.config.range,
            noise: self.config.noise,
            table: &self.table,
        };

        for row in rows {
            let elevation = self.config.vertical.angle_at(row);
            for col in 0..self.grid.cols() {
                let azimuth = self.pose.heading_deg + self.config.horizontal.angle_at(col);
                let cell = SampleCell::sample(probe, &ctx, elevation, azimuth, &mut self.rng);

                if cell.class == CoarseClass::Vehicle {
                    if let Some(id) = cell.object {
                        self.projector
                            .register_hit(id, cell.class, catalog, camera, &self.screen);
                    }
                }

                self.grid.set(row, col, cell);
            }
        }

        if self.scheduler.is_complete() {
            self.state = ScanState::PostProcessing;
            log::info!(
                "Sampling complete: {} hits, {} objects",
                self.grid.hit_count(),
                self.projector.len()
            );
            Ok(FrameStatus::ReadyForPostProcessing)
        } else {
            Ok(FrameStatus::Sampling)
        }
    }

    /// Runs the exposure pass and hands back the scan's results. The camera is turned to each
    /// exposure yaw in turn and every hit point, ideal and noisy, is claimed by the first exposure
    /// that can see it. The camera's yaw is restored afterwards.
    pub fn finish<C: Camera + ?Sized>(&mut self, camera: &mut C) -> Result<ScanOutput> {
        if self.state != ScanState::PostProcessing {
            return Err(ScanError::InvalidState {
                operation: "finish",
                state: self.state,
            });
        }
        let Some(session) = self.handle else {
            return Err(ScanError::InvalidState {
                operation: "finish",
                state: self.state,
            });
        };

        log::info!("Post-processing scan {}", session);
        let origin = self.pose.origin;
        let heading = self.pose.heading_deg;
        let plan = &self.config.exposures;
        let restore_yaw = camera.yaw();

        for rotation in 0..plan.rotations {
            let yaw = heading + plan.yaw_offset(rotation);
            camera.set_yaw(yaw);
            log::debug!("Exposure {}: camera yaw {:.1}", rotation, yaw);

            let mut claimed = 0;
            for cell in self.grid.cells_mut().iter_mut().filter(|c| c.hit) {
                if let Some(p) = self.screen.project(&*camera, &cell.point) {
                    if cell.claim_projection(pixel_projection(&p, rotation)) {
                        claimed += 1;
                    }
                }
                if let Some(p) = self.screen.project(&*camera, &(origin + cell.noisy)) {
                    cell.claim_noisy_projection(pixel_projection(&p, rotation));
                }
            }
            log::debug!("Exposure {}: {} points claimed", rotation, claimed);
        }
        camera.set_yaw(restore_yaw);

        let exposures = plan
            .conditions
            .iter()
            .flat_map(|&condition| {
                (0..plan.rotations).map(move |rotation| Exposure {
                    rotation,
                    condition,
                    yaw_deg: heading + plan.yaw_offset(rotation),
                })
            })
            .collect();

        let grid = std::mem::replace(&mut self.grid, ScanGrid::new(0, 0));
        let projector =
            std::mem::replace(&mut self.projector, ObjectBoxProjector::new(Point3::origin()));

        let cols = grid.cols();
        let points = grid
            .cells()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.hit)
            .map(|(i, c)| ScanPoint::from_cell(i / cols, i % cols, c, &origin))
            .collect();

        self.state = ScanState::Complete;
        log::info!(
            "Post-processing complete: {} points, {} objects",
            grid.hit_count(),
            projector.len()
        );

        Ok(ScanOutput {
            session,
            rows: grid.rows(),
            cols,
            origin,
            points,
            objects: projector.into_records(),
            hits_per_row: grid.hits_per_row().to_vec(),
            exposures,
            output_path: self.config.output_path.clone(),
        })
    }

    /// Drops any scan in progress and returns to idle
    pub fn abort(&mut self) {
        if self.state != ScanState::Idle {
            log::info!("Scan aborted while {:?}", self.state);
        }
        self.grid = ScanGrid::new(0, 0);
        self.projector = ObjectBoxProjector::new(Point3::origin());
        self.scheduler = RowScheduler::new(0, 1);
        self.handle = None;
        self.state = ScanState::Idle;
    }

    fn require_idle(&self, operation: &'static str) -> Result<()> {
        match self.state {
            ScanState::Idle | ScanState::Complete => Ok(()),
            state => Err(ScanError::InvalidState { operation, state }),
        }
    }
}

fn pixel_projection(pixels: &crate::Point2, exposure: usize) -> Projection {
    Projection {
        screen_x: pixels.x as i32,
        screen_y: pixels.y as i32,
        exposure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AngularRange;
    use crate::env::{ModelHash, ObjectPose, PinholeCamera, RayHit, Scene};
    use approx::assert_relative_eq;

    /// Reports a hit at a fixed distance along every ray
    struct ShellProbe(f64);

    impl RayProbe for ShellProbe {
        fn cast(&self, origin: &Point3, direction: &Vector3, _: f64) -> RayHit {
            RayHit::new(origin + direction * self.0, None, CoarseClass::Background)
        }
    }

    fn small_config() -> ScanConfig {
        ScanConfig {
            horizontal: AngularRange::new(0.0, 360.0, 90.0),
            vertical: AngularRange::new(0.0, 2.0, 1.0),
            range: 50.0,
            seed: Some(3),
            ..Default::default()
        }
    }

    fn camera() -> PinholeCamera {
        PinholeCamera::new(Point3::origin(), 0.0, 90.0, 16.0 / 9.0)
    }

    fn run(session: &mut ScanSession, probe: &impl RayProbe, cam: &mut PinholeCamera) -> ScanOutput {
        let scene = Scene::new();
        while session.advance_one_frame(probe, &*cam, &scene).unwrap() == FrameStatus::Sampling {}
        session.finish(cam).unwrap()
    }

    #[test]
    fn lifecycle_moves_through_states() {
        let mut session = ScanSession::default();
        let scene = Scene::new();
        let mut cam = camera();
        assert_eq!(session.state(), ScanState::Idle);

        let mut config = small_config();
        config.frame_budget = 2;
        session.begin(config, SensorPose::new(Point3::origin(), 0.0), (1920, 1080)).unwrap();
        assert_eq!(session.state(), ScanState::Prepared);

        let status = session.advance_one_frame(&ShellProbe(10.0), &cam, &scene).unwrap();
        assert_eq!(status, FrameStatus::Sampling);
        assert_eq!(session.state(), ScanState::Sampling);
        assert_eq!(session.progress(), (1, 2));

        let status = session.advance_one_frame(&ShellProbe(10.0), &cam, &scene).unwrap();
        assert_eq!(status, FrameStatus::ReadyForPostProcessing);
        assert_eq!(session.state(), ScanState::PostProcessing);

        // Extra frames are a no-op
        let status = session.advance_one_frame(&ShellProbe(10.0), &cam, &scene).unwrap();
        assert_eq!(status, FrameStatus::ReadyForPostProcessing);

        let output = session.finish(&mut cam).unwrap();
        assert_eq!(session.state(), ScanState::Complete);
        assert_eq!(output.points.len(), 8);
    }

    #[test]
    fn invalid_state_calls_are_reported() {
        let mut session = ScanSession::default();
        let scene = Scene::new();
        let mut cam = camera();

        let err = session.advance_one_frame(&ShellProbe(1.0), &cam, &scene);
        assert!(matches!(
            err,
            Err(ScanError::InvalidState {
                state: ScanState::Idle,
                ..
            })
        ));
        assert!(session.finish(&mut cam).is_err());

        session.begin(small_config(), SensorPose::new(Point3::origin(), 0.0), (640, 480)).unwrap();
        assert!(matches!(
            session.finish(&mut cam),
            Err(ScanError::InvalidState {
                state: ScanState::Prepared,
                ..
            })
        ));
        assert!(
            session
                .begin(small_config(), SensorPose::new(Point3::origin(), 0.0), (640, 480))
                .is_err()
        );
        assert_eq!(session.state(), ScanState::Prepared);
    }

    #[test]
    fn invalid_config_never_starts() {
        let mut session = ScanSession::default();
        let mut config = small_config();
        config.vertical.step = 0.0;
        let result = session.begin(config, SensorPose::new(Point3::origin(), 0.0), (640, 480));
        assert!(matches!(result, Err(ScanError::InvalidConfig(_))));
        assert_eq!(session.state(), ScanState::Idle);
        assert!(session.handle().is_none());

        let result = session.begin(small_config(), SensorPose::new(Point3::origin(), 0.0), (0, 480));
        assert!(matches!(result, Err(ScanError::InvalidConfig(_))));
    }

    #[test]
    fn oversized_grid_never_allocates() {
        let mut session = ScanSession::default();
        let mut config = small_config();
        config.horizontal = AngularRange::new(0.0, 360.0, 1.0e-9);
        config.vertical = AngularRange::new(-15.0, 12.0, 1.0e-9);
        let result = session.begin(config, SensorPose::new(Point3::origin(), 0.0), (1920, 1080));
        assert!(matches!(result, Err(ScanError::InvalidConfig(_))));
        assert_eq!(session.state(), ScanState::Idle);
        assert!(session.grid().is_empty());
    }

    #[test]
    fn heading_rotates_the_sweep() {
        let mut session = ScanSession::default();
        let mut cam = camera();
        let mut config = small_config();
        config.noise.amplitude = 0.0;
        session.begin(config, SensorPose::new(Point3::new(0.0, 0.0, 1.0), 90.0), (640, 480)).unwrap();

        let output = run(&mut session, &ShellProbe(10.0), &mut cam);
        let first = &output.points[0];
        assert_eq!((first.row, first.col), (0, 0));
        // Heading 90 faces -X
        assert_relative_eq!(first.point, Vector3::new(-10.0, 0.0, 0.0), epsilon = 1.0e-9);
        assert_relative_eq!(first.noisy, first.point, epsilon = 1.0e-12);
    }

    #[test]
    fn every_point_is_claimed_by_exactly_one_exposure() {
        let mut session = ScanSession::default();
        let mut cam = camera();
        cam.set_yaw(33.0);
        let mut config = small_config();
        config.vertical = AngularRange::new(-5.0, 5.0, 5.0);
        config.horizontal = AngularRange::new(0.0, 360.0, 10.0);
        session.begin(config, SensorPose::new(Point3::origin(), 0.0), (1920, 1080)).unwrap();

        let output = run(&mut session, &ShellProbe(20.0), &mut cam);
        assert_eq!(cam.yaw(), 33.0);
        assert_eq!(output.exposures.len(), 9);

        // Three 90 degree cameras at 120 degree spacing leave gaps, but each claimed point keeps
        // the first rotation which saw it
        let first_visible = |col: usize| {
            let az = col as f64 * 10.0;
            [0.0, 120.0, 240.0].iter().position(|yaw| {
                let d = crate::common::angle_to_pi((az - yaw).to_radians());
                d.abs() < 45f64.to_radians()
            })
        };
        let mut claimed = 0;
        for p in output.points.iter() {
            // The noisy point lies on the same ray, so both follow the same rotation
            assert_eq!(p.projection.is_some(), p.noisy_projection.is_some());
            if let Some(proj) = p.projection {
                claimed += 1;
                assert!(proj.exposure < 3);
                assert_eq!(Some(proj.exposure), first_visible(p.col));
            }
            if let Some(proj) = p.noisy_projection {
                assert_eq!(Some(proj.exposure), first_visible(p.col));
            }
        }
        assert!(claimed > 0);
        assert!(claimed < output.points.len());
    }

    #[test]
    fn vehicle_hits_produce_one_record_each() {
        let mut scene = Scene::new().with_ground(-1.5);
        scene.add_model(ModelHash(1), Point3::new(-1.0, -2.0, -1.5), Point3::new(1.0, 2.0, 0.0));
        scene.add_object(
            ObjectId(77),
            CoarseClass::Vehicle,
            ObjectPose::from_yaw(ModelHash(1), Point3::new(0.0, 12.0, 0.0), 0.0),
        );

        let mut session = ScanSession::default();
        let mut cam = camera();
        let mut config = small_config();
        config.horizontal = AngularRange::new(-10.0, 10.0, 1.0);
        config.vertical = AngularRange::new(-6.0, 0.0, 1.0);
        session.begin(config, SensorPose::new(Point3::origin(), 0.0), (1920, 1080)).unwrap();

        while session.advance_one_frame(&scene, &cam, &scene).unwrap() == FrameStatus::Sampling {}
        let output = session.finish(&mut cam).unwrap();

        assert_eq!(output.objects.len(), 1);
        assert_eq!(output.objects[0].id, ObjectId(77));
        assert!(!output.objects[0].truncated);
        assert!(output.fine_labels().iter().any(|&l| l == 77));
        assert!(output.coarse_labels().iter().any(|&l| l == CoarseClass::Background.label()));
        assert_eq!(output.ideal_points().len(), output.noisy_points().len());
    }

    #[test]
    fn seeded_scans_are_reproducible() {
        let scan = || {
            let mut session = ScanSession::default();
            let mut cam = camera();
            session.begin(small_config(), SensorPose::new(Point3::origin(), 0.0), (640, 480)).unwrap();
            run(&mut session, &ShellProbe(10.0), &mut cam).noisy_points()
        };
        assert_eq!(scan(), scan());
    }

    #[test]
    fn abort_returns_to_idle() {
        let mut session = ScanSession::default();
        let scene = Scene::new();
        let cam = camera();
        session.begin(small_config(), SensorPose::new(Point3::origin(), 0.0), (640, 480)).unwrap();
        session.advance_one_frame(&ShellProbe(10.0), &cam, &scene).unwrap();
        session.abort();
        assert_eq!(session.state(), ScanState::Idle);
        assert!(session.grid().is_empty());
        assert!(session.begin(small_config(), SensorPose::new(Point3::origin(), 0.0), (640, 480)).is_ok());
    }
}
