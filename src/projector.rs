//! Image-space bounding boxes for dynamic objects. When a scan first hits an object, its model
//! box is placed in the world, every corner is projected through the camera, and the pair of
//! opposite corners spanning the largest image-space area is kept as the object's 2D box.
//!
//! The screen-space bounds of a rotated box are generally not the projections of its model min
//! and max corners, so all 56 ordered corner pairs are examined. Pairs which share a face of the
//! box can also span a large area but are not a bounding diagonal, and are discarded by comparing
//! their separation against the true box diagonal.

use crate::common::{box_corners, dist, mean_point, planar_angle};
use crate::env::{Camera, CoarseClass, ModelCatalog, ModelHash, ObjectId, ObjectPose};
use crate::{Aabb2, Point2, Point3, Vector3};
use itertools::iproduct;
use std::collections::HashMap;

/// Converts the camera's normalized screen coordinates into pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenMapping {
    pub width: u32,
    pub height: u32,
    pub pixel_scale: f64,
}

impl ScreenMapping {
    pub fn new(width: u32, height: u32, pixel_scale: f64) -> Self {
        Self {
            width,
            height,
            pixel_scale,
        }
    }

    pub fn to_pixels(&self, normalized: &Point2) -> Point2 {
        Point2::new(
            normalized.x * self.width as f64 * self.pixel_scale,
            normalized.y * self.height as f64 * self.pixel_scale,
        )
    }

    /// Projects a world point to pixel coordinates, or `None` if the camera cannot see it
    pub fn project<C: Camera + ?Sized>(&self, camera: &C, world: &Point3) -> Option<Point2> {
        camera.project(world).map(|p| self.to_pixels(&p))
    }
}

/// What is known about one dynamic object seen during a scan. Positions are relative to the
/// sensor origin; projections are in pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRecord {
    pub id: ObjectId,
    pub model: ModelHash,
    pub class: CoarseClass,

    /// The bounding diagonal's first corner (the model-space minimum), placed in the world
    pub min_corner: Vector3,

    /// The bounding diagonal's second corner (the model-space maximum), placed in the world
    pub max_corner: Vector3,

    /// Top-left of the object's 2D box, `None` when truncated
    pub projected_min: Option<Point2>,

    /// Bottom-right of the object's 2D box, `None` when truncated
    pub projected_max: Option<Point2>,

    /// The entity's reported position
    pub position: Vector3,

    /// Euler rotation in degrees
    pub rotation: Vector3,

    /// Geometric center of the placed box
    pub center: Vector3,
    pub projected_center: Option<Point2>,

    /// Box extents along the model X (width), Y (length) and Z (height) axes
    pub dimensions: Vector3,

    /// Set when no opposite-corner pair projected fully inside the image
    pub truncated: bool,

    pub forward: Vector3,

    /// Object heading relative to the camera's forward direction, radians in (-pi, pi]. This is a
    /// labeling aid and not a precise measurement.
    pub observation_angle: f64,
}

impl ObjectRecord {
    /// The object's 2D box in pixels, if it was not truncated
    pub fn screen_box(&self) -> Option<Aabb2> {
        match (self.projected_min, self.projected_max) {
            (Some(a), Some(b)) => Some(Aabb2::new(a, b)),
            _ => None,
        }
    }

    /// Width, height, length ordering used by label files
    pub fn width(&self) -> f64 {
        self.dimensions.x
    }

    pub fn length(&self) -> f64 {
        self.dimensions.y
    }

    pub fn height(&self) -> f64 {
        self.dimensions.z
    }
}

/// The winning corner pair of a box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerPair {
    pub first: usize,
    pub second: usize,
    pub area: f64,
}

/// Finds the pair of opposite box corners whose projections span the largest area. Corners with
/// no projection, or a projection on or beyond the top/left image edge, are not admissible.
///
/// # Arguments
///
/// * `corners`: the eight model-space corners of an axis-aligned box
/// * `pixels`: the projection of each corner, in pixels
///
/// returns: Option<CornerPair>
pub fn best_corner_pair(corners: &[Point3; 8], pixels: &[Option<Point2>; 8]) -> Option<CornerPair> {
    let diagonal = corners
        .iter()
        .flat_map(|a| corners.iter().map(move |b| dist(a, b)))
        .fold(0.0, f64::max);
    let tol = diagonal * 1.0e-9;

    let mut best: Option<CornerPair> = None;
    for (i, j) in iproduct!(0..8, 0..8).filter(|(i, j)| i != j) {
        let (Some(a), Some(b)) = (pixels[i], pixels[j]) else {
            continue;
        };
        if a.x <= 0.0 || a.y <= 0.0 || b.x <= 0.0 || b.y <= 0.0 {
            continue;
        }

        let (lo, hi) = ordered(&corners[i], &corners[j]);
        if (dist(&lo, &hi) - diagonal).abs() > tol {
            continue;
        }

        let area = (a.x - b.x).abs() * (a.y - b.y).abs();
        if best.is_none_or(|current| area > current.area) {
            best = Some(CornerPair {
                first: i,
                second: j,
                area,
            });
        }
    }

    best
}

/// Reorders the components of two points so that the first is coordinate-wise <= the second
fn ordered(a: &Point3, b: &Point3) -> (Point3, Point3) {
    (a.inf(b), a.sup(b))
}

/// Keeps one `ObjectRecord` per object identity for the duration of a scan session. Objects are
/// assumed not to move while the scan runs, so a record is never recomputed once it exists.
#[derive(Debug, Clone)]
pub struct ObjectBoxProjector {
    origin: Point3,
    records: Vec<ObjectRecord>,
    index: HashMap<ObjectId, usize>,
}

impl ObjectBoxProjector {
    /// Creates an empty projector reporting positions relative to the sensor `origin`
    pub fn new(origin: Point3) -> Self {
        Self {
            origin,
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: ObjectId) -> Option<&ObjectRecord> {
        self.index.get(&id).map(|&i| &self.records[i])
    }

    /// All records in the order their objects were first hit
    pub fn records(&self) -> &[ObjectRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ObjectRecord> {
        self.records
    }

    /// Computes and stores the record for an object, or returns the stored record if the object
    /// was already registered in this session, regardless of the pose now given.
    ///
    /// # Arguments
    ///
    /// * `id`: the object's identity
    /// * `class`: coarse class to tag the record with
    /// * `model_min`, `model_max`: the model-space bounding box corners
    /// * `pose`: the object's world placement
    /// * `camera`: the camera to project through, in its current orientation
    /// * `screen`: the pixel mapping of the camera's image
    ///
    /// returns: &ObjectRecord
    #[allow(clippy::too_many_arguments)]
    pub fn register<C: Camera + ?Sized>(
        &mut self,
        id: ObjectId,
        class: CoarseClass,
        model_min: &Point3,
        model_max: &Point3,
        pose: &ObjectPose,
        camera: &C,
        screen: &ScreenMapping,
    ) -> &ObjectRecord {
        let i = match self.index.get(&id) {
            Some(&i) => i,
            None => {
                let record = self.compute(id, class, model_min, model_max, pose, camera, screen);
                log::debug!(
                    "Registered object {} (model {}), truncated: {}",
                    id,
                    record.model,
                    record.truncated
                );
                self.records.push(record);
                self.index.insert(id, self.records.len() - 1);
                self.records.len() - 1
            }
        };
        &self.records[i]
    }

    /// Registers an object hit by the scan, looking its model box and pose up in the catalog.
    /// Returns `None` if the object is new and the catalog cannot describe it.
    pub fn register_hit<M: ModelCatalog + ?Sized, C: Camera + ?Sized>(
        &mut self,
        id: ObjectId,
        class: CoarseClass,
        catalog: &M,
        camera: &C,
        screen: &ScreenMapping,
    ) -> Option<&ObjectRecord> {
        if self.index.contains_key(&id) {
            return self.get(id);
        }

        let Some(pose) = catalog.pose(id) else {
            log::warn!("Object {} has no pose in the catalog", id);
            return None;
        };
        let Some((min, max)) = catalog.dimensions(pose.model) else {
            log::warn!("Model {} of object {} has no dimensions", pose.model, id);
            return None;
        };

        Some(self.register(id, class, &min, &max, &pose, camera, screen))
    }

    #[allow(clippy::too_many_arguments)]
    fn compute<C: Camera + ?Sized>(
        &self,
        id: ObjectId,
        class: CoarseClass,
        model_min: &Point3,
        model_max: &Point3,
        pose: &ObjectPose,
        camera: &C,
        screen: &ScreenMapping,
    ) -> ObjectRecord {
        let iso = pose.isometry();
        let corners = box_corners(model_min, model_max);
        let world = corners.map(|c| iso * c);
        let pixels = world.map(|w| screen.project(camera, &w));

        let center = mean_point(&world);

        let (min_corner, max_corner, projected_min, projected_max) =
            match best_corner_pair(&corners, &pixels) {
                Some(pair) => {
                    let (lo, hi) = ordered(&corners[pair.first], &corners[pair.second]);
                    let a = pixels[pair.first];
                    let b = pixels[pair.second];
                    (
                        iso * lo,
                        iso * hi,
                        a.zip(b).map(|(a, b)| a.inf(&b)),
                        a.zip(b).map(|(a, b)| a.sup(&b)),
                    )
                }
                None => (world[0], world[7], None, None),
            };

        ObjectRecord {
            id,
            model: pose.model,
            class,
            min_corner: min_corner - self.origin,
            max_corner: max_corner - self.origin,
            truncated: projected_min.is_none(),
            projected_min,
            projected_max,
            position: pose.position - self.origin,
            rotation: pose.rotation,
            center: center - self.origin,
            projected_center: screen.project(camera, &center),
            dimensions: model_max - model_min,
            forward: pose.forward,
            observation_angle: planar_angle(&camera.forward(), &pose.forward),
        }
    }
}
