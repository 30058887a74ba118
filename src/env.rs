//! The boundary between the scan engine and the host environment. The host supplies world
//! geometry through `RayProbe`, image-space projection through `Camera`, and object dimensions
//! and poses through `ModelCatalog`. Every query reports failure as a value, never by panicking.

mod pinhole;
mod scene;

use crate::common::heading_forward;
use crate::{Iso3, Point2, Point3, UnitQuat, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub use pinhole::PinholeCamera;
pub use scene::{Scene, SceneObject};

/// Identity of a world object, stable only for the duration of one scan session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub i64);

impl Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies the model (mesh) an object is an instance of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelHash(pub u32);

impl Display for ModelHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coarse semantic class of whatever a ray hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CoarseClass {
    /// The cell has not been hit
    #[default]
    NoObject,
    /// Roads, buildings and terrain
    Background,
    HumanAnimal,
    Vehicle,
    Prop,
}

impl CoarseClass {
    /// Integer label written to per-point label files
    pub fn label(&self) -> i32 {
        match self {
            CoarseClass::NoObject => 0,
            CoarseClass::Background => -1,
            CoarseClass::HumanAnimal => 1,
            CoarseClass::Vehicle => 2,
            CoarseClass::Prop => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CoarseClass::NoObject => "NoObject",
            CoarseClass::Background => "RoadsBuildings",
            CoarseClass::HumanAnimal => "HumansAnimals",
            CoarseClass::Vehicle => "Vehicle",
            CoarseClass::Prop => "GameProp",
        }
    }
}

/// The result of one ray query. `hit` is authoritative: a hit may legitimately land on the world
/// origin, so the hit point is never used to infer a miss.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub hit: bool,
    pub point: Point3,
    pub object: Option<ObjectId>,
    pub class: CoarseClass,
}

impl RayHit {
    pub fn miss() -> Self {
        Self {
            hit: false,
            point: Point3::origin(),
            object: None,
            class: CoarseClass::NoObject,
        }
    }

    pub fn new(point: Point3, object: Option<ObjectId>, class: CoarseClass) -> Self {
        Self {
            hit: true,
            point,
            object,
            class,
        }
    }
}

/// World placement of a dynamic object
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectPose {
    pub model: ModelHash,

    /// The entity's reported position, which is not necessarily the center of its model box
    pub position: Point3,

    /// Euler rotation in degrees about the X, Y and Z axes
    pub rotation: Vector3,

    /// The object's local forward (+Y) axis expressed in world space
    pub forward: Vector3,
}

impl ObjectPose {
    /// A pose rotated only about the vertical axis, facing along its yaw heading
    pub fn from_yaw(model: ModelHash, position: Point3, yaw_deg: f64) -> Self {
        Self {
            model,
            position,
            rotation: Vector3::new(0.0, 0.0, yaw_deg),
            forward: heading_forward(yaw_deg),
        }
    }

    pub fn orientation(&self) -> UnitQuat {
        UnitQuat::from_euler_angles(
            self.rotation.x.to_radians(),
            self.rotation.y.to_radians(),
            self.rotation.z.to_radians(),
        )
    }

    /// The transform from the object's model space into world space
    pub fn isometry(&self) -> Iso3 {
        Iso3::from_parts(self.position.coords.into(), self.orientation())
    }
}

/// Casts rays into the host world
pub trait RayProbe {
    /// Cast a ray from `origin` along the unit `direction`, up to `max_distance`
    fn cast(&self, origin: &Point3, direction: &Vector3, max_distance: f64) -> RayHit;
}

/// The virtual camera used to relate world points to image pixels
pub trait Camera {
    /// Current yaw heading in degrees, using the same convention as the sensor heading
    fn yaw(&self) -> f64;

    /// Re-orients the camera to a new yaw heading in degrees
    fn set_yaw(&mut self, yaw_deg: f64);

    /// Projects a world point to normalized screen coordinates in [0, 1] x [0, 1], with the
    /// origin at the top left. Returns `None` for points outside the view frustum.
    fn project(&self, world: &Point3) -> Option<Point2>;

    /// The horizontal direction the camera is facing
    fn forward(&self) -> Vector3 {
        heading_forward(self.yaw())
    }
}

/// Looks up model dimensions and object poses
pub trait ModelCatalog {
    /// The model-space minimum and maximum corners of a model's bounding box
    fn dimensions(&self, model: ModelHash) -> Option<(Point3, Point3)>;

    /// The current pose of a world object
    fn pose(&self, id: ObjectId) -> Option<ObjectPose>;
}
