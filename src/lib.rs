//! Frame-sliced LiDAR scan simulation: a resumable angular sampling grid driven by a host's ray
//! queries, a radial sensor noise model, and tight image-space boxes for the dynamic objects a
//! scan encounters.

pub mod common;
pub mod config;
pub mod env;
mod errors;
pub mod grid;
pub mod io;
pub mod noise;
pub mod projector;
pub mod scheduler;
pub mod session;

pub use parry3d_f64::na;

pub type Point3 = parry3d_f64::na::Point3<f64>;
pub type Vector3 = parry3d_f64::na::Vector3<f64>;
pub type UnitVec3 = parry3d_f64::na::Unit<Vector3>;
pub type UnitQuat = parry3d_f64::na::UnitQuaternion<f64>;
pub type Iso3 = parry3d_f64::na::Isometry3<f64>;
pub type Point2 = parry2d_f64::na::Point2<f64>;
pub type Aabb2 = parry2d_f64::bounding_volume::Aabb;

pub use config::{AngularRange, ExposurePlan, Lighting, NoiseSettings, ScanConfig, SensorPose};
pub use env::{Camera, CoarseClass, ModelCatalog, ModelHash, ObjectId, ObjectPose, RayHit, RayProbe};
pub use errors::ScanError;
pub use grid::{Projection, SampleCell, ScanGrid};
pub use noise::{DistanceErrorTable, NoisePolicy, apply_noise};
pub use projector::{ObjectBoxProjector, ObjectRecord, ScreenMapping};
pub use scheduler::{RowScheduler, ScanState};
pub use session::{Exposure, FrameStatus, ScanOutput, ScanPoint, ScanSession, SessionHandle};

pub type Result<T> = std::result::Result<T, ScanError>;
