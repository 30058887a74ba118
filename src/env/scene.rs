//! A self-contained world built from `parry3d` shapes: an optional ground plane plus a set of
//! oriented boxes. It answers ray queries and catalog lookups the way a host engine would, which
//! makes it useful for offline scans, tests and benchmarks.

use crate::env::{CoarseClass, ModelCatalog, ModelHash, ObjectId, ObjectPose, RayHit, RayProbe};
use crate::na::Translation3;
use crate::{Iso3, Point3, Vector3};
use parry3d_f64::query::{Ray, RayCast};
use parry3d_f64::shape::{Cuboid, HalfSpace};
use std::collections::HashMap;

/// An object placed in a `Scene`, shaped by its model's bounding box
#[derive(Debug, Clone)]
pub struct SceneObject {
    pub id: ObjectId,
    pub class: CoarseClass,
    pub pose: ObjectPose,
    shape: Cuboid,
    shape_iso: Iso3,
}

#[derive(Debug, Clone, Default)]
pub struct Scene {
    ground: Option<f64>,
    models: HashMap<ModelHash, (Point3, Point3)>,
    objects: Vec<SceneObject>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a horizontal ground plane at height `z`, which reports background hits
    pub fn with_ground(mut self, z: f64) -> Self {
        self.ground = Some(z);
        self
    }

    /// Registers the model-space bounding box of a model
    pub fn add_model(&mut self, model: ModelHash, min: Point3, max: Point3) {
        self.models.insert(model, (min, max));
    }

    /// Places an object into the scene. The object's model must already be registered, otherwise
    /// the object is rejected and `false` is returned.
    pub fn add_object(&mut self, id: ObjectId, class: CoarseClass, pose: ObjectPose) -> bool {
        let Some((min, max)) = self.models.get(&pose.model) else {
            return false;
        };

        let half = (max - min) / 2.0;
        let center = box_center(min, max);
        let shape_iso = pose.isometry() * Translation3::from(center);

        self.objects.push(SceneObject {
            id,
            class,
            pose,
            shape: Cuboid::new(half),
            shape_iso,
        });
        true
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }
}

fn box_center(min: &Point3, max: &Point3) -> Vector3 {
    (min.coords + max.coords) / 2.0
}

impl RayProbe for Scene {
    fn cast(&self, origin: &Point3, direction: &Vector3, max_distance: f64) -> RayHit {
        let ray = Ray::new(*origin, *direction);
        let mut best: Option<(f64, Option<ObjectId>, CoarseClass)> = None;

        if let Some(z) = self.ground {
            let plane = HalfSpace::new(Vector3::z_axis());
            let iso = Iso3::translation(0.0, 0.0, z);
            if let Some(t) = plane.cast_ray(&iso, &ray, max_distance, true) {
                best = Some((t, None, CoarseClass::Background));
            }
        }

        for obj in self.objects.iter() {
            if let Some(t) = obj.shape.cast_ray(&obj.shape_iso, &ray, max_distance, true) {
                if best.is_none_or(|(bt, _, _)| t < bt) {
                    best = Some((t, Some(obj.id), obj.class));
                }
            }
        }

        match best {
            Some((t, id, class)) => RayHit::new(ray.point_at(t), id, class),
            None => RayHit::miss(),
        }
    }
}

impl ModelCatalog for Scene {
    fn dimensions(&self, model: ModelHash) -> Option<(Point3, Point3)> {
        self.models.get(&model).copied()
    }

    fn pose(&self, id: ObjectId) -> Option<ObjectPose> {
        self.objects.iter().find(|o| o.id == id).map(|o| o.pose)
    }
}
