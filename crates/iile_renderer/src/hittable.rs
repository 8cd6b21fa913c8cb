//! Hittable trait and SurfaceHit for ray-object intersection.

use crate::material::{Bsdf, Color};
use iile_math::{Ray, Vec3};

/// Record of a ray-object intersection.
#[derive(Clone, Copy)]
pub struct SurfaceHit<'a> {
    /// Point of intersection
    pub p: Vec3,
    /// Unit surface normal at the intersection (always points against the ray)
    pub normal: Vec3,
    /// Parameter t where the intersection occurs
    pub t: f32,
    /// Whether the ray hit the front face (outside) of the surface
    pub front_face: bool,
    /// Scattering at the intersection point
    pub bsdf: &'a dyn Bsdf,
    /// Radiance emitted from the front face
    pub emission: Color,
    /// Index into the scene's light list when the surface is an area light
    pub light: Option<usize>,
}

impl<'a> SurfaceHit<'a> {
    /// Build a hit record, orienting the normal against the ray.
    pub fn new(ray: &Ray, t: f32, outward_normal: Vec3, bsdf: &'a dyn Bsdf) -> Self {
        let mut hit = Self {
            p: ray.at(t),
            normal: outward_normal,
            t,
            front_face: true,
            bsdf,
            emission: Color::ZERO,
            light: None,
        };
        hit.set_face_normal(ray, outward_normal);
        hit
    }

    /// Set the face normal based on ray direction and outward normal.
    ///
    /// The normal is always stored pointing against the ray direction,
    /// so we need to track whether we hit the front or back face.
    pub fn set_face_normal(&mut self, ray: &Ray, outward_normal: Vec3) {
        // If the ray and normal point in the same direction, we're inside
        self.front_face = ray.direction.dot(outward_normal) < 0.0;

        // Normal always points against the ray
        self.normal = if self.front_face {
            outward_normal
        } else {
            -outward_normal
        };
    }

    /// Radiance emitted from the hit point towards `w`.
    pub fn le(&self, w: Vec3) -> Color {
        if self.front_face && self.normal.dot(w) > 0.0 {
            self.emission
        } else {
            Color::ZERO
        }
    }
}

/// Trait for objects that can be hit by rays.
pub trait Hittable: Send + Sync {
    /// Closest hit with `t` inside the ray's accepted range.
    fn hit<'a>(&'a self, ray: &Ray) -> Option<SurfaceHit<'a>>;
}

/// A list of hittable objects.
#[derive(Default)]
pub struct HittableList {
    objects: Vec<Box<dyn Hittable>>,
}

impl HittableList {
    /// Create a new empty hittable list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object to the list.
    pub fn add(&mut self, object: Box<dyn Hittable>) {
        self.objects.push(object);
    }

    /// Get the number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl Hittable for HittableList {
    fn hit<'a>(&'a self, ray: &Ray) -> Option<SurfaceHit<'a>> {
        let mut closest = *ray;
        let mut result = None;

        for object in &self.objects {
            if let Some(hit) = object.hit(&closest) {
                closest.t_max = hit.t;
                result = Some(hit);
            }
        }

        result
    }
}
