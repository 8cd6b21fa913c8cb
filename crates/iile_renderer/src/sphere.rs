//! Sphere primitive for ray tracing.

use crate::{
    hittable::{Hittable, SurfaceHit},
    material::{Bsdf, Color},
};
use iile_math::{Ray, Vec3};
use std::f32::consts::PI;

/// A sphere primitive, optionally emissive.
pub struct Sphere<B: Bsdf> {
    center: Vec3,
    radius: f32,
    bsdf: B,
    emission: Color,
    light: Option<usize>,
}

impl<B: Bsdf> Sphere<B> {
    /// Create a new sphere.
    pub fn new(center: Vec3, radius: f32, bsdf: B) -> Self {
        Self {
            center,
            radius: radius.max(0.0),
            bsdf,
            emission: Color::ZERO,
            light: None,
        }
    }

    /// Make the sphere an emitter tied to light `light_index` of the scene.
    pub fn with_emission(mut self, emission: Color, light_index: usize) -> Self {
        self.emission = emission;
        self.light = Some(light_index);
        self
    }

    pub fn area(&self) -> f32 {
        4.0 * PI * self.radius * self.radius
    }
}

/// Nearest accepted root of `ray` against a sphere.
pub(crate) fn intersect_sphere(center: Vec3, radius: f32, ray: &Ray) -> Option<f32> {
    let oc = center - ray.origin;
    let a = ray.direction.length_squared();
    let h = ray.direction.dot(oc);
    let c = oc.length_squared() - radius * radius;

    let discriminant = h * h - a * c;
    if discriminant < 0.0 || a == 0.0 {
        return None;
    }

    let sqrtd = discriminant.sqrt();

    // Find the nearest root in the acceptable range
    let mut root = (h - sqrtd) / a;
    if !ray.accepts(root) {
        root = (h + sqrtd) / a;
        if !ray.accepts(root) {
            return None;
        }
    }
    Some(root)
}

impl<B: Bsdf> Hittable for Sphere<B> {
    fn hit<'a>(&'a self, ray: &Ray) -> Option<SurfaceHit<'a>> {
        let t = intersect_sphere(self.center, self.radius, ray)?;
        let outward_normal = (ray.at(t) - self.center) / self.radius;
        let mut hit = SurfaceHit::new(ray, t, outward_normal, &self.bsdf);
        hit.emission = self.emission;
        hit.light = self.light;
        Some(hit)
    }
}
