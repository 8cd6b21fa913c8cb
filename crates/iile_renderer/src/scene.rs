//! Scene access for the render threads.

use crate::hittable::{Hittable, HittableList, SurfaceHit};
use crate::light::{Light, PointLight, SphereLight};
use crate::material::{Color, Lambertian};
use crate::sphere::Sphere;
use iile_math::{Distribution1D, Ray, Vec3};

/// Read-only view of the scene shared by every render thread.
pub trait SceneAccess: Sync {
    /// Closest surface hit by `ray`.
    fn intersect(&self, ray: &Ray) -> Option<SurfaceHit<'_>>;

    /// Whether nothing blocks the segment between two points.
    fn unoccluded(&self, from: Vec3, to: Vec3) -> bool {
        self.intersect(&Ray::segment(from, to)).is_none()
    }

    /// Radiance arriving along a ray that leaves the scene.
    fn background(&self, direction: Vec3) -> Color;

    fn lights(&self) -> &[Box<dyn Light>];

    /// Distribution for picking a light, proportional to power.
    fn light_distribution(&self) -> &Distribution1D;
}

/// A list of objects and lights under a constant background.
pub struct Scene {
    objects: HittableList,
    lights: Vec<Box<dyn Light>>,
    light_distribution: Distribution1D,
    background: Color,
}

impl Scene {
    pub fn new(background: Color) -> Self {
        Self {
            objects: HittableList::new(),
            lights: Vec::new(),
            light_distribution: Distribution1D::new(&[]),
            background,
        }
    }

    /// Add a non-emissive object.
    pub fn add(&mut self, object: Box<dyn Hittable>) {
        self.objects.add(object);
    }

    pub fn add_point_light(&mut self, position: Vec3, intensity: Color) {
        self.push_light(Box::new(PointLight::new(position, intensity)));
    }

    /// Add a sphere that both blocks rays and emits `radiance`.
    pub fn add_sphere_light(&mut self, center: Vec3, radius: f32, radiance: Color) {
        let index = self.lights.len();
        self.objects.add(Box::new(
            Sphere::new(center, radius, Lambertian::black()).with_emission(radiance, index),
        ));
        self.push_light(Box::new(SphereLight::new(center, radius, radiance)));
    }

    fn push_light(&mut self, light: Box<dyn Light>) {
        self.lights.push(light);
        let powers: Vec<f32> = self.lights.iter().map(|l| l.power()).collect();
        self.light_distribution = Distribution1D::new(&powers);
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

impl SceneAccess for Scene {
    fn intersect(&self, ray: &Ray) -> Option<SurfaceHit<'_>> {
        self.objects.hit(ray)
    }

    fn background(&self, _direction: Vec3) -> Color {
        self.background
    }

    fn lights(&self) -> &[Box<dyn Light>] {
        &self.lights
    }

    fn light_distribution(&self) -> &Distribution1D {
        &self.light_distribution
    }
}
