//! Light sources sampled for direct lighting.

use crate::material::Color;
use crate::sphere::intersect_sphere;
use iile_math::{luminance, sample_uniform_sphere, Ray, Vec2, Vec3};
use std::f32::consts::PI;

/// A point on a light chosen to illuminate a receiver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSample {
    /// Radiance arriving at the receiver, ignoring occlusion
    pub radiance: Color,
    /// Unit direction from the receiver towards the light
    pub wi: Vec3,
    /// Solid angle density of `wi` (1 for delta lights)
    pub pdf: f32,
    /// Sampled point on the light, target of the shadow ray
    pub point: Vec3,
}

pub trait Light: Send + Sync {
    /// Sample incident illumination at `receiver` given `u` in `[0,1)^2`.
    fn sample_li(&self, receiver: Vec3, u: Vec2) -> Option<LightSample>;

    /// Solid angle density that `sample_li` picks `wi` from `receiver`.
    fn pdf_li(&self, receiver: Vec3, wi: Vec3) -> f32;

    /// Whether the light can only be reached by explicit sampling.
    fn is_delta(&self) -> bool;

    /// Scalar emitted power used to choose between lights.
    fn power(&self) -> f32;
}

/// Isotropic point light.
#[derive(Debug, Clone, Copy)]
pub struct PointLight {
    position: Vec3,
    intensity: Color,
}

impl PointLight {
    pub fn new(position: Vec3, intensity: Color) -> Self {
        Self {
            position,
            intensity,
        }
    }
}

impl Light for PointLight {
    fn sample_li(&self, receiver: Vec3, _u: Vec2) -> Option<LightSample> {
        let to_light = self.position - receiver;
        let dist2 = to_light.length_squared();
        if dist2 <= 0.0 {
            return None;
        }
        Some(LightSample {
            radiance: self.intensity / dist2,
            wi: to_light / dist2.sqrt(),
            pdf: 1.0,
            point: self.position,
        })
    }

    fn pdf_li(&self, _receiver: Vec3, _wi: Vec3) -> f32 {
        0.0
    }

    fn is_delta(&self) -> bool {
        true
    }

    fn power(&self) -> f32 {
        4.0 * PI * luminance(self.intensity)
    }
}

/// Spherical area light with uniform emitted radiance.
///
/// Sampled uniformly by area; points on the far side of the sphere are
/// rejected, which wastes samples but keeps the estimator unbiased.
#[derive(Debug, Clone, Copy)]
pub struct SphereLight {
    center: Vec3,
    radius: f32,
    radiance: Color,
}

impl SphereLight {
    pub fn new(center: Vec3, radius: f32, radiance: Color) -> Self {
        Self {
            center,
            radius: radius.max(0.0),
            radiance,
        }
    }

    pub fn area(&self) -> f32 {
        4.0 * PI * self.radius * self.radius
    }
}

impl Light for SphereLight {
    fn sample_li(&self, receiver: Vec3, u: Vec2) -> Option<LightSample> {
        let area = self.area();
        if area <= 0.0 {
            return None;
        }
        let n = sample_uniform_sphere(u);
        let point = self.center + n * self.radius;
        let to_light = point - receiver;
        let dist2 = to_light.length_squared();
        if dist2 <= 0.0 {
            return None;
        }
        let wi = to_light / dist2.sqrt();
        let cos_light = -n.dot(wi);
        if cos_light <= 0.0 {
            return None;
        }
        Some(LightSample {
            radiance: self.radiance,
            wi,
            pdf: dist2 / (cos_light * area),
            point,
        })
    }

    fn pdf_li(&self, receiver: Vec3, wi: Vec3) -> f32 {
        let area = self.area();
        if area <= 0.0 {
            return 0.0;
        }
        let ray = Ray::new(receiver, wi);
        let Some(t) = intersect_sphere(self.center, self.radius, &ray) else {
            return 0.0;
        };
        let point = ray.at(t);
        let n = (point - self.center) / self.radius;
        let cos_light = -n.dot(wi);
        if cos_light <= 0.0 {
            return 0.0;
        }
        (point - receiver).length_squared() / (cos_light * area)
    }

    fn is_delta(&self) -> bool {
        false
    }

    fn power(&self) -> f32 {
        PI * self.area() * luminance(self.radiance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_light_falls_off_with_distance() {
        let light = PointLight::new(Vec3::new(0.0, 2.0, 0.0), Color::splat(8.0));
        let sample = light.sample_li(Vec3::ZERO, Vec2::ZERO).unwrap();
        assert_eq!(sample.radiance, Color::splat(2.0));
        assert_eq!(sample.wi, Vec3::Y);
        assert!(light.is_delta());
        assert_eq!(light.pdf_li(Vec3::ZERO, Vec3::Y), 0.0);
    }

    #[test]
    fn test_sphere_light_sample_pdf_agrees() {
        let light = SphereLight::new(Vec3::new(0.0, 5.0, 0.0), 1.0, Color::ONE);
        let receiver = Vec3::ZERO;
        let mut accepted = 0;
        for i in 0..64 {
            let u = Vec2::new((i % 8) as f32 + 0.5, (i / 8) as f32 + 0.5) / 8.0;
            if let Some(sample) = light.sample_li(receiver, u) {
                accepted += 1;
                let pdf = light.pdf_li(receiver, sample.wi);
                assert!(
                    (pdf - sample.pdf).abs() / sample.pdf < 1e-2,
                    "sample pdf {} vs lookup {}",
                    sample.pdf,
                    pdf
                );
            }
        }
        // Roughly half the sphere faces the receiver
        assert!(accepted > 16 && accepted < 48, "accepted {accepted}");
    }

    #[test]
    fn test_sphere_light_pdf_zero_when_missing() {
        let light = SphereLight::new(Vec3::new(0.0, 5.0, 0.0), 1.0, Color::ONE);
        assert_eq!(light.pdf_li(Vec3::ZERO, -Vec3::Y), 0.0);
        assert!(!light.is_delta());
    }

    #[test]
    fn test_power_scales_with_radiance() {
        let dim = SphereLight::new(Vec3::ZERO, 1.0, Color::ONE);
        let bright = SphereLight::new(Vec3::ZERO, 1.0, Color::splat(3.0));
        assert!((bright.power() - 3.0 * dim.power()).abs() < 1e-3);
    }
}
