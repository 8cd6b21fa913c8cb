//! BSDF interface for surface scattering.

use iile_math::{cosine_hemisphere_pdf, sample_cosine_hemisphere, Frame, Vec2, Vec3};
use std::f32::consts::FRAC_1_PI;

/// Color type alias (linear RGB)
pub type Color = Vec3;

/// A direction drawn from a BSDF.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BsdfSample {
    /// Sampled incident direction (world space, unit length)
    pub wi: Vec3,
    /// BSDF value for `(wo, wi)`
    pub f: Color,
    /// Solid angle density of `wi`
    pub pdf: f32,
}

/// Trait for materials that describe how light scatters at a surface.
///
/// All directions are world space and point away from the surface. `normal`
/// is the shading normal on the side the outgoing direction lies.
pub trait Bsdf: Send + Sync {
    /// Evaluate the BSDF for a pair of directions.
    fn f(&self, wo: Vec3, wi: Vec3, normal: Vec3) -> Color;

    /// Draw an incident direction given `u` in `[0,1)^2`.
    fn sample_f(&self, wo: Vec3, normal: Vec3, u: Vec2) -> Option<BsdfSample>;

    /// Solid angle density that `sample_f` produces `wi`.
    fn pdf(&self, wo: Vec3, wi: Vec3, normal: Vec3) -> f32;
}

/// Lambertian (diffuse) reflector.
#[derive(Debug, Clone, Copy)]
pub struct Lambertian {
    albedo: Color,
}

impl Lambertian {
    /// Create a new Lambertian material with the given albedo color.
    pub fn new(albedo: Color) -> Self {
        Self { albedo }
    }

    /// A surface that reflects nothing, e.g. the body of an emitter.
    pub fn black() -> Self {
        Self::new(Color::ZERO)
    }

    pub fn albedo(&self) -> Color {
        self.albedo
    }
}

fn same_side(wo: Vec3, wi: Vec3, normal: Vec3) -> bool {
    wo.dot(normal) > 0.0 && wi.dot(normal) > 0.0
}

impl Bsdf for Lambertian {
    fn f(&self, wo: Vec3, wi: Vec3, normal: Vec3) -> Color {
        if same_side(wo, wi, normal) {
            self.albedo * FRAC_1_PI
        } else {
            Color::ZERO
        }
    }

    fn sample_f(&self, wo: Vec3, normal: Vec3, u: Vec2) -> Option<BsdfSample> {
        if wo.dot(normal) <= 0.0 {
            return None;
        }
        let local = sample_cosine_hemisphere(u);
        // Catch directions grazing the horizon
        if local.z <= 1e-6 {
            return None;
        }
        let wi = Frame::from_normal(normal).to_world(local);
        Some(BsdfSample {
            wi,
            f: self.albedo * FRAC_1_PI,
            pdf: cosine_hemisphere_pdf(local.z),
        })
    }

    fn pdf(&self, wo: Vec3, wi: Vec3, normal: Vec3) -> f32 {
        if same_side(wo, wi, normal) {
            cosine_hemisphere_pdf(wi.dot(normal))
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lambertian_value_and_pdf() {
        let mat = Lambertian::new(Color::splat(0.5));
        let n = Vec3::Y;
        let wo = Vec3::new(0.0, 1.0, 1.0).normalize();
        let wi = Vec3::new(1.0, 1.0, 0.0).normalize();

        assert_eq!(mat.f(wo, wi, n), Color::splat(0.5 * FRAC_1_PI));
        assert!((mat.pdf(wo, wi, n) - wi.y * FRAC_1_PI).abs() < 1e-6);

        // Transmission through the surface is black
        assert_eq!(mat.f(wo, -wi, n), Color::ZERO);
        assert_eq!(mat.pdf(wo, -wi, n), 0.0);
    }

    #[test]
    fn test_lambertian_sample_matches_pdf() {
        let mat = Lambertian::new(Color::ONE);
        let n = Vec3::new(0.3, 0.9, -0.2).normalize();
        let wo = n;
        let sample = mat.sample_f(wo, n, Vec2::new(0.4, 0.7)).unwrap();

        assert!(sample.wi.dot(n) > 0.0);
        assert!((sample.pdf - mat.pdf(wo, sample.wi, n)).abs() < 1e-4);
        assert_eq!(sample.f, mat.f(wo, sample.wi, n));
    }

    #[test]
    fn test_black_reflects_nothing() {
        let mat = Lambertian::black();
        assert_eq!(mat.f(Vec3::Y, Vec3::Y, Vec3::Y), Color::ZERO);
    }
}
