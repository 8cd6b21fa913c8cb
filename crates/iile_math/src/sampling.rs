//! Sampling helpers shared by the hemisphere builder, the light sampler and
//! the BSDFs.
//!
//! Hemisphere rasters use a polar layout: rows span the polar angle from the
//! shading normal (row 0) down to the horizon, columns span the full azimuth.
//! Each pixel covers an equal azimuth slice and an equal polar slice, so its
//! solid angle shrinks towards the pole.

use crate::{Vec2, Vec3};
use std::f32::consts::{FRAC_1_PI, FRAC_PI_2, PI, TAU};

/// Orthonormal shading frame around a normal.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    pub s: Vec3,
    pub t: Vec3,
    pub n: Vec3,
}

impl Frame {
    /// Build a frame whose local +Z is `n` (Duff et al. 2017).
    pub fn from_normal(n: Vec3) -> Self {
        let n = n.normalize();
        let sign = 1.0_f32.copysign(n.z);
        let a = -1.0 / (sign + n.z);
        let b = n.x * n.y * a;
        let s = Vec3::new(1.0 + sign * n.x * n.x * a, sign * b, -sign * n.x);
        let t = Vec3::new(b, sign + n.y * n.y * a, -n.y);
        Self { s, t, n }
    }

    pub fn to_world(&self, v: Vec3) -> Vec3 {
        self.s * v.x + self.t * v.y + self.n * v.z
    }

    pub fn to_local(&self, v: Vec3) -> Vec3 {
        Vec3::new(v.dot(self.s), v.dot(self.t), v.dot(self.n))
    }
}

fn polar_band(row: u32, side: u32) -> (f32, f32) {
    let step = FRAC_PI_2 / side as f32;
    let theta0 = row as f32 * step;
    let theta1 = (row + 1) as f32 * step;
    (theta0.cos(), theta1.cos())
}

/// Local direction through hemisphere pixel `(col, row)` of a `side x side` raster.
///
/// `jitter` in `[0,1)^2` picks a point inside the pixel uniformly by solid
/// angle; `(0.5, 0.5)` gives the pixel centre.
pub fn hemisphere_pixel_direction(col: u32, row: u32, side: u32, jitter: Vec2) -> Vec3 {
    let (cos0, cos1) = polar_band(row, side);
    let cos_theta = cos0 + (cos1 - cos0) * jitter.y;
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let phi = (col as f32 + jitter.x) / side as f32 * TAU;
    Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
}

/// Solid angle covered by one pixel in `row` of a `side x side` hemisphere raster.
pub fn hemisphere_pixel_solid_angle(row: u32, side: u32) -> f32 {
    let (cos0, cos1) = polar_band(row, side);
    (cos0 - cos1) * TAU / side as f32
}

/// Cosine-weighted direction on the +Z hemisphere (Malley's method).
pub fn sample_cosine_hemisphere(u: Vec2) -> Vec3 {
    let r = u.x.sqrt();
    let phi = TAU * u.y;
    let z = (1.0 - u.x).max(0.0).sqrt();
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

pub fn cosine_hemisphere_pdf(cos_theta: f32) -> f32 {
    cos_theta.max(0.0) * FRAC_1_PI
}

/// Uniform direction on the unit sphere.
pub fn sample_uniform_sphere(u: Vec2) -> Vec3 {
    let z = 1.0 - 2.0 * u.x;
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = 2.0 * PI * u.y;
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

/// Piecewise-constant discrete distribution.
///
/// Negative or non-finite entries are treated as zero. When every entry is
/// zero the distribution degrades to uniform and `integral()` reports zero so
/// callers can pick a better fallback.
#[derive(Debug, Clone)]
pub struct Distribution1D {
    func: Vec<f32>,
    cdf: Vec<f32>,
    integral: f32,
}

impl Distribution1D {
    pub fn new(values: &[f32]) -> Self {
        let func: Vec<f32> = values
            .iter()
            .map(|&v| if v.is_finite() && v > 0.0 { v } else { 0.0 })
            .collect();
        let n = func.len();
        let mut cdf = Vec::with_capacity(n + 1);
        cdf.push(0.0);
        let mut running = 0.0f64;
        for &v in &func {
            running += v as f64;
            cdf.push(running as f32);
        }
        let integral = running as f32;
        if integral > 0.0 {
            for c in cdf.iter_mut() {
                *c /= integral;
            }
        } else {
            for (i, c) in cdf.iter_mut().enumerate() {
                *c = i as f32 / n.max(1) as f32;
            }
        }
        Self {
            func,
            cdf,
            integral,
        }
    }

    pub fn count(&self) -> usize {
        self.func.len()
    }

    /// Sum of the (sanitised) input values.
    pub fn integral(&self) -> f32 {
        self.integral
    }

    /// Probability of drawing entry `index`.
    pub fn pmf(&self, index: usize) -> f32 {
        if index >= self.func.len() {
            return 0.0;
        }
        if self.integral > 0.0 {
            self.func[index] / self.integral
        } else {
            1.0 / self.func.len() as f32
        }
    }

    /// Draw an entry with probability proportional to its value.
    ///
    /// Returns `None` for an empty distribution.
    pub fn sample_discrete(&self, u: f32) -> Option<(usize, f32)> {
        let n = self.func.len();
        if n == 0 {
            return None;
        }
        // Last cdf entry <= u, skipping zero-width buckets.
        let index = self.cdf[1..]
            .partition_point(|&c| c <= u)
            .min(n - 1);
        let index = if self.pmf(index) > 0.0 {
            index
        } else {
            (0..n).rev().find(|&i| self.pmf(i) > 0.0).unwrap_or(index)
        };
        Some((index, self.pmf(index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_is_orthonormal() {
        for n in [Vec3::Z, -Vec3::Z, Vec3::new(1.0, 2.0, -0.5).normalize()] {
            let f = Frame::from_normal(n);
            assert!(f.s.dot(f.t).abs() < 1e-5);
            assert!(f.s.dot(f.n).abs() < 1e-5);
            assert!(f.t.dot(f.n).abs() < 1e-5);
            let v = Vec3::new(0.3, -0.4, 0.8);
            let round = f.to_local(f.to_world(v));
            assert!((round - v).length() < 1e-5);
        }
    }

    #[test]
    fn test_hemisphere_pixels_cover_hemisphere() {
        let side = 16;
        let total: f32 = (0..side)
            .map(|row| hemisphere_pixel_solid_angle(row, side) * side as f32)
            .sum();
        assert!((total - TAU).abs() < 1e-3);
    }

    #[test]
    fn test_hemisphere_directions_stay_in_band() {
        let side = 8;
        for row in 0..side {
            let (cos0, cos1) = polar_band(row, side);
            for jitter in [Vec2::ZERO, Vec2::splat(0.5), Vec2::splat(0.999)] {
                let d = hemisphere_pixel_direction(3, row, side, jitter);
                assert!((d.length() - 1.0).abs() < 1e-5);
                assert!(d.z <= cos0 + 1e-6 && d.z >= cos1 - 1e-6);
            }
        }
    }

    #[test]
    fn test_cosine_hemisphere_above_horizon() {
        let d = sample_cosine_hemisphere(Vec2::new(0.25, 0.75));
        assert!(d.z > 0.0);
        assert!((d.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_distribution_proportional() {
        let dist = Distribution1D::new(&[1.0, 0.0, 3.0]);
        assert_eq!(dist.integral(), 4.0);
        assert_eq!(dist.pmf(0), 0.25);
        assert_eq!(dist.pmf(1), 0.0);
        assert_eq!(dist.pmf(2), 0.75);

        assert_eq!(dist.sample_discrete(0.1).map(|s| s.0), Some(0));
        assert_eq!(dist.sample_discrete(0.5).map(|s| s.0), Some(2));
        assert_eq!(dist.sample_discrete(0.9999).map(|s| s.0), Some(2));
    }

    #[test]
    fn test_distribution_never_returns_zero_entry() {
        let dist = Distribution1D::new(&[0.0, 2.0, 0.0, 0.0]);
        for u in [0.0, 0.25, 0.5, 0.999] {
            let (index, pmf) = dist.sample_discrete(u).unwrap();
            assert_eq!(index, 1);
            assert_eq!(pmf, 1.0);
        }
    }

    #[test]
    fn test_distribution_degenerate_is_uniform() {
        let dist = Distribution1D::new(&[0.0, f32::NAN, -1.0, 0.0]);
        assert_eq!(dist.integral(), 0.0);
        assert_eq!(dist.pmf(2), 0.25);
        assert!(dist.sample_discrete(0.6).is_some());
        assert!(Distribution1D::new(&[]).sample_discrete(0.5).is_none());
    }
}
