use crate::Vec3;

/// A ray in 3D space with origin, direction and a parametric extent.
///
/// Intersections are only reported for `t` in `(Ray::EPSILON, t_max)`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub t_max: f32,
}

impl Ray {
    /// Self-intersection guard for rays leaving a surface.
    pub const EPSILON: f32 = 1e-3;

    /// Create an unbounded ray.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            t_max: f32::INFINITY,
        }
    }

    /// Create a ray that stops at `t_max`.
    pub fn bounded(origin: Vec3, direction: Vec3, t_max: f32) -> Self {
        Self {
            origin,
            direction,
            t_max,
        }
    }

    /// Create a segment from `from` towards `to`, stopping just short of `to`.
    ///
    /// Used for shadow tests; the direction is not normalized so `t` runs over `[0, 1]`.
    pub fn segment(from: Vec3, to: Vec3) -> Self {
        Self::bounded(from, to - from, 1.0 - Self::EPSILON)
    }

    /// Get the point along the ray at parameter t.
    ///
    /// Returns: origin + t * direction
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Whether `t` lies inside the valid hit range of this ray.
    #[inline]
    pub fn accepts(&self, t: f32) -> bool {
        Self::EPSILON < t && t < self.t_max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_at() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);

        assert_eq!(ray.at(0.0), Vec3::ZERO);
        assert_eq!(ray.at(1.0), Vec3::X);
        assert_eq!(ray.at(2.0), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(ray.at(-1.0), Vec3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn test_ray_accepts_excludes_epsilon_and_extent() {
        let ray = Ray::bounded(Vec3::ZERO, Vec3::Y, 5.0);

        assert!(!ray.accepts(0.0));
        assert!(!ray.accepts(Ray::EPSILON));
        assert!(ray.accepts(1.0));
        assert!(!ray.accepts(5.0));
    }

    #[test]
    fn test_segment_stops_short_of_target() {
        let from = Vec3::new(1.0, 0.0, 0.0);
        let to = Vec3::new(1.0, 4.0, 0.0);
        let ray = Ray::segment(from, to);

        assert!(ray.accepts(0.5));
        assert!(!ray.accepts(1.0));
        assert_eq!(ray.at(1.0), to);
    }
}
