//! Camera for primary ray generation.

use iile_math::{Ray, Vec2, Vec3};

/// Source of primary rays through image pixels.
pub trait CameraRays: Sync {
    /// Ray through pixel `(x, y)`, offset inside the pixel by `u` in `[0,1)^2`.
    fn generate_ray(&self, x: u32, y: u32, u: Vec2) -> Ray;
}

/// Pinhole perspective camera.
#[derive(Clone, Debug)]
pub struct PinholeCamera {
    image_width: u32,
    image_height: u32,

    // Camera positioning
    look_from: Vec3,
    look_at: Vec3,
    vup: Vec3,

    /// Vertical field of view in degrees
    vfov: f32,

    // Cached computed values (set by initialize())
    pixel00_loc: Vec3,
    pixel_delta_u: Vec3,
    pixel_delta_v: Vec3,
}

impl Default for PinholeCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl PinholeCamera {
    /// Create a new camera with default settings.
    pub fn new() -> Self {
        let mut camera = Self {
            image_width: 640,
            image_height: 480,
            look_from: Vec3::ZERO,
            look_at: Vec3::new(0.0, 0.0, -1.0),
            vup: Vec3::Y,
            vfov: 90.0,
            pixel00_loc: Vec3::ZERO,
            pixel_delta_u: Vec3::ZERO,
            pixel_delta_v: Vec3::ZERO,
        };
        camera.initialize();
        camera
    }

    /// Set image resolution.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.image_width = width.max(1);
        self.image_height = height.max(1);
        self.initialize();
        self
    }

    /// Set camera position.
    pub fn with_position(mut self, look_from: Vec3, look_at: Vec3, vup: Vec3) -> Self {
        self.look_from = look_from;
        self.look_at = look_at;
        self.vup = vup;
        self.initialize();
        self
    }

    /// Set the vertical field of view in degrees.
    pub fn with_fov(mut self, vfov: f32) -> Self {
        self.vfov = vfov;
        self.initialize();
        self
    }

    pub fn position(&self) -> Vec3 {
        self.look_from
    }

    fn initialize(&mut self) {
        // Calculate viewport dimensions on the plane one unit in front
        let theta = self.vfov.to_radians();
        let h = (theta / 2.0).tan();
        let viewport_height = 2.0 * h;
        let viewport_width = viewport_height * (self.image_width as f32 / self.image_height as f32);

        // Calculate camera basis vectors
        let w = (self.look_from - self.look_at).normalize_or_zero();
        let u = self.vup.cross(w).normalize_or_zero();
        let v = w.cross(u);

        let viewport_u = viewport_width * u;
        let viewport_v = -viewport_height * v;

        self.pixel_delta_u = viewport_u / self.image_width as f32;
        self.pixel_delta_v = viewport_v / self.image_height as f32;

        // Upper left corner of pixel (0, 0)
        self.pixel00_loc = self.look_from - w - viewport_u / 2.0 - viewport_v / 2.0;
    }
}

impl CameraRays for PinholeCamera {
    fn generate_ray(&self, x: u32, y: u32, u: Vec2) -> Ray {
        let pixel_sample = self.pixel00_loc
            + (x as f32 + u.x) * self.pixel_delta_u
            + (y as f32 + u.y) * self.pixel_delta_v;
        Ray::new(self.look_from, (pixel_sample - self.look_from).normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centre_ray_points_at_target() {
        let camera = PinholeCamera::new()
            .with_resolution(100, 100)
            .with_position(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);

        let ray = camera.generate_ray(50, 50, Vec2::ZERO);
        assert_eq!(ray.origin, Vec3::new(0.0, 0.0, 5.0));
        assert!((ray.direction - -Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn test_image_corners_follow_fov() {
        let camera = PinholeCamera::new().with_resolution(10, 10).with_fov(90.0);

        // Top-left corner of the image: x runs right, y runs down
        let ray = camera.generate_ray(0, 0, Vec2::ZERO);
        let expected = Vec3::new(-1.0, 1.0, -1.0).normalize();
        assert!((ray.direction - expected).length() < 1e-5);

        let ray = camera.generate_ray(9, 9, Vec2::ONE);
        let expected = Vec3::new(1.0, -1.0, -1.0).normalize();
        assert!((ray.direction - expected).length() < 1e-5);
    }

    #[test]
    fn test_rays_are_normalized() {
        let camera = PinholeCamera::new().with_resolution(64, 32).with_fov(40.0);
        for (x, y) in [(0, 0), (63, 31), (20, 10)] {
            let ray = camera.generate_ray(x, y, Vec2::splat(0.5));
            assert!((ray.direction.length() - 1.0).abs() < 1e-5);
        }
    }
}
