// Re-export glam for convenience
pub use glam::*;

// IILE math types
mod bounds;
mod ray;
mod sampling;

pub use bounds::PixelBounds;
pub use ray::Ray;
pub use sampling::{
    cosine_hemisphere_pdf, hemisphere_pixel_direction, hemisphere_pixel_solid_angle,
    sample_cosine_hemisphere, sample_uniform_sphere, Distribution1D, Frame,
};

/// Rec. 709 luminance of a linear RGB triple.
#[inline]
pub fn luminance(rgb: Vec3) -> f32 {
    0.2126 * rgb.x + 0.7152 * rgb.y + 0.0722 * rgb.z
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luminance_of_white_is_one() {
        assert!((luminance(Vec3::ONE) - 1.0).abs() < 1e-6);
        assert_eq!(luminance(Vec3::ZERO), 0.0);
    }

    #[test]
    fn test_luminance_weights_green_highest() {
        let r = luminance(Vec3::X);
        let g = luminance(Vec3::Y);
        let b = luminance(Vec3::Z);
        assert!(g > r && r > b);
    }
}
