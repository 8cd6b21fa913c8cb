//! Plain floating point rasters exchanged with the irradiance oracle.
//!
//! A `Raster` is a row-major `width x height` grid with a fixed number of
//! float channels per pixel. The origin convention is whatever the producer
//! used; nothing here flips rows.

use iile_math::Vec3;
use thiserror::Error;

/// Errors raised when building a raster from existing data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RasterError {
    #[error("raster data has {actual} floats, expected {expected} ({width}x{height}x{components})")]
    DataLength {
        width: u32,
        height: u32,
        components: usize,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    width: u32,
    height: u32,
    components: usize,
    data: Vec<f32>,
}

impl Raster {
    /// Create a zero-filled raster.
    pub fn new(width: u32, height: u32, components: usize) -> Self {
        Self::filled(width, height, components, 0.0)
    }

    /// Create a raster with every channel of every pixel set to `value`.
    pub fn filled(width: u32, height: u32, components: usize, value: f32) -> Self {
        Self {
            width,
            height,
            components,
            data: vec![value; width as usize * height as usize * components],
        }
    }

    /// Wrap existing row-major data.
    pub fn from_data(
        width: u32,
        height: u32,
        components: usize,
        data: Vec<f32>,
    ) -> Result<Self, RasterError> {
        let expected = width as usize * height as usize * components;
        if data.len() != expected {
            return Err(RasterError::DataLength {
                width,
                height,
                components,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            components,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Channels per pixel.
    pub fn components(&self) -> usize {
        self.components
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// All samples, row-major with channels interleaved.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        (y as usize * self.width as usize + x as usize) * self.components
    }

    /// Channels of pixel `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> &[f32] {
        let o = self.offset(x, y);
        &self.data[o..o + self.components]
    }

    pub fn pixel_mut(&mut self, x: u32, y: u32) -> &mut [f32] {
        let o = self.offset(x, y);
        let c = self.components;
        &mut self.data[o..o + c]
    }

    /// First channel of pixel `(x, y)`.
    pub fn get_single(&self, x: u32, y: u32) -> f32 {
        self.pixel(x, y).first().copied().unwrap_or(0.0)
    }

    pub fn set_single(&mut self, x: u32, y: u32, value: f32) {
        if let Some(v) = self.pixel_mut(x, y).first_mut() {
            *v = value;
        }
    }

    /// Pixel as RGB. Single channel rasters are broadcast to grey.
    pub fn get_rgb(&self, x: u32, y: u32) -> Vec3 {
        match self.pixel(x, y) {
            [v] => Vec3::splat(*v),
            [r, g, b, ..] => Vec3::new(*r, *g, *b),
            [r, g] => Vec3::new(*r, *g, 0.0),
            [] => Vec3::ZERO,
        }
    }

    /// Store an RGB value. Single channel rasters keep the first channel only.
    pub fn set_rgb(&mut self, x: u32, y: u32, rgb: Vec3) {
        let rgb = rgb.to_array();
        for (dst, src) in self.pixel_mut(x, y).iter_mut().zip(rgb) {
            *dst = src;
        }
    }

    /// Apply `f` to every sample in place.
    pub fn map_in_place(&mut self, f: impl Fn(f32) -> f32) {
        for v in &mut self.data {
            *v = f(*v);
        }
    }

    /// Arithmetic mean over every sample, or 0 for an empty raster.
    pub fn mean(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.data.iter().map(|&v| v as f64).sum();
        (sum / self.data.len() as f64) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_zeroed() {
        let r = Raster::new(3, 2, 3);
        assert_eq!(r.data().len(), 18);
        assert!(r.data().iter().all(|&v| v == 0.0));
        assert_eq!(r.pixel_count(), 6);
    }

    #[test]
    fn test_from_data_checks_length() {
        assert!(Raster::from_data(2, 2, 1, vec![1.0, 2.0, 3.0, 4.0]).is_ok());
        let err = Raster::from_data(2, 2, 3, vec![0.0; 4]).unwrap_err();
        assert_eq!(
            err,
            RasterError::DataLength {
                width: 2,
                height: 2,
                components: 3,
                expected: 12,
                actual: 4
            }
        );
    }

    #[test]
    fn test_pixels_are_row_major() {
        let r = Raster::from_data(2, 2, 1, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(r.get_single(0, 0), 1.0);
        assert_eq!(r.get_single(1, 0), 2.0);
        assert_eq!(r.get_single(0, 1), 3.0);
        assert_eq!(r.get_single(1, 1), 4.0);
    }

    #[test]
    fn test_rgb_access() {
        let mut r = Raster::new(2, 1, 3);
        r.set_rgb(1, 0, Vec3::new(0.1, 0.2, 0.3));
        assert_eq!(r.pixel(1, 0), &[0.1, 0.2, 0.3]);
        assert_eq!(r.get_rgb(1, 0), Vec3::new(0.1, 0.2, 0.3));

        let mut grey = Raster::new(1, 1, 1);
        grey.set_rgb(0, 0, Vec3::new(0.7, 0.2, 0.3));
        assert_eq!(grey.get_rgb(0, 0), Vec3::splat(0.7));
    }

    #[test]
    fn test_mean_and_map() {
        let mut r = Raster::from_data(2, 1, 1, vec![1.0, 3.0]).unwrap();
        assert_eq!(r.mean(), 2.0);
        r.map_in_place(|v| v * 2.0);
        assert_eq!(r.data(), &[2.0, 6.0]);
        assert_eq!(Raster::new(0, 0, 1).mean(), 0.0);
    }
}
