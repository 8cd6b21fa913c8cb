//! Shared radiance accumulation buffers.
//!
//! A [`FilmMonitor`] is written by every render thread at once. Each row has
//! its own lock, so threads working on different tiles rarely contend, and
//! every update is a self-contained weighted add: the merge result does not
//! depend on the order splats arrive in.

use std::sync::{Mutex, PoisonError};

use iile_core::Raster;
use iile_math::{DVec3, PixelBounds, Vec3};
use rayon::prelude::*;

use crate::filter::GaussianFilter;

/// Value reported for pixels that never received any weight.
pub const UNSAMPLED: f32 = 0.0;

#[derive(Debug, Clone, Copy, Default)]
struct FilmPixel {
    sum: DVec3,
    weight: f64,
}

pub struct FilmMonitor {
    bounds: PixelBounds,
    rows: Vec<Mutex<Vec<FilmPixel>>>,
}

impl FilmMonitor {
    /// Empty film covering `bounds`.
    pub fn new(bounds: PixelBounds) -> Self {
        let width = bounds.width() as usize;
        let rows = (0..bounds.height())
            .map(|_| Mutex::new(vec![FilmPixel::default(); width]))
            .collect();
        Self { bounds, rows }
    }

    pub fn bounds(&self) -> PixelBounds {
        self.bounds
    }

    fn row(&self, y: i64) -> std::sync::MutexGuard<'_, Vec<FilmPixel>> {
        let index = (y - self.bounds.y0 as i64) as usize;
        // A panicking writer can only have left a finished add behind.
        self.rows[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `radiance * weight` to pixel `(x, y)`.
    ///
    /// Pixels outside the film, non-finite radiance and non-positive or
    /// non-finite weights are dropped. Returns whether the splat landed.
    pub fn splat(&self, x: i64, y: i64, radiance: Vec3, weight: f64) -> bool {
        if !self.bounds.contains(x, y) {
            return false;
        }
        if !radiance.is_finite() || !(weight.is_finite() && weight > 0.0) {
            log::trace!("Dropping degenerate splat at ({}, {})", x, y);
            return false;
        }

        let lx = (x - self.bounds.x0 as i64) as usize;
        let mut row = self.row(y);
        let pixel = &mut row[lx];
        pixel.sum += radiance.as_dvec3() * weight;
        pixel.weight += weight;
        true
    }

    /// Splat `radiance` over the filter footprint centred on `(cx, cy)`.
    ///
    /// Returns the number of pixels that received weight.
    pub fn splat_filtered(&self, cx: i64, cy: i64, radiance: Vec3, filter: &GaussianFilter) -> usize {
        if !radiance.is_finite() {
            log::trace!("Dropping non-finite estimate at ({}, {})", cx, cy);
            return 0;
        }
        filter
            .footprint(cx, cy, &self.bounds)
            .filter(|&(fx, fy, w)| self.splat(fx, fy, radiance, w))
            .count()
    }

    /// Total weight accumulated at `(x, y)`, 0 outside the film.
    pub fn weight_at(&self, x: i64, y: i64) -> f64 {
        if !self.bounds.contains(x, y) {
            return 0.0;
        }
        let lx = (x - self.bounds.x0 as i64) as usize;
        self.row(y)[lx].weight
    }

    /// Fraction of pixels that have received any weight.
    pub fn coverage(&self) -> f64 {
        let area = self.bounds.area();
        if area == 0 {
            return 0.0;
        }
        let covered: usize = (0..self.bounds.height())
            .map(|ly| {
                self.row(self.bounds.y0 as i64 + ly as i64)
                    .iter()
                    .filter(|p| p.weight > 0.0)
                    .count()
            })
            .sum();
        covered as f64 / area as f64
    }

    /// Weighted average of every pixel as an RGB raster.
    ///
    /// Unsampled pixels read as [`UNSAMPLED`]. Safe to call while threads
    /// are still splatting; each row is read under its own lock.
    pub fn snapshot(&self) -> Raster {
        let width = self.bounds.width();
        let height = self.bounds.height();
        let data: Vec<f32> = self
            .rows
            .par_iter()
            .flat_map_iter(|row| {
                let row = row.lock().unwrap_or_else(PoisonError::into_inner);
                row.iter()
                    .flat_map(|p| {
                        if p.weight > 0.0 {
                            (p.sum / p.weight).as_vec3().to_array()
                        } else {
                            [UNSAMPLED; 3]
                        }
                    })
                    .collect::<Vec<f32>>()
            })
            .collect();

        let mut raster = Raster::new(width, height, 3);
        raster.data_mut().copy_from_slice(&data);
        raster
    }
}
