//! Gaussian reconstruction filter used to splat sparse estimates.
//!
//! `sigma` is a third of the radius, and the curve is rescaled so the centre
//! pixel has weight exactly 1. At the radius the weight bottoms out at
//! `exp(-4.5)`; beyond it the weight is 0.

use std::f64::consts::TAU;

use iile_math::PixelBounds;

/// Gaussian splatting kernel with a cached peak scaling factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianFilter {
    radius: f64,
    sigma: f64,
    peak: f64,
}

fn gaussian(distance: f64, sigma: f64) -> f64 {
    (-(distance * distance) / (2.0 * sigma * sigma)).exp() / (sigma * TAU.sqrt())
}

impl GaussianFilter {
    /// Kernel for `radius` pixels. Non-positive radii are clamped to a tiny
    /// positive value so only the centre pixel receives weight.
    pub fn new(radius: f32) -> Self {
        let radius = if radius.is_finite() && radius > 0.0 {
            radius as f64
        } else {
            1e-3
        };
        let sigma = radius / 3.0;
        Self {
            radius,
            sigma,
            peak: gaussian(0.0, sigma),
        }
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Factor that lifts the Gaussian peak to 1.
    pub fn scaling_factor(&self) -> f64 {
        1.0 / self.peak
    }

    /// Weight of the filter pixel `(fx, fy)` for a sample centred on `(cx, cy)`.
    pub fn weight(&self, cx: i64, cy: i64, fx: i64, fy: i64) -> f64 {
        let dx = (fx - cx) as f64;
        let dy = (fy - cy) as f64;
        let distance = (dx * dx + dy * dy).sqrt();
        if distance > self.radius {
            return 0.0;
        }
        gaussian(distance, self.sigma) / self.peak
    }

    /// Pixels within the radius of `(cx, cy)`, clipped to `bounds`, with
    /// their weights.
    pub fn footprint(
        &self,
        cx: i64,
        cy: i64,
        bounds: &PixelBounds,
    ) -> impl Iterator<Item = (i64, i64, f64)> + '_ {
        let reach = self.radius.floor() as i64;
        let x0 = (cx - reach).max(bounds.x0 as i64);
        let x1 = (cx + reach).min(bounds.x1 as i64 - 1);
        let y0 = (cy - reach).max(bounds.y0 as i64);
        let y1 = (cy + reach).min(bounds.y1 as i64 - 1);

        (y0..=y1)
            .flat_map(move |fy| (x0..=x1).map(move |fx| (fx, fy)))
            .map(move |(fx, fy)| (fx, fy, self.weight(cx, cy, fx, fy)))
            .filter(|&(_, _, w)| w > 0.0)
    }
}

/// Filter weight of pixel `(fx, fy)` for a sample at `(cx, cy)`.
pub fn compute_filter_weight(cx: i64, cy: i64, fx: i64, fy: i64, radius: f32) -> f64 {
    GaussianFilter::new(radius).weight(cx, cy, fx, fy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centre_has_unit_weight() {
        for radius in [0.5, 1.0, 2.5, 3.0, 16.0] {
            assert_eq!(compute_filter_weight(7, -3, 7, -3, radius), 1.0);
        }
    }

    #[test]
    fn test_weight_decreases_with_distance() {
        let filter = GaussianFilter::new(5.0);
        let mut previous = filter.weight(0, 0, 0, 0);
        for d in 1..=5 {
            let w = filter.weight(0, 0, d, 0);
            assert!(w < previous, "weight at {} did not decrease", d);
            assert!(w > 0.0);
            previous = w;
        }
    }

    #[test]
    fn test_boundary_floor_and_cutoff() {
        let filter = GaussianFilter::new(3.0);
        let edge = filter.weight(0, 0, 3, 0);
        assert!((edge - (-4.5f64).exp()).abs() < 1e-9);
        assert_eq!(filter.weight(0, 0, 4, 0), 0.0);
        assert_eq!(filter.weight(0, 0, 3, 3), 0.0);
    }

    #[test]
    fn test_weight_is_symmetric() {
        let filter = GaussianFilter::new(4.0);
        assert_eq!(filter.weight(10, 10, 12, 11), filter.weight(10, 10, 8, 9));
        assert_eq!(filter.weight(10, 10, 11, 12), filter.weight(10, 10, 12, 11));
    }

    #[test]
    fn test_footprint_is_clipped() {
        let filter = GaussianFilter::new(2.0);
        let bounds = PixelBounds::from_resolution(10, 10);

        let inside: Vec<_> = filter.footprint(5, 5, &bounds).collect();
        // Disc of radius 2 on the integer grid holds 13 pixels.
        assert_eq!(inside.len(), 13);

        let corner: Vec<_> = filter.footprint(0, 0, &bounds).collect();
        assert!(corner.iter().all(|&(x, y, _)| x >= 0 && y >= 0));
        assert_eq!(corner.len(), 6);
    }

    #[test]
    fn test_tiny_radius_only_hits_centre() {
        let filter = GaussianFilter::new(0.0);
        let bounds = PixelBounds::from_resolution(4, 4);
        let pixels: Vec<_> = filter.footprint(1, 1, &bounds).collect();
        assert_eq!(pixels, vec![(1, 1, 1.0)]);
    }
}
