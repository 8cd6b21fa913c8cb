//! Mean-centering transforms applied around an oracle exchange.
//!
//! Upstream, intensities are rescaled to `(v - mean) / mean` so the oracle
//! sees zero-centred, unit-scale input whatever the scene exposure.
//! Downstream inverts that with the same mean: `v * mean + mean`.
//! A mean that is zero, tiny or non-finite makes both transforms identities.

use iile_core::Raster;

/// Means below this magnitude are treated as degenerate.
const MIN_MEAN: f32 = 1e-6;

/// Effective mean used by the transforms, or `None` for the identity.
fn effective_mean(mean: f32) -> Option<f32> {
    (mean.is_finite() && mean.abs() > MIN_MEAN).then_some(mean)
}

/// Scale a raster into the oracle's input range.
pub fn upstream_transform(raster: &Raster, mean: f32) -> Raster {
    let mut out = raster.clone();
    if let Some(m) = effective_mean(mean) {
        out.map_in_place(|v| (v - m) / m);
    }
    out
}

/// Inverse of [`upstream_transform`] for the same `mean`.
pub fn downstream_transform(raster: &Raster, mean: f32) -> Raster {
    let mut out = raster.clone();
    if let Some(m) = effective_mean(mean) {
        out.map_in_place(|v| v * m + m);
    }
    out
}

/// The pair of normalization scalars for one oracle exchange.
///
/// Measured once from the hemisphere rasters and then threaded, unchanged,
/// through both the upstream and downstream step, so the two sides of an
/// exchange can never use different means.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NormalizationState {
    intensity_mean: f32,
    distance_mean: f32,
}

impl NormalizationState {
    /// Measure the means of an intensity and a distance raster.
    ///
    /// Distance pixels with no hit (negative) are left out of the distance mean.
    pub fn measure(intensity: &Raster, distance: &Raster) -> Self {
        let hits: Vec<f64> = distance
            .data()
            .iter()
            .filter(|&&d| d >= 0.0 && d.is_finite())
            .map(|&d| d as f64)
            .collect();
        let distance_mean = if hits.is_empty() {
            0.0
        } else {
            (hits.iter().sum::<f64>() / hits.len() as f64) as f32
        };
        Self {
            intensity_mean: intensity.mean(),
            distance_mean,
        }
    }

    pub fn intensity_mean(&self) -> f32 {
        self.intensity_mean
    }

    pub fn distance_mean(&self) -> f32 {
        self.distance_mean
    }

    /// Scalars as they go on the wire: `(intensity, distance)`.
    pub fn wire_scalars(&self) -> (f32, f32) {
        (self.intensity_mean, self.distance_mean)
    }

    /// Whether the intensity transform degenerates to the identity.
    pub fn is_identity(&self) -> bool {
        effective_mean(self.intensity_mean).is_none()
    }

    pub fn upstream(&self, intensity: &Raster) -> Raster {
        upstream_transform(intensity, self.intensity_mean)
    }

    pub fn downstream(&self, prediction: &Raster) -> Raster {
        downstream_transform(prediction, self.intensity_mean)
    }
}
