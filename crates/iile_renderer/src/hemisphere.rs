//! Hemisphere sample sets: the oracle's view of a shading point.
//!
//! A `side x side` raster covers the hemisphere above the shading normal.
//! Rows are polar bands from the pole down to the horizon, columns are
//! azimuth wedges; every pixel subtends the exact area of its band wedge.

use crate::direct::surface_radiance;
use crate::sampler::Sampler;
use crate::scene::SceneAccess;
use iile_core::Raster;
use iile_math::{
    hemisphere_pixel_direction, hemisphere_pixel_solid_angle, luminance, Frame, Ray, Vec2, Vec3,
};

/// Distance recorded for hemisphere pixels that see no geometry.
pub const MISS_DISTANCE: f32 = -1.0;

/// The three rasters sent to the oracle.
#[derive(Debug, Clone, PartialEq)]
pub struct HemisphereRasters {
    /// Luminance seen through each pixel, 1 channel
    pub intensity: Raster,
    /// Hit distance, or [`MISS_DISTANCE`], 1 channel
    pub distance: Raster,
    /// Hit normal in the shading frame, 3 channels
    pub normals: Raster,
}

impl HemisphereRasters {
    pub fn new(side: u32) -> Self {
        Self {
            intensity: Raster::new(side, side, 1),
            distance: Raster::filled(side, side, 1, MISS_DISTANCE),
            normals: Raster::new(side, side, 3),
        }
    }

    pub fn side(&self) -> u32 {
        self.intensity.width()
    }
}

/// Auxiliary camera that rasterizes the hemisphere above a shading point.
pub trait HemisphereCamera: Sync {
    fn rasterize(
        &self,
        scene: &dyn SceneAccess,
        origin: Vec3,
        frame: &Frame,
        side: u32,
        sampler: &mut dyn Sampler,
    ) -> HemisphereRasters;
}

/// Traces one ray through the centre of every hemisphere pixel.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHemisphereCamera;

impl HemisphereCamera for TracingHemisphereCamera {
    fn rasterize(
        &self,
        scene: &dyn SceneAccess,
        origin: Vec3,
        frame: &Frame,
        side: u32,
        sampler: &mut dyn Sampler,
    ) -> HemisphereRasters {
        let mut rasters = HemisphereRasters::new(side);

        for row in 0..side {
            for col in 0..side {
                let local = hemisphere_pixel_direction(col, row, side, Vec2::splat(0.5));
                let direction = frame.to_world(local);

                match scene.intersect(&Ray::new(origin, direction)) {
                    Some(hit) => {
                        let radiance = surface_radiance(scene, &hit, -direction, sampler);
                        rasters.intensity.set_single(col, row, luminance(radiance));
                        rasters.distance.set_single(col, row, hit.t);
                        rasters.normals.set_rgb(col, row, frame.to_local(hit.normal));
                    }
                    None => {
                        let background = luminance(scene.background(direction));
                        rasters.intensity.set_single(col, row, background);
                    }
                }
            }
        }

        rasters
    }
}

/// Hemisphere rasters at one shading point plus per-pixel sampling weights.
///
/// Weights combine the projected solid angle of each pixel with a proximity
/// boost: the hemisphere is cut into square tiles, and tiles whose nearest
/// hit is close to the overall nearest hit get up to `1 + importance` times
/// more weight. Tiles that see no geometry get no boost.
pub struct HemisphereSampleSet {
    frame: Frame,
    rasters: HemisphereRasters,
    weights: Vec<f32>,
}

impl HemisphereSampleSet {
    pub fn new(frame: Frame, rasters: HemisphereRasters, tile: u32, importance: f32) -> Self {
        let weights = direction_weights(&rasters.distance, tile, importance);
        Self {
            frame,
            rasters,
            weights,
        }
    }

    pub fn side(&self) -> u32 {
        self.rasters.side()
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn rasters(&self) -> &HemisphereRasters {
        &self.rasters
    }

    /// Per-pixel weights, row-major like the rasters.
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// World direction through hemisphere pixel `(col, row)` at `jitter`.
    pub fn direction(&self, col: u32, row: u32, jitter: Vec2) -> Vec3 {
        self.frame
            .to_world(hemisphere_pixel_direction(col, row, self.side(), jitter))
    }

    pub fn solid_angle(&self, row: u32) -> f32 {
        hemisphere_pixel_solid_angle(row, self.side())
    }
}

fn direction_weights(distance: &Raster, tile: u32, importance: f32) -> Vec<f32> {
    let side = distance.width();
    let tile = tile.clamp(1, side.max(1));
    let tiles_per_side = side.div_ceil(tile);

    // Nearest hit per hemisphere tile
    let mut tile_min = vec![f32::INFINITY; (tiles_per_side * tiles_per_side) as usize];
    for row in 0..side {
        for col in 0..side {
            let d = distance.get_single(col, row);
            if d >= 0.0 && d.is_finite() {
                let t = ((row / tile) * tiles_per_side + col / tile) as usize;
                tile_min[t] = tile_min[t].min(d);
            }
        }
    }
    let global_min = tile_min.iter().copied().fold(f32::INFINITY, f32::min);

    let mut weights = Vec::with_capacity((side * side) as usize);
    for row in 0..side {
        let cos_theta = hemisphere_pixel_direction(0, row, side, Vec2::splat(0.5)).z;
        let d_omega = hemisphere_pixel_solid_angle(row, side);
        for col in 0..side {
            let d_tile = tile_min[((row / tile) * tiles_per_side + col / tile) as usize];
            let proximity = if d_tile.is_finite() && d_tile > 0.0 {
                global_min / d_tile
            } else {
                0.0
            };
            weights.push(cos_theta * d_omega * (1.0 + importance.max(0.0) * proximity));
        }
    }
    weights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{Color, Lambertian};
    use crate::sampler::RandomSampler;
    use crate::scene::Scene;
    use crate::sphere::Sphere;

    fn rasterize(scene: &Scene, side: u32) -> HemisphereRasters {
        let mut sampler = RandomSampler::new(0);
        sampler.start_pixel(0, 0, 0);
        TracingHemisphereCamera.rasterize(
            scene,
            Vec3::ZERO,
            &Frame::from_normal(Vec3::Y),
            side,
            &mut sampler,
        )
    }

    #[test]
    fn test_empty_scene_records_misses() {
        let scene = Scene::new(Color::splat(0.5));
        let rasters = rasterize(&scene, 4);

        assert!(rasters.distance.data().iter().all(|&d| d == MISS_DISTANCE));
        assert!(rasters.normals.data().iter().all(|&n| n == 0.0));
        assert!(rasters
            .intensity
            .data()
            .iter()
            .all(|&v| (v - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_ceiling_hits_near_pole() {
        let mut scene = Scene::new(Color::ZERO);
        // Big sphere standing in for a ceiling at y = 2
        scene.add(Box::new(Sphere::new(
            Vec3::new(0.0, 1002.0, 0.0),
            1000.0,
            Lambertian::new(Color::ONE),
        )));
        let rasters = rasterize(&scene, 8);

        // Row 0 looks almost straight up
        let d = rasters.distance.get_single(0, 0);
        assert!(d > 2.0 && d < 2.1, "distance {d}");

        // Ceiling normal points down, i.e. -z in the shading frame
        let n = rasters.normals.get_rgb(3, 0);
        assert!(n.z < -0.99, "normal {n:?}");

        // Unlit ceiling: intensity is zero
        assert_eq!(rasters.intensity.get_single(0, 0), 0.0);
    }

    #[test]
    fn test_weights_follow_cosine_without_hits() {
        let side = 8;
        let rasters = HemisphereRasters::new(side);
        let set = HemisphereSampleSet::new(Frame::from_normal(Vec3::Z), rasters, 4, 5.0);

        let w = set.weights();
        assert_eq!(w.len(), 64);
        // Same weight across a row, decreasing towards the horizon
        assert_eq!(w[0], w[7]);
        let total: f32 = w.iter().sum();
        // Sum of cos * dw over the hemisphere is pi
        assert!((total - std::f32::consts::PI).abs() < 0.05, "total {total}");
    }

    #[test]
    fn test_nearest_tile_gets_boost() {
        let side = 4;
        let mut rasters = HemisphereRasters::new(side);
        // Tile (0,0) sees a hit at distance 1, tile (1,0) at distance 4
        rasters.distance.set_single(0, 0, 1.0);
        rasters.distance.set_single(2, 0, 4.0);
        let set = HemisphereSampleSet::new(Frame::from_normal(Vec3::Z), rasters, 2, 4.0);

        let w = set.weights();
        let base = w[3] / (1.0 + 4.0 * 0.25);
        // Same row: nearest tile boost 5x, far tile 2x
        assert!((w[1] - base * 5.0).abs() < 1e-6);
        assert!((w[3] - base * 2.0).abs() < 1e-6);

        // Bottom tiles saw nothing and get no boost
        let row2 = hemisphere_pixel_direction(0, 2, side, Vec2::splat(0.5)).z
            * hemisphere_pixel_solid_angle(2, side);
        assert!((w[2 * 4] - row2).abs() < 1e-6);
    }

    #[test]
    fn test_direction_stays_above_surface() {
        let rasters = HemisphereRasters::new(4);
        let normal = Vec3::new(1.0, 1.0, 0.0).normalize();
        let set = HemisphereSampleSet::new(Frame::from_normal(normal), rasters, 2, 1.0);
        for row in 0..4 {
            for col in 0..4 {
                let d = set.direction(col, row, Vec2::new(0.3, 0.9));
                assert!(d.dot(normal) >= -1e-6);
                assert!((d.length() - 1.0).abs() < 1e-4);
            }
        }
    }
}
