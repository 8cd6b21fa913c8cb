//! Render runner: the per-thread work loop.
//!
//! Each runner owns its sampler and its oracle handle, claims work items
//! from the shared schedule until none remain, and splats into the two
//! shared films. The stop flag is checked between work items only, so an
//! oracle exchange in flight always completes.

use std::sync::atomic::{AtomicBool, Ordering};

use iile_core::{Raster, RenderSettings};
use iile_math::{luminance, Distribution1D, Frame, PixelBounds, Vec3};

use crate::camera::CameraRays;
use crate::connector::{IrradianceOracle, ProtocolResult};
use crate::direct::{bounce_radiance, surface_radiance};
use crate::film::FilmMonitor;
use crate::filter::GaussianFilter;
use crate::hemisphere::{HemisphereCamera, HemisphereSampleSet};
use crate::hittable::SurfaceHit;
use crate::material::Color;
use crate::normalization::NormalizationState;
use crate::render::{RenderError, RenderResult};
use crate::sampler::{RandomSampler, Sampler};
use crate::schedule::{ScheduleMonitor, WorkItem};
use crate::scene::SceneAccess;

/// Everything the runners of one render share.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    pub settings: &'a RenderSettings,
    pub scene: &'a dyn SceneAccess,
    pub camera: &'a dyn CameraRays,
    pub hemisphere_camera: &'a dyn HemisphereCamera,
    pub schedule: &'a ScheduleMonitor,
    pub direct_film: &'a FilmMonitor,
    pub indirect_film: &'a FilmMonitor,
    pub stop: &'a AtomicBool,
}

/// Counters reported by one runner when it exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunnerStats {
    /// Work items completed
    pub items: usize,
    /// Camera samples traced
    pub pixels: u64,
    /// Oracle round trips
    pub evaluations: u64,
    /// Indirect samples discarded as non-finite
    pub dropped_samples: u64,
}

impl RunnerStats {
    pub fn absorb(&mut self, other: &RunnerStats) {
        self.items += other.items;
        self.pixels += other.pixels;
        self.evaluations += other.evaluations;
        self.dropped_samples += other.dropped_samples;
    }
}

pub struct RenderRunner<'a, O: IrradianceOracle> {
    thread_no: usize,
    ctx: RenderContext<'a>,
    oracle: O,
    sampler: RandomSampler,
    filter: GaussianFilter,
    bounds: PixelBounds,
    stats: RunnerStats,
}

impl<'a, O: IrradianceOracle> RenderRunner<'a, O> {
    pub fn new(thread_no: usize, ctx: RenderContext<'a>, oracle: O) -> Self {
        Self {
            thread_no,
            sampler: RandomSampler::new(ctx.settings.seed),
            filter: GaussianFilter::new(ctx.settings.filter_radius),
            bounds: ctx.settings.pixel_bounds(),
            ctx,
            oracle,
            stats: RunnerStats::default(),
        }
    }

    pub fn thread_no(&self) -> usize {
        self.thread_no
    }

    /// Work until the schedule is drained, the stop flag is raised, or an
    /// exchange fails. A failure raises the stop flag for every runner.
    pub fn run(mut self) -> RenderResult<RunnerStats> {
        log::debug!("render thread {} started", self.thread_no);

        while !self.ctx.stop.load(Ordering::Acquire) {
            let Some(item) = self.ctx.schedule.claim_next() else {
                break;
            };

            if let Err(source) = self.render_item(&item) {
                self.ctx.stop.store(true, Ordering::Release);
                log::error!(
                    "render thread {} failed on work item {} (pass {}): {}",
                    self.thread_no,
                    item.index,
                    item.pass,
                    source
                );
                return Err(RenderError::Protocol {
                    thread_no: self.thread_no,
                    item: item.index,
                    source,
                });
            }

            if let Err(err) = self.ctx.schedule.mark_done(&item) {
                self.ctx.stop.store(true, Ordering::Release);
                return Err(err.into());
            }
            self.stats.items += 1;
        }

        log::info!(
            "render thread {} exiting after {} work items ({} oracle evaluations)",
            self.thread_no,
            self.stats.items,
            self.stats.evaluations
        );
        Ok(self.stats)
    }

    fn render_item(&mut self, item: &WorkItem) -> ProtocolResult<()> {
        let scene = self.ctx.scene;
        let stride = self.ctx.settings.stride_for_pass(item.pass);

        for (x, y) in item.tile.bounds().pixels() {
            self.sampler.start_pixel(x, y, item.pass);
            let ray = self.ctx.camera.generate_ray(x, y, self.sampler.get_2d());
            let evaluate = (x - self.bounds.x0) % stride == 0 && (y - self.bounds.y0) % stride == 0;

            let (direct, indirect) = match scene.intersect(&ray) {
                Some(hit) => {
                    let wo = -ray.direction.normalize_or_zero();
                    let direct = surface_radiance(scene, &hit, wo, &mut self.sampler);
                    let indirect = if evaluate {
                        Some(self.estimate_indirect(&hit, wo)?)
                    } else {
                        None
                    };
                    (direct, indirect)
                }
                None => (
                    scene.background(ray.direction),
                    evaluate.then_some(Color::ZERO),
                ),
            };

            let (fx, fy) = (x as i64, y as i64);
            self.ctx.direct_film.splat(fx, fy, direct, 1.0);
            if let Some(indirect) = indirect {
                self.ctx
                    .indirect_film
                    .splat_filtered(fx, fy, indirect, &self.filter);
            }
            self.stats.pixels += 1;
        }

        Ok(())
    }

    /// One oracle round trip and the importance-sampled estimate it drives.
    fn estimate_indirect(&mut self, hit: &SurfaceHit<'_>, wo: Vec3) -> ProtocolResult<Color> {
        let settings = self.ctx.settings;
        let frame = Frame::from_normal(hit.normal);
        let rasters = self.ctx.hemisphere_camera.rasterize(
            self.ctx.scene,
            hit.p,
            &frame,
            settings.hemi_size,
            &mut self.sampler,
        );
        let set = HemisphereSampleSet::new(
            frame,
            rasters,
            settings.hemi_tile,
            settings.hemi_importance,
        );

        let inputs = set.rasters();
        let normalization = NormalizationState::measure(&inputs.intensity, &inputs.distance);
        let upstream = normalization.upstream(&inputs.intensity);
        let prediction = self.oracle.predict(
            &upstream,
            &inputs.distance,
            &inputs.normals,
            &normalization,
        )?;
        self.stats.evaluations += 1;

        let prediction = normalization.downstream(&prediction);
        Ok(self.importance_estimate(hit, wo, &set, &prediction))
    }

    /// Sample hemisphere pixels in proportion to predicted light and average
    /// `f * L * cos / pdf` over the configured number of samples.
    fn importance_estimate(
        &mut self,
        hit: &SurfaceHit<'_>,
        wo: Vec3,
        set: &HemisphereSampleSet,
        prediction: &Raster,
    ) -> Color {
        let side = set.side();
        let distribution = sampling_distribution(set, prediction);
        let samples = self.ctx.settings.indirect_samples.max(1);
        let mut sum = Color::ZERO;

        for _ in 0..samples {
            let u = self.sampler.get_1d();
            let jitter = self.sampler.get_2d();
            let Some((index, pmf)) = distribution.sample_discrete(u) else {
                break;
            };
            let (col, row) = (index as u32 % side, index as u32 / side);
            let solid_angle = set.solid_angle(row);
            if pmf <= 0.0 || solid_angle <= 0.0 {
                continue;
            }

            let wi = set.direction(col, row, jitter);
            let cos_theta = wi.dot(hit.normal);
            let f = hit.bsdf.f(wo, wi, hit.normal);
            if cos_theta <= 0.0 || f == Color::ZERO {
                continue;
            }

            let li = bounce_radiance(self.ctx.scene, hit.p, wi, &mut self.sampler);
            let contribution = f * li * cos_theta * solid_angle / pmf;
            if contribution.is_finite() {
                sum += contribution;
            } else {
                self.stats.dropped_samples += 1;
            }
        }

        sum / samples as f32
    }
}

/// Distribution over hemisphere pixels: predicted luminance times weight,
/// or the weights alone when the prediction carries no usable energy.
fn sampling_distribution(set: &HemisphereSampleSet, prediction: &Raster) -> Distribution1D {
    let side = set.side();
    if prediction.width() == side && prediction.height() == side {
        let values: Vec<f32> = set
            .weights()
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                let l = luminance(prediction.get_rgb(i as u32 % side, i as u32 / side));
                if l.is_finite() && l > 0.0 {
                    l * w
                } else {
                    0.0
                }
            })
            .collect();
        let distribution = Distribution1D::new(&values);
        if distribution.integral() > 0.0 {
            return distribution;
        }
    }
    Distribution1D::new(set.weights())
}
