//! Direct lighting estimator.

use crate::hittable::SurfaceHit;
use crate::material::Color;
use crate::sampler::Sampler;
use crate::scene::SceneAccess;
use iile_math::{Ray, Vec3};

/// Power heuristic (beta = 2) weight for multiple importance sampling.
pub fn power_heuristic(nf: f32, f_pdf: f32, ng: f32, g_pdf: f32) -> f32 {
    let f = nf * f_pdf;
    let g = ng * g_pdf;
    let denom = f * f + g * g;
    if denom <= 0.0 {
        0.0
    } else {
        (f * f) / denom
    }
}

/// Radiance reflected at `hit` towards `wo` from one light picked by power.
///
/// Combines a light sample and a BSDF sample with the power heuristic.
/// Always draws one 1D and two 2D values so sample streams stay aligned.
pub fn estimate_direct(
    scene: &dyn SceneAccess,
    hit: &SurfaceHit<'_>,
    wo: Vec3,
    sampler: &mut dyn Sampler,
) -> Color {
    let u_pick = sampler.get_1d();
    let u_light = sampler.get_2d();
    let u_bsdf = sampler.get_2d();

    let Some((index, pick_pmf)) = scene.light_distribution().sample_discrete(u_pick) else {
        return Color::ZERO;
    };
    let Some(light) = scene.lights().get(index) else {
        return Color::ZERO;
    };
    if pick_pmf <= 0.0 {
        return Color::ZERO;
    }

    let n = hit.normal;
    let bsdf = hit.bsdf;
    let mut ld = Color::ZERO;

    if let Some(ls) = light.sample_li(hit.p, u_light) {
        if ls.pdf > 0.0 && ls.radiance != Color::ZERO {
            let f = bsdf.f(wo, ls.wi, n) * ls.wi.dot(n).abs();
            if f != Color::ZERO && scene.unoccluded(hit.p, ls.point) {
                if light.is_delta() {
                    ld += f * ls.radiance / ls.pdf;
                } else {
                    let weight = power_heuristic(1.0, ls.pdf, 1.0, bsdf.pdf(wo, ls.wi, n));
                    ld += f * ls.radiance * weight / ls.pdf;
                }
            }
        }
    }

    if !light.is_delta() {
        if let Some(bs) = bsdf.sample_f(wo, n, u_bsdf) {
            let light_pdf = light.pdf_li(hit.p, bs.wi);
            if bs.pdf > 0.0 && light_pdf > 0.0 {
                let f = bs.f * bs.wi.dot(n).abs();
                let weight = power_heuristic(1.0, bs.pdf, 1.0, light_pdf);
                if let Some(emitter) = scene.intersect(&Ray::new(hit.p, bs.wi)) {
                    if emitter.light == Some(index) {
                        ld += f * emitter.le(-bs.wi) * weight / bs.pdf;
                    }
                }
            }
        }
    }

    ld / pick_pmf
}

/// Radiance leaving `hit` towards `wo`: emission plus direct lighting.
pub fn surface_radiance(
    scene: &dyn SceneAccess,
    hit: &SurfaceHit<'_>,
    wo: Vec3,
    sampler: &mut dyn Sampler,
) -> Color {
    hit.le(wo) + estimate_direct(scene, hit, wo, sampler)
}

/// Light reflected back towards `origin` by the first surface along
/// `direction`. Emission at that surface is left out: light arriving straight
/// from an emitter belongs to the direct layer.
pub fn bounce_radiance(
    scene: &dyn SceneAccess,
    origin: Vec3,
    direction: Vec3,
    sampler: &mut dyn Sampler,
) -> Color {
    match scene.intersect(&Ray::new(origin, direction)) {
        Some(hit) => estimate_direct(scene, &hit, -direction, sampler),
        None => scene.background(direction),
    }
}
