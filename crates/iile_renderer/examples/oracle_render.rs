//! Render a small analytic scene against a real oracle process.
//!
//! The oracle is located through the settings file given as the first
//! argument, or the `IILE_ORACLE_PATH` environment variable.
//!
//! ```text
//! IILE_ORACLE_PATH=oracle.py cargo run --example oracle_render -- render.json
//! ```

use anyhow::{Context, Result};
use iile_renderer::{
    Color, Lambertian, PinholeCamera, RenderSession, RenderSettings, Scene, Sphere,
    TracingHemisphereCamera, Vec3,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn build_scene() -> Scene {
    let mut scene = Scene::new(Color::new(0.05, 0.05, 0.08));

    // Ground
    scene.add(Box::new(Sphere::new(
        Vec3::new(0.0, -1000.0, 0.0),
        1000.0,
        Lambertian::new(Color::new(0.5, 0.5, 0.5)),
    )));

    // Three main spheres
    scene.add(Box::new(Sphere::new(
        Vec3::new(-2.2, 1.0, 0.0),
        1.0,
        Lambertian::new(Color::new(0.7, 0.2, 0.2)),
    )));
    scene.add(Box::new(Sphere::new(
        Vec3::new(0.0, 1.0, 0.0),
        1.0,
        Lambertian::new(Color::new(0.2, 0.7, 0.2)),
    )));
    scene.add(Box::new(Sphere::new(
        Vec3::new(2.2, 1.0, 0.0),
        1.0,
        Lambertian::new(Color::new(0.2, 0.2, 0.7)),
    )));

    scene.add_sphere_light(Vec3::new(0.0, 5.0, 2.0), 0.75, Color::splat(25.0));
    scene.add_point_light(Vec3::new(-4.0, 3.0, 4.0), Color::splat(10.0));
    scene
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let settings = match std::env::args().nth(1) {
        Some(path) => RenderSettings::from_file(&path)
            .with_context(|| format!("loading settings from {path}"))?,
        None => RenderSettings {
            image_width: 160,
            image_height: 90,
            tile_size: 16,
            stride: 4,
            passes: 3,
            ..RenderSettings::default()
        },
    };

    let scene = build_scene();
    let camera = PinholeCamera::new()
        .with_resolution(settings.image_width, settings.image_height)
        .with_position(Vec3::new(0.0, 2.0, 8.0), Vec3::new(0.0, 1.0, 0.0), Vec3::Y)
        .with_fov(35.0);

    let session = RenderSession::new(settings).context("invalid render settings")?;
    let finished = AtomicBool::new(false);

    let stats = std::thread::scope(|s| {
        // Progress from the films while the runners work
        s.spawn(|| {
            while !finished.load(Ordering::Acquire) {
                std::thread::sleep(Duration::from_millis(500));
                let schedule = session.schedule();
                log::info!(
                    "{}/{} work items, direct coverage {:.0}%",
                    schedule.done_count(),
                    schedule.len(),
                    session.direct_film().coverage() * 100.0
                );
            }
        });

        let result =
            session.run_with_oracle_processes(&scene, &camera, &TracingHemisphereCamera);
        finished.store(true, Ordering::Release);
        result
    })?;

    let output = session.into_output(stats);
    let mean = |data: &[f32]| data.iter().sum::<f32>() / data.len().max(1) as f32;
    log::info!(
        "Done in {:.2?}: {} pixels traced, {} oracle evaluations, {} samples dropped",
        output.stats.elapsed,
        output.stats.runners.pixels,
        output.stats.runners.evaluations,
        output.stats.runners.dropped_samples
    );
    log::info!(
        "Mean radiance: direct {:.4}, indirect {:.4}",
        mean(output.direct.data()),
        mean(output.indirect.data())
    );

    Ok(())
}
