//! Render orchestration: one session, a fixed pool of runner threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use iile_core::{ConfigError, ConnectorMode, Raster, RenderSettings};
use thiserror::Error;

use crate::camera::CameraRays;
use crate::connector::{ConnectorError, IrradianceOracle, NnConnector, ProtocolError, SharedConnector};
use crate::film::FilmMonitor;
use crate::hemisphere::HemisphereCamera;
use crate::runner::{RenderContext, RenderRunner, RunnerStats};
use crate::schedule::{ScheduleError, ScheduleMonitor};
use crate::scene::SceneAccess;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to start oracle for render thread {thread_no}: {source}")]
    OracleLaunch {
        thread_no: usize,
        #[source]
        source: ConnectorError,
    },

    #[error("render thread {thread_no} failed on work item {item}: {source}")]
    Protocol {
        thread_no: usize,
        item: usize,
        #[source]
        source: ProtocolError,
    },

    #[error("scheduling error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("{} work items were claimed but never finished: {abandoned:?}", .abandoned.len())]
    Abandoned { abandoned: Vec<usize> },

    #[error("render thread {thread_no} panicked")]
    WorkerPanicked { thread_no: usize },
}

pub type RenderResult<T> = Result<T, RenderError>;

/// Totals over every runner of a finished render.
#[derive(Debug, Clone, Default)]
pub struct RenderStats {
    pub threads: usize,
    pub runners: RunnerStats,
    /// The stop flag was raised from outside before the schedule drained
    pub cancelled: bool,
    pub elapsed: Duration,
}

/// Both film layers of a finished render.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub direct: Raster,
    pub indirect: Raster,
    pub stats: RenderStats,
}

/// Shared state of one render: schedule, films and the stop flag.
///
/// The films can be snapshotted from another thread while [`RenderSession::run`]
/// is in progress for a progressive preview.
pub struct RenderSession {
    settings: RenderSettings,
    schedule: ScheduleMonitor,
    direct_film: FilmMonitor,
    indirect_film: FilmMonitor,
    stop: AtomicBool,
}

impl RenderSession {
    pub fn new(settings: RenderSettings) -> RenderResult<Self> {
        settings.validate()?;
        let bounds = settings.pixel_bounds();
        Ok(Self {
            schedule: ScheduleMonitor::new(bounds, settings.tile_size, settings.passes),
            direct_film: FilmMonitor::new(bounds),
            indirect_film: FilmMonitor::new(bounds),
            stop: AtomicBool::new(false),
            settings,
        })
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn schedule(&self) -> &ScheduleMonitor {
        &self.schedule
    }

    pub fn direct_film(&self) -> &FilmMonitor {
        &self.direct_film
    }

    pub fn indirect_film(&self) -> &FilmMonitor {
        &self.indirect_film
    }

    /// Ask every runner to stop after its current work item.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Run one render thread per oracle until the schedule drains.
    pub fn run<O>(
        &self,
        scene: &dyn SceneAccess,
        camera: &dyn CameraRays,
        hemisphere_camera: &dyn HemisphereCamera,
        oracles: Vec<O>,
    ) -> RenderResult<RenderStats>
    where
        O: IrradianceOracle + Send,
    {
        if oracles.is_empty() {
            return Err(ConfigError::Invalid {
                field: "threads",
                reason: "no oracle connectors to render with".to_string(),
            }
            .into());
        }

        let threads = oracles.len();
        let start = Instant::now();
        log::info!(
            "Rendering {} work items ({} passes) on {} threads, connector mode {:?}",
            self.schedule.len(),
            self.settings.passes,
            threads,
            self.settings.connector_mode
        );

        let ctx = RenderContext {
            settings: &self.settings,
            scene,
            camera,
            hemisphere_camera,
            schedule: &self.schedule,
            direct_film: &self.direct_film,
            indirect_film: &self.indirect_film,
            stop: &self.stop,
        };

        let results: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = oracles
                .into_iter()
                .enumerate()
                .map(|(thread_no, oracle)| {
                    let runner = RenderRunner::new(thread_no, ctx, oracle);
                    s.spawn(move || runner.run())
                })
                .collect();
            handles.into_iter().map(|h| h.join()).collect()
        });

        let mut stats = RenderStats {
            threads,
            ..RenderStats::default()
        };
        let mut failure = None;
        for (thread_no, result) in results.into_iter().enumerate() {
            match result {
                Ok(Ok(runner)) => stats.runners.absorb(&runner),
                Ok(Err(err)) => {
                    failure.get_or_insert(err);
                }
                Err(_) => {
                    log::error!("Render thread {} panicked", thread_no);
                    failure.get_or_insert(RenderError::WorkerPanicked { thread_no });
                }
            }
        }
        stats.elapsed = start.elapsed();

        if let Some(err) = failure {
            self.request_stop();
            return Err(err);
        }

        let abandoned = self.schedule.abandoned();
        if !abandoned.is_empty() {
            log::error!("{} work items were claimed but never finished", abandoned.len());
            return Err(RenderError::Abandoned {
                abandoned: abandoned.iter().map(|item| item.index).collect(),
            });
        }

        stats.cancelled = self.is_stopped();
        if stats.cancelled {
            log::warn!(
                "Render stopped with {} of {} work items done",
                self.schedule.done_count(),
                self.schedule.len()
            );
        }
        log::info!(
            "Render finished in {:.2?}: {} work items, {} oracle evaluations",
            stats.elapsed,
            stats.runners.items,
            stats.runners.evaluations
        );
        Ok(stats)
    }

    /// Start oracle processes as configured and run with them.
    ///
    /// In per-runner mode every thread gets its own process; in shared mode
    /// one process serves all threads under a lock.
    pub fn run_with_oracle_processes(
        &self,
        scene: &dyn SceneAccess,
        camera: &dyn CameraRays,
        hemisphere_camera: &dyn HemisphereCamera,
    ) -> RenderResult<RenderStats> {
        let threads = self.settings.thread_count();
        let launch = |thread_no: usize| {
            NnConnector::launch(&self.settings.oracle, self.settings.hemi_size)
                .map_err(|source| RenderError::OracleLaunch { thread_no, source })
        };

        match self.settings.connector_mode {
            ConnectorMode::PerRunner => {
                let oracles = (0..threads).map(launch).collect::<RenderResult<Vec<_>>>()?;
                self.run(scene, camera, hemisphere_camera, oracles)
            }
            ConnectorMode::Shared => {
                let shared = SharedConnector::new(launch(0)?);
                self.run(scene, camera, hemisphere_camera, vec![&shared; threads])
            }
        }
    }

    /// Current contents of both films.
    pub fn snapshot(&self) -> (Raster, Raster) {
        (self.direct_film.snapshot(), self.indirect_film.snapshot())
    }

    pub fn into_output(self, stats: RenderStats) -> RenderOutput {
        let (direct, indirect) = self.snapshot();
        RenderOutput {
            direct,
            indirect,
            stats,
        }
    }
}

/// Render a scene with oracle processes started from `settings`.
pub fn render(
    settings: RenderSettings,
    scene: &dyn SceneAccess,
    camera: &dyn CameraRays,
    hemisphere_camera: &dyn HemisphereCamera,
) -> RenderResult<RenderOutput> {
    let session = RenderSession::new(settings)?;
    let stats = session.run_with_oracle_processes(scene, camera, hemisphere_camera)?;
    Ok(session.into_output(stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::PinholeCamera;
    use crate::channel::MemoryChannel;
    use crate::connector::ProtocolResult;
    use crate::hemisphere::TracingHemisphereCamera;
    use crate::material::{Color, Lambertian};
    use crate::normalization::NormalizationState;
    use crate::scene::Scene;
    use crate::sphere::Sphere;
    use iile_core::OracleSettings;
    use iile_math::Vec3;

    struct FlatOracle;

    impl IrradianceOracle for FlatOracle {
        fn predict(
            &mut self,
            intensity: &Raster,
            _distance: &Raster,
            _normals: &Raster,
            _normalization: &NormalizationState,
        ) -> ProtocolResult<Raster> {
            Ok(Raster::filled(intensity.width(), intensity.height(), 3, 0.0))
        }
    }

    struct PanickingOracle;

    impl IrradianceOracle for PanickingOracle {
        fn predict(
            &mut self,
            _: &Raster,
            _: &Raster,
            _: &Raster,
            _: &NormalizationState,
        ) -> ProtocolResult<Raster> {
            panic!("oracle crashed");
        }
    }

    fn settings(threads: usize) -> RenderSettings {
        RenderSettings {
            image_width: 16,
            image_height: 12,
            tile_size: 4,
            threads: Some(threads),
            hemi_size: 4,
            hemi_tile: 2,
            indirect_samples: 1,
            stride: 2,
            passes: 2,
            ..RenderSettings::default()
        }
    }

    fn scene() -> (Scene, PinholeCamera) {
        let mut scene = Scene::new(Color::splat(0.1));
        scene.add(Box::new(Sphere::new(
            Vec3::new(0.0, -1000.0, 0.0),
            1000.0,
            Lambertian::new(Color::splat(0.5)),
        )));
        scene.add(Box::new(Sphere::new(
            Vec3::new(0.0, 0.5, -3.0),
            0.5,
            Lambertian::new(Color::new(0.8, 0.2, 0.2)),
        )));
        scene.add_sphere_light(Vec3::new(2.0, 3.0, -2.0), 0.5, Color::splat(20.0));
        let camera = PinholeCamera::new()
            .with_resolution(16, 12)
            .with_position(Vec3::new(0.0, 1.0, 1.0), Vec3::new(0.0, 0.5, -3.0), Vec3::Y)
            .with_fov(50.0);
        (scene, camera)
    }

    /// Camera looking straight down so every primary ray hits the floor.
    fn floor_view(width: u32, height: u32) -> PinholeCamera {
        PinholeCamera::new()
            .with_resolution(width, height)
            .with_position(Vec3::new(0.0, 2.0, 0.0), Vec3::ZERO, Vec3::Z)
            .with_fov(40.0)
    }

    #[test]
    fn test_render_is_thread_count_independent() {
        let (scene, camera) = scene();

        let one = RenderSession::new(settings(1)).unwrap();
        let stats = one
            .run(&scene, &camera, &TracingHemisphereCamera, vec![FlatOracle])
            .unwrap();
        assert_eq!(stats.runners.items, 24);
        assert!(!stats.cancelled);

        let four = RenderSession::new(settings(4)).unwrap();
        let oracles = (0..4).map(|_| FlatOracle).collect();
        let stats = four
            .run(&scene, &camera, &TracingHemisphereCamera, oracles)
            .unwrap();
        assert_eq!(stats.threads, 4);
        assert_eq!(stats.runners.items, 24);
        assert_eq!(stats.runners.pixels, 2 * 16 * 12);

        // Per-pixel sample streams make the direct layer identical
        let a = one.direct_film().snapshot();
        let b = four.direct_film().snapshot();
        for (x, y) in a.data().iter().zip(b.data()) {
            assert!((x - y).abs() <= 1e-5 * x.abs().max(1.0));
        }
    }

    #[test]
    fn test_shared_connector_serves_all_threads() {
        let side = 4u32;
        let settings = RenderSettings {
            hemi_size: side,
            passes: 1,
            stride: 1,
            ..settings(3)
        };
        let (scene, _) = scene();
        let camera = floor_view(16, 12);

        // One reply per pixel, every primary ray hits the floor
        let evaluations = 16 * 12;
        let mut channel = MemoryChannel::new();
        for _ in 0..evaluations {
            for _ in 0..side * side * 3 {
                channel.push_reply_f32(0.0);
            }
            channel.push_reply_byte(b'x');
            channel.push_reply_byte(b'\n');
        }
        let shared = SharedConnector::new(NnConnector::new(channel, side));

        let session = RenderSession::new(settings).unwrap();
        let stats = session
            .run(&scene, &camera, &TracingHemisphereCamera, vec![&shared; 3])
            .unwrap();
        assert_eq!(stats.runners.evaluations, evaluations as u64);

        let channel = shared.into_inner().into_channel();
        assert_eq!(channel.pending_reply(), 0);
        let request_floats = (side * side * (1 + 1 + 3) + 2) as usize;
        assert_eq!(channel.sent().len(), evaluations * request_floats * 4);
    }

    #[test]
    fn test_protocol_failure_stops_render() {
        let (scene, camera) = scene();
        // Three replies only, then the stream ends
        let side = 4;
        let mut channel = MemoryChannel::new();
        for _ in 0..3 {
            for _ in 0..side * side * 3 {
                channel.push_reply_f32(0.0);
            }
            channel.push_reply_byte(b'x');
            channel.push_reply_byte(b'\n');
        }
        let shared = SharedConnector::new(NnConnector::new(channel, side));

        let session = RenderSession::new(settings(2)).unwrap();
        let err = session
            .run(&scene, &camera, &TracingHemisphereCamera, vec![&shared; 2])
            .unwrap_err();
        assert!(matches!(err, RenderError::Protocol { .. }), "got {err}");
        assert!(session.is_stopped());
        assert!(shared.is_poisoned());
        assert!(session.schedule().done_count() < session.schedule().len());
    }

    #[test]
    fn test_worker_panic_is_reported() {
        let (scene, camera) = scene();
        let session = RenderSession::new(settings(1)).unwrap();
        let err = session
            .run(&scene, &camera, &TracingHemisphereCamera, vec![PanickingOracle])
            .unwrap_err();
        assert!(matches!(err, RenderError::WorkerPanicked { thread_no: 0 }));
    }

    #[test]
    fn test_stop_before_run_is_cancelled() {
        let (scene, camera) = scene();
        let session = RenderSession::new(settings(2)).unwrap();
        session.request_stop();
        let stats = session
            .run(&scene, &camera, &TracingHemisphereCamera, vec![FlatOracle, FlatOracle])
            .unwrap();
        assert!(stats.cancelled);
        assert_eq!(stats.runners.items, 0);
        assert_eq!(session.direct_film().coverage(), 0.0);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let bad = RenderSettings {
            tile_size: 0,
            ..RenderSettings::default()
        };
        assert!(matches!(
            RenderSession::new(bad),
            Err(RenderError::Config(_))
        ));

        let session = RenderSession::new(settings(1)).unwrap();
        let (scene, camera) = scene();
        let err = session
            .run::<FlatOracle>(&scene, &camera, &TracingHemisphereCamera, Vec::new())
            .unwrap_err();
        assert!(matches!(err, RenderError::Config(_)));
    }

    #[test]
    fn test_missing_oracle_path_fails_launch() {
        let (scene, camera) = scene();
        let settings = RenderSettings {
            oracle: OracleSettings {
                interpreter: None,
                interpreter_args: Vec::new(),
                script: Some(std::path::PathBuf::new()),
            },
            ..settings(1)
        };
        let session = RenderSession::new(settings).unwrap();
        let err = session
            .run_with_oracle_processes(&scene, &camera, &TracingHemisphereCamera)
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::OracleLaunch {
                thread_no: 0,
                source: ConnectorError::Config(ConfigError::MissingOraclePath)
            }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_render_with_stub_oracle_processes() {
        let _ = env_logger::builder().is_test(true).try_init();

        // Reads one request, answers with 0.25 everywhere, until stdin closes.
        // 0.25f32 little-endian is 00 00 80 3e.
        let side = 2u32;
        let request_bytes = (side * side * 5 + 2) * 4;
        let reply = r"\000\000\200\076".repeat((side * side * 3) as usize);
        let script = format!(
            "while n=$(head -c {request_bytes} | wc -c) && [ $n -eq {request_bytes} ]; do \
             printf '{reply}x\\n'; done"
        );

        for mode in [ConnectorMode::PerRunner, ConnectorMode::Shared] {
            let settings = RenderSettings {
                image_width: 4,
                image_height: 4,
                tile_size: 2,
                hemi_size: side,
                hemi_tile: 1,
                stride: 2,
                passes: 1,
                connector_mode: mode,
                oracle: OracleSettings {
                    interpreter: Some("sh".to_string()),
                    interpreter_args: vec!["-c".to_string(), script.clone()],
                    script: Some("iile-stub-oracle".into()),
                },
                ..settings(2)
            };
            let (scene, _) = scene();
            let camera = floor_view(4, 4);
            let output = render(settings, &scene, &camera, &TracingHemisphereCamera).unwrap();
            assert_eq!(output.stats.runners.items, 4);
            assert_eq!(output.stats.runners.evaluations, 4);
            assert_eq!(output.direct.width(), 4);
            assert!(output.indirect.data().iter().all(|v| v.is_finite()));
        }
    }
}
