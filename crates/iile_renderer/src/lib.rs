//! IILE Renderer - path tracing with a learned irradiance oracle.
//!
//! Render threads pull tiles from a shared schedule, estimate direct light
//! at every pixel, and at a stride of pixels send a small hemisphere of
//! intensity, distance and normal rasters to an external oracle process.
//! The predicted irradiance steers importance sampling of indirect light.
//! Both estimates are splatted into shared films.

mod camera;
mod channel;
mod connector;
mod direct;
mod film;
mod filter;
mod hemisphere;
mod hittable;
mod light;
mod material;
mod normalization;
mod render;
mod runner;
mod sampler;
mod schedule;
mod scene;
mod sphere;

pub use camera::{CameraRays, PinholeCamera};
pub use channel::{ChannelError, ChannelResult, FramedChannel, MemoryChannel, ProcessChannel};
pub use connector::{
    ConnectorError, IrradianceOracle, NnConnector, ProtocolError, ProtocolResult,
    SharedConnector, REPLY_COMPONENTS, TRAILER,
};
pub use direct::{bounce_radiance, estimate_direct, power_heuristic, surface_radiance};
pub use film::{FilmMonitor, UNSAMPLED};
pub use filter::{compute_filter_weight, GaussianFilter};
pub use hemisphere::{
    HemisphereCamera, HemisphereRasters, HemisphereSampleSet, TracingHemisphereCamera,
    MISS_DISTANCE,
};
pub use hittable::{Hittable, HittableList, SurfaceHit};
pub use light::{Light, LightSample, PointLight, SphereLight};
pub use material::{Bsdf, BsdfSample, Color, Lambertian};
pub use normalization::{downstream_transform, upstream_transform, NormalizationState};
pub use render::{render, RenderError, RenderOutput, RenderResult, RenderSession, RenderStats};
pub use runner::{RenderContext, RenderRunner, RunnerStats};
pub use sampler::{RandomSampler, Sampler};
pub use schedule::{
    generate_tiles, ItemState, ScheduleError, ScheduleMonitor, ScheduleState, Tile, WorkItem,
};
pub use scene::{Scene, SceneAccess};
pub use sphere::Sphere;

/// Re-export common types from the sibling crates
pub use iile_core::{Raster, RenderSettings};
pub use iile_math::{Ray, Vec3};
