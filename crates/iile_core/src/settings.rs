//! Render configuration.
//!
//! Every value the render consumes lives in [`RenderSettings`]. Settings are
//! plain serde structs so they can come from a JSON file or be built in code;
//! missing fields fall back to their defaults.

use std::path::{Path, PathBuf};

use iile_math::PixelBounds;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable consulted when no oracle script is configured.
pub const ORACLE_PATH_ENV: &str = "IILE_ORACLE_PATH";

/// Default tile size in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 64;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("oracle script path is not configured; set {} or oracle.script", ORACLE_PATH_ENV)]
    MissingOraclePath,

    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("IO error reading settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed settings: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// How render threads reach the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorMode {
    /// One oracle process per render thread.
    #[default]
    PerRunner,
    /// A single oracle process; exchanges are serialized behind a lock.
    Shared,
}

/// Where the external oracle program lives and how to start it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    /// Interpreter used to run the script. `None` executes the script directly.
    pub interpreter: Option<String>,
    /// Arguments passed to the interpreter before the script path.
    pub interpreter_args: Vec<String>,
    /// Script path. Falls back to `IILE_ORACLE_PATH` when absent.
    pub script: Option<PathBuf>,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            interpreter: Some("python3".to_string()),
            // Unbuffered stdio, otherwise replies sit in the child's buffers.
            interpreter_args: vec!["-u".to_string()],
            script: None,
        }
    }
}

/// A fully resolved command line for the oracle process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl OracleSettings {
    /// Resolve the oracle command using the process environment.
    pub fn resolve(&self) -> ConfigResult<OracleCommand> {
        self.resolve_with(|key| std::env::var_os(key).map(PathBuf::from))
    }

    /// Resolve the oracle command with a custom environment lookup.
    pub fn resolve_with(
        &self,
        lookup: impl Fn(&str) -> Option<PathBuf>,
    ) -> ConfigResult<OracleCommand> {
        let script = self
            .script
            .clone()
            .or_else(|| lookup(ORACLE_PATH_ENV))
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(ConfigError::MissingOraclePath)?;
        let script = script.to_string_lossy().into_owned();

        Ok(match &self.interpreter {
            Some(interpreter) => {
                let mut args = self.interpreter_args.clone();
                args.push(script);
                OracleCommand {
                    program: interpreter.clone(),
                    args,
                }
            }
            None => OracleCommand {
                program: script,
                args: Vec::new(),
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Full image resolution.
    pub image_width: u32,
    pub image_height: u32,
    /// Optional crop window `[x0, y0, x1, y1]`, max corner exclusive.
    pub crop: Option<[u32; 4]>,
    /// Side of a square render tile.
    pub tile_size: u32,
    /// Worker thread count. `None` uses all available cores.
    pub threads: Option<usize>,
    /// Side length `S` of the square hemisphere rasters.
    pub hemi_size: u32,
    /// Side of the hemisphere tiles used by the proximity heuristic.
    pub hemi_tile: u32,
    /// Weight boost given to the hemisphere tile with the closest content.
    pub hemi_importance: f32,
    /// Reconstruction filter radius in pixels.
    pub filter_radius: f32,
    /// Importance samples drawn from each oracle prediction.
    pub indirect_samples: u32,
    /// Oracle evaluation stride on the first pass; halves every pass.
    pub stride: u32,
    /// Progressive passes over the image.
    pub passes: u32,
    pub seed: u64,
    pub connector_mode: ConnectorMode,
    pub oracle: OracleSettings,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            image_width: 640,
            image_height: 480,
            crop: None,
            tile_size: DEFAULT_TILE_SIZE,
            threads: None,
            hemi_size: 32,
            hemi_tile: 8,
            hemi_importance: 5.0,
            filter_radius: 3.0,
            indirect_samples: 4,
            stride: 1,
            passes: 1,
            seed: 0,
            connector_mode: ConnectorMode::default(),
            oracle: OracleSettings::default(),
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

impl RenderSettings {
    /// Parse settings from JSON and validate them.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let settings: RenderSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file and validate them.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let settings = Self::from_json_str(&text)?;
        log::info!("Loaded render settings from {}", path.display());
        Ok(settings)
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.image_width == 0 || self.image_height == 0 {
            return Err(invalid("image_width/image_height", "resolution must be non-zero"));
        }
        if self.tile_size == 0 {
            return Err(invalid("tile_size", "must be at least 1"));
        }
        if self.threads == Some(0) {
            return Err(invalid("threads", "must be at least 1"));
        }
        if self.hemi_size == 0 {
            return Err(invalid("hemi_size", "must be at least 1"));
        }
        if self.hemi_tile == 0 || self.hemi_tile > self.hemi_size {
            return Err(invalid(
                "hemi_tile",
                format!("must be within 1..={}", self.hemi_size),
            ));
        }
        if !(self.hemi_importance >= 0.0 && self.hemi_importance.is_finite()) {
            return Err(invalid("hemi_importance", "must be finite and non-negative"));
        }
        if !(self.filter_radius > 0.0 && self.filter_radius.is_finite()) {
            return Err(invalid("filter_radius", "must be finite and positive"));
        }
        if self.indirect_samples == 0 {
            return Err(invalid("indirect_samples", "must be at least 1"));
        }
        if self.stride == 0 {
            return Err(invalid("stride", "must be at least 1"));
        }
        if self.passes == 0 {
            return Err(invalid("passes", "must be at least 1"));
        }
        if let Some([x0, y0, x1, y1]) = self.crop {
            let crop = PixelBounds::new(x0, y0, x1, y1);
            if crop.is_empty() {
                return Err(invalid("crop", "crop window is empty"));
            }
            if !self.image_bounds().encloses(&crop) {
                return Err(invalid("crop", "crop window exceeds the image"));
            }
        }
        Ok(())
    }

    pub fn image_bounds(&self) -> PixelBounds {
        PixelBounds::from_resolution(self.image_width, self.image_height)
    }

    /// Region of the image this render covers.
    pub fn pixel_bounds(&self) -> PixelBounds {
        match self.crop {
            Some([x0, y0, x1, y1]) => PixelBounds::new(x0, y0, x1, y1),
            None => self.image_bounds(),
        }
    }

    /// Resolved worker thread count.
    pub fn thread_count(&self) -> usize {
        self.threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Oracle evaluation stride for a given pass.
    pub fn stride_for_pass(&self, pass: u32) -> u32 {
        self.stride.checked_shr(pass).unwrap_or(0).max(1)
    }
}
