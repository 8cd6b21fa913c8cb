//! IILE Core - data types shared by the renderer and its oracle.
//!
//! This crate provides:
//!
//! - **Rasters**: `Raster`, the flat float image exchanged with the oracle
//!   and produced by the films
//! - **Settings**: `RenderSettings` and `OracleSettings`, loaded from JSON
//!   and validated before a render starts
//!
//! # Example
//!
//! ```ignore
//! use iile_core::RenderSettings;
//!
//! let settings = RenderSettings::from_file("render.json")?;
//! let command = settings.oracle.resolve()?;
//! println!("oracle: {} {:?}", command.program, command.args);
//! ```

pub mod raster;
pub mod settings;

// Re-export commonly used types
pub use raster::{Raster, RasterError};
pub use settings::{
    ConfigError, ConfigResult, ConnectorMode, OracleCommand, OracleSettings, RenderSettings,
    DEFAULT_TILE_SIZE, ORACLE_PATH_ENV,
};
