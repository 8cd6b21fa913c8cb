//! Inference connector: one hemisphere request, one oracle round trip.
//!
//! Wire layout of an exchange, every float little-endian binary32:
//!
//! 1. intensity raster, `H*W*1` floats
//! 2. distance raster, `H*W*1` floats
//! 3. normal raster, `H*W*3` floats
//! 4. intensity normalization scalar
//! 5. distance normalization scalar
//!
//! and the oracle answers with
//!
//! 6. an `S*S*3` float raster, `S` the configured hemisphere side
//! 7. the two byte trailer `b"x\n"`
//!
//! Rasters go out row by row, x fastest, channels interleaved. There is no
//! length prefix or checksum, so any failure leaves the stream in an unknown
//! position and the connector refuses every later exchange.

use std::sync::{Mutex, PoisonError};

use iile_core::{ConfigError, OracleSettings, Raster};
use thiserror::Error;

use crate::channel::{ChannelError, FramedChannel, ProcessChannel};
use crate::normalization::NormalizationState;

/// Bytes that close every oracle reply.
pub const TRAILER: [u8; 2] = [b'x', b'\n'];

/// Channels per pixel of the oracle's reply.
pub const REPLY_COMPONENTS: usize = 3;

/// Errors raised by an oracle exchange.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("raster has {components} components, only 1 or 3 can be sent")]
    InvalidComponents { components: usize },

    #[error("failed writing {stage}: {source}")]
    Write {
        stage: &'static str,
        #[source]
        source: ChannelError,
    },

    #[error("reply ended after {pixels_read} of {expected} pixels: {source}")]
    ShortRead {
        pixels_read: usize,
        expected: usize,
        #[source]
        source: ChannelError,
    },

    #[error("failed reading reply trailer: {0}")]
    TrailerRead(#[source] ChannelError),

    #[error("reply trailer mismatch: got {received:?}, expected {:?}", TRAILER)]
    TrailerMismatch { received: [u8; 2] },

    #[error("connector is desynchronized by an earlier failure")]
    Poisoned,
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while starting an oracle connector.
#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
}

fn check_components(raster: &Raster) -> ProtocolResult<()> {
    match raster.components() {
        1 | 3 => Ok(()),
        components => Err(ProtocolError::InvalidComponents { components }),
    }
}

/// Synchronous request/response endpoint that predicts an irradiance hemisphere.
pub trait IrradianceOracle {
    /// Send one hemisphere and block for the prediction.
    ///
    /// The normalization pair travels as a single value so the scalars sent
    /// here are the ones the caller later uses downstream.
    fn predict(
        &mut self,
        intensity: &Raster,
        distance: &Raster,
        normals: &Raster,
        normalization: &NormalizationState,
    ) -> ProtocolResult<Raster>;
}

/// Connector owning a channel to one oracle.
pub struct NnConnector<C: FramedChannel> {
    channel: C,
    hemi_size: u32,
    poisoned: bool,
}

impl NnConnector<ProcessChannel> {
    /// Resolve the oracle program from settings and start it.
    pub fn launch(oracle: &OracleSettings, hemi_size: u32) -> Result<Self, ConnectorError> {
        let command = oracle.resolve()?;
        let channel = ProcessChannel::spawn(&command)?;
        Ok(Self::new(channel, hemi_size))
    }
}

impl<C: FramedChannel> NnConnector<C> {
    pub fn new(channel: C, hemi_size: u32) -> Self {
        Self {
            channel,
            hemi_size,
            poisoned: false,
        }
    }

    /// Side length of the rasters the oracle answers with.
    pub fn hemi_size(&self) -> u32 {
        self.hemi_size
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Refuse every later exchange.
    pub fn poison(&mut self) {
        self.poisoned = true;
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn into_channel(self) -> C {
        self.channel
    }

    fn ensure_usable(&self) -> ProtocolResult<()> {
        if self.poisoned {
            Err(ProtocolError::Poisoned)
        } else {
            Ok(())
        }
    }

    /// Wrap a result so any failure poisons the connector.
    fn guard<T>(&mut self, result: ProtocolResult<T>) -> ProtocolResult<T> {
        if let Err(e) = &result {
            log::error!("Oracle exchange failed, connector is now unusable: {}", e);
            self.poisoned = true;
        }
        result
    }

    fn write_raster(&mut self, raster: &Raster, stage: &'static str) -> ProtocolResult<()> {
        let write = |source: ChannelError| ProtocolError::Write { stage, source };
        for &value in raster.data() {
            self.channel.write_f32(value).map_err(write)?;
        }
        Ok(())
    }

    /// Serialize one raster: rows in order, x fastest, one float per channel.
    ///
    /// Emits exactly `width * height * components` floats. A component count
    /// other than 1 or 3 is rejected before anything is written.
    pub fn send_raster(&mut self, raster: &Raster) -> ProtocolResult<()> {
        self.ensure_usable()?;
        check_components(raster)?;
        let result = self.write_raster(raster, "raster");
        self.guard(result)
    }

    fn read_reply(&mut self) -> ProtocolResult<Raster> {
        let side = self.hemi_size;
        let expected = side as usize * side as usize;
        let mut reply = Raster::new(side, side, REPLY_COMPONENTS);

        for (pixels_read, pixel) in reply.data_mut().chunks_exact_mut(REPLY_COMPONENTS).enumerate() {
            for value in pixel.iter_mut() {
                *value = self
                    .channel
                    .read_f32()
                    .map_err(|source| ProtocolError::ShortRead {
                        pixels_read,
                        expected,
                        source,
                    })?;
            }
        }

        let mut received = [0u8; 2];
        for byte in received.iter_mut() {
            *byte = self.channel.read_byte().map_err(ProtocolError::TrailerRead)?;
        }
        if received != TRAILER {
            return Err(ProtocolError::TrailerMismatch { received });
        }
        Ok(reply)
    }

    fn exchange(
        &mut self,
        intensity: &Raster,
        distance: &Raster,
        normals: &Raster,
        intensity_norm: f32,
        distance_norm: f32,
    ) -> ProtocolResult<Raster> {
        let write =
            |stage: &'static str| move |source: ChannelError| ProtocolError::Write { stage, source };

        self.write_raster(intensity, "intensity raster")?;
        self.write_raster(distance, "distance raster")?;
        self.write_raster(normals, "normal raster")?;
        self.channel
            .write_f32(intensity_norm)
            .map_err(write("intensity normalization"))?;
        self.channel
            .write_f32(distance_norm)
            .map_err(write("distance normalization"))?;
        self.channel.flush().map_err(write("request flush"))?;

        self.read_reply()
    }

    /// One full round trip with the oracle.
    ///
    /// Returns the reply only when every pixel arrived and the trailer
    /// matched. Partially read rasters are dropped, never returned. Any
    /// failure after the first byte is written poisons the connector.
    pub fn communicate(
        &mut self,
        intensity: &Raster,
        distance: &Raster,
        normals: &Raster,
        intensity_norm: f32,
        distance_norm: f32,
    ) -> ProtocolResult<Raster> {
        self.ensure_usable()?;
        // Validate everything first: a bad third raster must not leave the
        // first two on the wire.
        check_components(intensity)?;
        check_components(distance)?;
        check_components(normals)?;

        let result = self.exchange(intensity, distance, normals, intensity_norm, distance_norm);
        self.guard(result)
    }
}

impl<C: FramedChannel> IrradianceOracle for NnConnector<C> {
    fn predict(
        &mut self,
        intensity: &Raster,
        distance: &Raster,
        normals: &Raster,
        normalization: &NormalizationState,
    ) -> ProtocolResult<Raster> {
        let (intensity_norm, distance_norm) = normalization.wire_scalars();
        self.communicate(intensity, distance, normals, intensity_norm, distance_norm)
    }
}

/// One connector shared by several render threads.
///
/// The lock is held for the whole exchange; interleaving two requests on
/// the stream would desynchronize it for good.
pub struct SharedConnector<C: FramedChannel> {
    inner: Mutex<NnConnector<C>>,
}

impl<C: FramedChannel> SharedConnector<C> {
    pub fn new(connector: NnConnector<C>) -> Self {
        Self {
            inner: Mutex::new(connector),
        }
    }

    pub fn is_poisoned(&self) -> bool {
        self.inner
            .lock()
            .map(|c| c.is_poisoned())
            .unwrap_or(true)
    }

    pub fn into_inner(self) -> NnConnector<C> {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: FramedChannel> IrradianceOracle for &SharedConnector<C> {
    fn predict(
        &mut self,
        intensity: &Raster,
        distance: &Raster,
        normals: &Raster,
        normalization: &NormalizationState,
    ) -> ProtocolResult<Raster> {
        let mut connector = self.inner.lock().unwrap_or_else(|poisoned| {
            // A thread died mid-exchange; the stream position is unknown.
            let mut connector = poisoned.into_inner();
            connector.poison();
            connector
        });
        connector.predict(intensity, distance, normals, normalization)
    }
}
