//! Image Source Layer
//!
//! Acquires still images either from a capture device stream or from
//! user-supplied file bytes. Device streams are exclusive, scoped resources:
//! the `CaptureStream` guard releases the underlying device on drop, so a
//! camera handle is never leaked even when a session errors out mid-flight.

pub mod frame;

use thiserror::Error;
use tracing::{debug, info};

pub use frame::CapturedFrame;

/// Errors raised while acquiring an image
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Capture device denied or absent; the session stays idle
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),
    /// Uploaded bytes are not a decodable raster image
    #[error("invalid image format: {0}")]
    InvalidImageFormat(String),
    /// Stream-level failure while a device was already acquired
    #[error("capture stream error: {0}")]
    Stream(String),
}

/// Which camera to request on multi-camera devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraFacing {
    /// Rear-facing camera, preferred for photographing a card on a table
    #[default]
    Environment,
    /// Front-facing camera
    User,
}

/// Capture device configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CaptureConfig {
    /// Camera selection hint
    pub facing: CameraFacing,
    /// Ideal stream width in pixels
    pub ideal_width: u32,
    /// Ideal stream height in pixels
    pub ideal_height: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            facing: CameraFacing::Environment,
            ideal_width: 1280,
            ideal_height: 720,
        }
    }
}

/// Abstraction over a live frame source (camera backend).
///
/// Implementations acquire the device in `start` and must release it in
/// `stop`. `stop` is called again from the stream guard's `Drop`, so it has
/// to be idempotent.
pub trait FrameSource: Send {
    /// Acquire the device and begin streaming
    fn start(&mut self, config: &CaptureConfig) -> Result<(), CaptureError>;
    /// Grab one still frame from the running stream
    fn capture_frame(&mut self) -> Result<CapturedFrame, CaptureError>;
    /// Release the device
    fn stop(&mut self);
}

/// Scoped handle over an active capture stream.
///
/// Exactly one stream exists per session; switching capture mode means
/// dropping this guard before opening a new one.
pub struct CaptureStream {
    source: Box<dyn FrameSource>,
}

impl CaptureStream {
    /// Start a stream on the given source, acquiring the device
    pub fn open(mut source: Box<dyn FrameSource>, config: &CaptureConfig) -> Result<Self, CaptureError> {
        source.start(config)?;
        info!(
            "Capture stream opened ({:?}, ideal {}x{})",
            config.facing, config.ideal_width, config.ideal_height
        );
        Ok(Self { source })
    }

    /// Grab one frame from the stream
    pub fn capture_frame(&mut self) -> Result<CapturedFrame, CaptureError> {
        let frame = self.source.capture_frame()?;
        debug!("Captured {}x{} frame", frame.width, frame.height);
        Ok(frame)
    }
}

impl Drop for CaptureStream {
    fn drop(&mut self) {
        self.source.stop();
        debug!("Capture stream released");
    }
}

/// Decode user-supplied file bytes into a frame.
///
/// Anything the `image` crate cannot decode is rejected before it reaches
/// the region extractor.
pub fn load_from_bytes(bytes: &[u8]) -> Result<CapturedFrame, CaptureError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| CaptureError::InvalidImageFormat(e.to_string()))?;

    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    info!("Loaded {}x{} image from file bytes", width, height);

    Ok(CapturedFrame::new(rgba.into_raw(), width, height))
}
