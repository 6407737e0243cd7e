//! Camera Capture Library for the Viewfinder
//!
//! Models the camera hardware as opaque capabilities so the viewfinder
//! engine can run against real drivers or in-memory fakes:
//! - `CameraPool` / `CameraDevice` traits (acquire, configure, preview, autofocus)
//! - Camera parameters (focus modes, sizes, zoom, focus/metering areas)
//! - Raw preview frames and the 90° pixel rotation used before decoding
//! - Touch-to-focus area mapping

pub mod device;
pub mod focus;
pub mod frame;
pub mod params;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use device::{CameraDevice, CameraPool, DeviceHandle, FrameCallback, SurfaceBinding, SurfaceId};
pub use focus::{focus_area_from_touch, FOCUS_AREA_EDGE_LENGTH, FOCUS_AREA_WEIGHT};
pub use frame::{rotate_90, unrotate_90, PixelFormat, PreviewFrame};
pub use params::{largest_area, CameraArea, CameraParameters, FocusMode, Rect, Size};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    Open(String),

    /// Null-reference class: the driver handed back nothing for a read.
    #[error("Camera resource unavailable: {0}")]
    Unavailable(String),

    #[error("Unsupported capture mode: {0}")]
    UnsupportedCaptureMode(i32),

    #[error("No supported size for capture mode {0:?}")]
    NoSupportedSize(CaptureMode),

    #[error("Parameters rejected by device: {0}")]
    ParametersRejected(String),

    #[error("Frame buffer too small: expected at least {expected} bytes, got {actual}")]
    FrameSize { expected: usize, actual: usize },

    #[error("Preview error: {0}")]
    Preview(String),

    #[error("Surface not bound or invalid")]
    InvalidSurface,

    #[error("Cannot compute focus area: {0}")]
    FocusArea(String),

    #[error("Autofocus failed: {0}")]
    AutoFocus(String),
}

impl CameraError {
    /// Transient hardware conditions are logged and swallowed instead of
    /// tearing the session down. An empty size list is the same "driver
    /// returned nothing" condition as an unavailable parameter read.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CameraError::Unavailable(_) | CameraError::NoSupportedSize(_)
        )
    }
}

/// Which physical camera a session binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraSelector {
    Front,
    #[default]
    Back,
}

impl CameraSelector {
    /// Host-facing numeric code
    pub fn code(self) -> i32 {
        match self {
            CameraSelector::Front => 1,
            CameraSelector::Back => 2,
        }
    }
}

impl TryFrom<i32> for CameraSelector {
    type Error = CameraError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(CameraSelector::Front),
            2 => Ok(CameraSelector::Back),
            other => Err(CameraError::Open(format!("unknown camera type {}", other))),
        }
    }
}

/// Capture mode the session is configured for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    #[default]
    Still,
    Video,
}

impl CaptureMode {
    /// Host-facing numeric code
    pub fn code(self) -> i32 {
        match self {
            CaptureMode::Still => 0,
            CaptureMode::Video => 1,
        }
    }
}

impl TryFrom<i32> for CaptureMode {
    type Error = CameraError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(CaptureMode::Still),
            1 => Ok(CaptureMode::Video),
            other => Err(CameraError::UnsupportedCaptureMode(other)),
        }
    }
}

/// Capture quality preset, forwarded to the pool untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CaptureQuality {
    #[serde(rename = "low")]
    Low,
    #[serde(rename = "medium")]
    Medium,
    #[default]
    #[serde(rename = "high")]
    High,
    #[serde(rename = "photo")]
    Photo,
    #[serde(rename = "preview")]
    Preview,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
}

/// Torch (continuous light) mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TorchMode {
    #[default]
    Off,
    On,
    Auto,
}

/// Flash mode for still capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashMode {
    Off,
    On,
    #[default]
    Auto,
}
