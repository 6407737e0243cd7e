//! Camera parameter model

use serde::{Deserialize, Serialize};

use crate::CaptureMode;

/// Focus mode supported by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FocusMode {
    Auto,
    ContinuousPicture,
    ContinuousVideo,
    Infinity,
    Macro,
    Fixed,
    Edof,
}

/// Frame or picture size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Rectangle in the driver's normalized -1000..=1000 area space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// Focus or metering area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraArea {
    pub rect: Rect,
    /// Relative weight, 1..=1000
    pub weight: i32,
}

/// Snapshot of a device's configurable parameters.
///
/// Read with [`crate::CameraDevice::parameters`], modified locally and
/// written back with [`crate::CameraDevice::set_parameters`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraParameters {
    pub supported_focus_modes: Vec<FocusMode>,
    pub focus_mode: Option<FocusMode>,
    pub supported_picture_sizes: Vec<Size>,
    pub supported_video_sizes: Vec<Size>,
    pub picture_size: Option<Size>,
    /// Size of the frames delivered to the preview callback
    pub preview_size: Option<Size>,
    pub zoom_supported: bool,
    pub zoom: u32,
    pub max_zoom: u32,
    pub max_focus_areas: u32,
    pub max_metering_areas: u32,
    pub focus_areas: Vec<CameraArea>,
    pub metering_areas: Vec<CameraArea>,
}

impl CameraParameters {
    pub fn supports_focus_mode(&self, mode: FocusMode) -> bool {
        self.supported_focus_modes.contains(&mode)
    }

    /// Sizes the device offers for the given capture mode
    pub fn sizes_for(&self, mode: CaptureMode) -> &[Size] {
        match mode {
            CaptureMode::Still => &self.supported_picture_sizes,
            CaptureMode::Video => &self.supported_video_sizes,
        }
    }

    /// Pick the preferred focus mode for a capture mode.
    ///
    /// Continuous picture for stills, continuous video for video, then plain
    /// auto. Returns `None` when the device supports none of them.
    pub fn preferred_focus_mode(&self, mode: CaptureMode) -> Option<FocusMode> {
        let continuous = match mode {
            CaptureMode::Still => FocusMode::ContinuousPicture,
            CaptureMode::Video => FocusMode::ContinuousVideo,
        };
        [continuous, FocusMode::Auto]
            .into_iter()
            .find(|m| self.supports_focus_mode(*m))
    }
}

/// Size with the greatest area.
///
/// Ties resolve by enumeration order of `sizes`; callers must not rely on
/// which of several equal-area sizes wins.
pub fn largest_area(sizes: &[Size]) -> Option<Size> {
    sizes.iter().copied().max_by_key(Size::area)
}
