//! Gesture Control for the Camera Viewfinder
//!
//! Translates touch input into camera commands:
//! - Two-finger pinch steps the zoom level by one per move event
//! - Single-finger tap focuses and meters on the touched point

mod controller;
mod touch;

pub use controller::{FocusLock, GestureState, GestureZoomFocusController, TouchOutcome};
pub use touch::{TouchAction, TouchEvent, TouchPoint};

use camera_capture::CameraError;
use thiserror::Error;

/// Gesture handling errors. Logged by the controller, never surfaced to the host.
#[derive(Debug, Error)]
pub enum GestureError {
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Failed to spawn autofocus watcher: {0}")]
    Watcher(#[from] std::io::Error),
}
