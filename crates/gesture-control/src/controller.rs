//! Zoom and focus gesture controller

use std::sync::Arc;
use std::thread::JoinHandle;

use camera_capture::{
    focus_area_from_touch, CameraDevice, CameraParameters, DeviceHandle, FocusMode,
};
use tracing::{debug, trace, warn};

use crate::touch::{TouchAction, TouchEvent};
use crate::GestureError;

/// Per-sequence gesture state
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GestureState {
    /// Finger spacing at the last pinch event
    pub finger_spacing: f32,
}

/// Waits for a tap-triggered autofocus cycle and locks the lens once it succeeds
#[derive(Debug)]
pub struct FocusLock {
    watcher: JoinHandle<bool>,
}

impl FocusLock {
    /// Block until the cycle resolves. `true` if focus succeeded and was locked.
    pub fn wait(self) -> bool {
        self.watcher.join().unwrap_or(false)
    }
}

/// What a touch event did to the camera. Every event counts as handled.
#[derive(Debug)]
pub enum TouchOutcome {
    /// No camera change for this event
    Ignored,
    /// Parameter read failed transiently; nothing applied
    ParametersUnavailable,
    /// Second finger down; pinch baseline recorded
    ZoomBaseline(f32),
    /// Zoom applied at the given level
    Zoomed(u32),
    /// Device lacks auto focus or focus areas
    FocusUnsupported,
    /// Focus area applied and autofocus cycle started
    Focusing(FocusLock),
    /// A camera call failed; logged
    Failed,
}

/// Next zoom level for a pinch move, clamped to `0..=max_zoom`
pub(crate) fn next_zoom(zoom: u32, max_zoom: u32, baseline: f32, spacing: f32) -> u32 {
    let zoom = zoom.min(max_zoom);
    if spacing > baseline {
        zoom.saturating_add(1).min(max_zoom)
    } else if spacing < baseline {
        zoom.saturating_sub(1)
    } else {
        zoom
    }
}

/// Maps touch events to zoom and focus requests on the live device
#[derive(Debug, Default)]
pub struct GestureZoomFocusController {
    state: GestureState,
}

impl GestureZoomFocusController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    /// Interpret one touch event against the session's device.
    ///
    /// `surface_size` is the current preview surface size, used to map taps
    /// into focus areas.
    pub fn on_touch(
        &mut self,
        event: &TouchEvent,
        device: &Arc<DeviceHandle>,
        surface_size: (u32, u32),
    ) -> TouchOutcome {
        if event.action == TouchAction::Down {
            self.state = GestureState::default();
        }

        let result = device.with_parameters(|camera, params| {
            Ok(self.dispatch(event, camera, params, device, surface_size))
        });

        match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!("Touch gesture failed: {}", e);
                TouchOutcome::Failed
            }
            Err(e) if e.is_transient() => {
                debug!("Camera parameters unavailable for touch: {}", e);
                TouchOutcome::ParametersUnavailable
            }
            Err(e) => {
                warn!("Cannot read camera parameters for touch: {}", e);
                TouchOutcome::Failed
            }
        }
    }

    fn dispatch(
        &mut self,
        event: &TouchEvent,
        camera: &dyn CameraDevice,
        params: &mut CameraParameters,
        device: &Arc<DeviceHandle>,
        surface_size: (u32, u32),
    ) -> Result<TouchOutcome, GestureError> {
        if event.pointer_count() > 1 {
            let spacing = event.finger_spacing().unwrap_or_default();
            return match event.action {
                TouchAction::PointerDown => {
                    self.state.finger_spacing = spacing;
                    Ok(TouchOutcome::ZoomBaseline(spacing))
                }
                TouchAction::Move if params.zoom_supported => {
                    camera.cancel_auto_focus();
                    self.zoom(spacing, camera, params)
                }
                _ => Ok(TouchOutcome::Ignored),
            };
        }

        if event.action == TouchAction::Up {
            return self.focus_at(event, camera, params, device, surface_size);
        }
        Ok(TouchOutcome::Ignored)
    }

    fn zoom(
        &mut self,
        spacing: f32,
        camera: &dyn CameraDevice,
        params: &mut CameraParameters,
    ) -> Result<TouchOutcome, GestureError> {
        let zoom = next_zoom(params.zoom, params.max_zoom, self.state.finger_spacing, spacing);
        self.state.finger_spacing = spacing;

        params.zoom = zoom;
        camera.set_parameters(params)?;
        trace!("Zoom set to {}/{}", zoom, params.max_zoom);
        Ok(TouchOutcome::Zoomed(zoom))
    }

    fn focus_at(
        &self,
        event: &TouchEvent,
        camera: &dyn CameraDevice,
        params: &mut CameraParameters,
        device: &Arc<DeviceHandle>,
        (surface_width, surface_height): (u32, u32),
    ) -> Result<TouchOutcome, GestureError> {
        // Without focus areas there is nothing to aim
        if !params.supports_focus_mode(FocusMode::Auto) || params.max_focus_areas == 0 {
            return Ok(TouchOutcome::FocusUnsupported);
        }
        let Some(point) = event.pointers.first() else {
            return Ok(TouchOutcome::Ignored);
        };

        camera.cancel_auto_focus();

        let area = match focus_area_from_touch(point.x, point.y, surface_width, surface_height) {
            Ok(area) => area,
            Err(e) => {
                warn!("Focus area unavailable: {}", e);
                return Ok(TouchOutcome::Failed);
            }
        };

        // An explicit tap overrides any continuous focus mode set at start
        params.focus_mode = Some(FocusMode::Auto);
        params.focus_areas = vec![area];
        if params.max_metering_areas > 0 {
            params.metering_areas = vec![area];
        }
        camera.set_parameters(params)?;

        let completion = match camera.auto_focus() {
            Ok(rx) => rx,
            Err(e) => {
                warn!("Autofocus could not start: {}", e);
                return Ok(TouchOutcome::Failed);
            }
        };

        let handle = device.clone();
        let watcher = std::thread::Builder::new()
            .name("autofocus-lock".to_string())
            .spawn(move || match completion.blocking_recv() {
                Ok(true) => {
                    handle.device().cancel_auto_focus();
                    true
                }
                Ok(false) => false,
                Err(_) => {
                    debug!("Autofocus completion dropped by driver");
                    false
                }
            })?;

        debug!("Focusing at ({:.0}, {:.0})", point.x, point.y);
        Ok(TouchOutcome::Focusing(FocusLock { watcher }))
    }
}
