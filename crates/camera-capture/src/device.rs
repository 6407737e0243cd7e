//! Camera device capabilities
//!
//! The driver is consumed through two traits: [`CameraPool`] hands out and
//! takes back devices keyed by [`CameraSelector`], and [`CameraDevice`] is one
//! opened camera. [`DeviceHandle`] wraps an opened device with the mutex that
//! serializes parameter read-modify-apply sequences.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;

use crate::params::{largest_area, CameraParameters, Size};
use crate::{CameraError, CameraSelector, CaptureQuality, FlashMode, TorchMode};

/// Callback receiving every raw preview buffer
pub type FrameCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Opaque identifier of a host rendering surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

/// Rendering surface the preview is bound to.
///
/// Owned by the host's rendering layer; the session only keeps a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceBinding {
    pub id: SurfaceId,
    pub width: u32,
    pub height: u32,
    pub valid: bool,
}

impl SurfaceBinding {
    pub fn new(id: SurfaceId, width: u32, height: u32) -> Self {
        Self {
            id,
            width,
            height,
            valid: true,
        }
    }
}

/// One opened camera
pub trait CameraDevice: Send + Sync {
    /// Read the current parameters.
    ///
    /// `CameraError::Unavailable` signals the transient "driver returned
    /// nothing" condition.
    fn parameters(&self) -> Result<CameraParameters, CameraError>;

    fn set_parameters(&self, params: &CameraParameters) -> Result<(), CameraError>;

    fn set_preview_surface(&self, surface: &SurfaceBinding) -> Result<(), CameraError>;

    fn start_preview(&self) -> Result<(), CameraError>;

    fn stop_preview(&self) -> Result<(), CameraError>;

    /// Install or detach (`None`) the preview frame callback
    fn set_frame_callback(&self, callback: Option<FrameCallback>);

    /// Start one autofocus cycle; the receiver resolves with its success flag
    fn auto_focus(&self) -> Result<oneshot::Receiver<bool>, CameraError>;

    fn cancel_auto_focus(&self);
}

/// Process-wide camera registry keyed by selector
pub trait CameraPool: Send + Sync {
    fn acquire(&self, selector: CameraSelector) -> Result<Arc<dyn CameraDevice>, CameraError>;

    fn release(&self, selector: CameraSelector);

    /// Raw host capture-mode code, validated by the session at start
    fn set_capture_mode(&self, selector: CameraSelector, mode: i32);

    fn set_capture_quality(&self, selector: CameraSelector, quality: CaptureQuality);

    fn set_torch_mode(&self, selector: CameraSelector, mode: TorchMode);

    fn set_flash_mode(&self, selector: CameraSelector, mode: FlashMode);

    /// Preview size last configured for the selector, if known
    fn preview_size(&self, selector: CameraSelector) -> Option<Size>;

    /// Current physical device orientation code (0 = natural)
    fn device_orientation(&self) -> i32;

    /// Whether the host has a barcode consumer attached
    fn is_barcode_scanner_enabled(&self) -> bool;

    /// Size selection policy; the largest area by default
    fn best_size(&self, sizes: &[Size]) -> Option<Size> {
        largest_area(sizes)
    }
}

/// Opened device plus the lock guarding its parameter object
pub struct DeviceHandle {
    selector: CameraSelector,
    device: Arc<dyn CameraDevice>,
    params_lock: Mutex<()>,
}

impl DeviceHandle {
    pub fn new(selector: CameraSelector, device: Arc<dyn CameraDevice>) -> Self {
        Self {
            selector,
            device,
            params_lock: Mutex::new(()),
        }
    }

    pub fn selector(&self) -> CameraSelector {
        self.selector
    }

    pub fn device(&self) -> &dyn CameraDevice {
        self.device.as_ref()
    }

    /// Read parameters under the parameter lock
    pub fn read_parameters(&self) -> Result<CameraParameters, CameraError> {
        let _guard = self.params_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.device.parameters()
    }

    /// Run a read-modify-apply sequence while holding the parameter lock.
    ///
    /// The closure receives the device and a fresh parameter snapshot and is
    /// responsible for writing it back.
    pub fn with_parameters<R>(
        &self,
        f: impl FnOnce(&dyn CameraDevice, &mut CameraParameters) -> Result<R, CameraError>,
    ) -> Result<R, CameraError> {
        let _guard = self.params_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut params = self.device.parameters()?;
        f(self.device.as_ref(), &mut params)
    }
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}
