//! In-memory camera pool and device for tests
//!
//! Every driver call is appended to a log shared by the pool and its
//! cameras, so tests can assert on ordering across devices.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::device::{CameraDevice, CameraPool, FrameCallback, SurfaceBinding};
use crate::params::{CameraParameters, FocusMode, Size};
use crate::{CameraError, CameraSelector, CaptureQuality, FlashMode, TorchMode};

/// Recorded driver call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Acquire(CameraSelector),
    Release(CameraSelector),
    CaptureMode(CameraSelector, i32),
    CaptureQuality(CameraSelector, CaptureQuality),
    TorchMode(CameraSelector, TorchMode),
    FlashMode(CameraSelector, FlashMode),
    SetParameters(CameraSelector),
    SetPreviewSurface(CameraSelector),
    StartPreview(CameraSelector),
    StopPreview(CameraSelector),
    AttachCallback(CameraSelector),
    DetachCallback(CameraSelector),
    AutoFocus(CameraSelector),
    CancelAutoFocus(CameraSelector),
}

type OpLog = Arc<Mutex<Vec<Op>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fake opened camera
pub struct FakeCamera {
    selector: CameraSelector,
    params: Mutex<CameraParameters>,
    callback: Mutex<Option<FrameCallback>>,
    log: OpLog,
    parameters_unavailable: AtomicBool,
    reject_parameters: AtomicBool,
    autofocus_result: Mutex<Option<bool>>,
}

impl FakeCamera {
    fn new(selector: CameraSelector, log: OpLog) -> Self {
        Self {
            selector,
            params: Mutex::new(Self::default_parameters()),
            callback: Mutex::new(None),
            log,
            parameters_unavailable: AtomicBool::new(false),
            reject_parameters: AtomicBool::new(false),
            autofocus_result: Mutex::new(Some(true)),
        }
    }

    /// Parameters of a typical phone camera
    pub fn default_parameters() -> CameraParameters {
        CameraParameters {
            supported_focus_modes: vec![
                FocusMode::Auto,
                FocusMode::ContinuousPicture,
                FocusMode::ContinuousVideo,
            ],
            focus_mode: None,
            supported_picture_sizes: vec![
                Size::new(640, 480),
                Size::new(4000, 3000),
                Size::new(1920, 1080),
            ],
            supported_video_sizes: vec![Size::new(1280, 720), Size::new(1920, 1080)],
            picture_size: None,
            preview_size: Some(Size::new(640, 480)),
            zoom_supported: true,
            zoom: 0,
            max_zoom: 10,
            max_focus_areas: 1,
            max_metering_areas: 1,
            focus_areas: Vec::new(),
            metering_areas: Vec::new(),
        }
    }

    pub fn params(&self) -> CameraParameters {
        lock(&self.params).clone()
    }

    pub fn replace_params(&self, params: CameraParameters) {
        *lock(&self.params) = params;
    }

    /// Make `parameters()` report `CameraError::Unavailable`
    pub fn set_parameters_unavailable(&self, unavailable: bool) {
        self.parameters_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make `set_parameters()` fail with `CameraError::ParametersRejected`
    pub fn set_reject_parameters(&self, reject: bool) {
        self.reject_parameters.store(reject, Ordering::SeqCst);
    }

    /// Result the next autofocus cycles resolve with; `None` drops the sender
    pub fn set_autofocus_result(&self, result: Option<bool>) {
        *lock(&self.autofocus_result) = result;
    }

    pub fn has_callback(&self) -> bool {
        lock(&self.callback).is_some()
    }

    /// Push a raw buffer through the installed preview callback
    pub fn deliver_frame(&self, data: &[u8]) -> bool {
        let callback = lock(&self.callback).clone();
        match callback {
            Some(cb) => {
                cb(data);
                true
            }
            None => false,
        }
    }

    fn record(&self, op: Op) {
        lock(&self.log).push(op);
    }
}

impl CameraDevice for FakeCamera {
    fn parameters(&self) -> Result<CameraParameters, CameraError> {
        if self.parameters_unavailable.load(Ordering::SeqCst) {
            return Err(CameraError::Unavailable("parameters".to_string()));
        }
        Ok(self.params())
    }

    fn set_parameters(&self, params: &CameraParameters) -> Result<(), CameraError> {
        self.record(Op::SetParameters(self.selector));
        if self.reject_parameters.load(Ordering::SeqCst) {
            return Err(CameraError::ParametersRejected("fake rejection".to_string()));
        }
        *lock(&self.params) = params.clone();
        Ok(())
    }

    fn set_preview_surface(&self, _surface: &SurfaceBinding) -> Result<(), CameraError> {
        self.record(Op::SetPreviewSurface(self.selector));
        Ok(())
    }

    fn start_preview(&self) -> Result<(), CameraError> {
        self.record(Op::StartPreview(self.selector));
        Ok(())
    }

    fn stop_preview(&self) -> Result<(), CameraError> {
        self.record(Op::StopPreview(self.selector));
        Ok(())
    }

    fn set_frame_callback(&self, callback: Option<FrameCallback>) {
        self.record(match callback {
            Some(_) => Op::AttachCallback(self.selector),
            None => Op::DetachCallback(self.selector),
        });
        *lock(&self.callback) = callback;
    }

    fn auto_focus(&self) -> Result<oneshot::Receiver<bool>, CameraError> {
        self.record(Op::AutoFocus(self.selector));
        let (tx, rx) = oneshot::channel();
        if let Some(success) = *lock(&self.autofocus_result) {
            let _ = tx.send(success);
        }
        Ok(rx)
    }

    fn cancel_auto_focus(&self) {
        self.record(Op::CancelAutoFocus(self.selector));
    }
}

/// Fake camera pool with one camera per selector
pub struct FakePool {
    cameras: HashMap<CameraSelector, Arc<FakeCamera>>,
    log: OpLog,
    orientation: AtomicI32,
    scanner_enabled: AtomicBool,
    acquire_delay: Mutex<Duration>,
    release_delay: Mutex<Duration>,
    acquire_fails: AtomicBool,
}

impl Default for FakePool {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePool {
    pub fn new() -> Self {
        let log: OpLog = Arc::new(Mutex::new(Vec::new()));
        let cameras = [CameraSelector::Front, CameraSelector::Back]
            .into_iter()
            .map(|s| (s, Arc::new(FakeCamera::new(s, log.clone()))))
            .collect();
        Self {
            cameras,
            log,
            orientation: AtomicI32::new(90),
            scanner_enabled: AtomicBool::new(true),
            acquire_delay: Mutex::new(Duration::ZERO),
            release_delay: Mutex::new(Duration::ZERO),
            acquire_fails: AtomicBool::new(false),
        }
    }

    pub fn camera(&self, selector: CameraSelector) -> Arc<FakeCamera> {
        // Both selectors are populated in `new`
        self.cameras[&selector].clone()
    }

    /// Snapshot of every recorded driver call
    pub fn ops(&self) -> Vec<Op> {
        lock(&self.log).clone()
    }

    pub fn clear_ops(&self) {
        lock(&self.log).clear();
    }

    pub fn count(&self, op: &Op) -> usize {
        lock(&self.log).iter().filter(|o| *o == op).count()
    }

    pub fn set_orientation(&self, orientation: i32) {
        self.orientation.store(orientation, Ordering::SeqCst);
    }

    pub fn set_scanner_enabled(&self, enabled: bool) {
        self.scanner_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Stall `acquire` to widen start-up race windows
    pub fn set_acquire_delay(&self, delay: Duration) {
        *lock(&self.acquire_delay) = delay;
    }

    /// Stall `release` to widen teardown race windows
    pub fn set_release_delay(&self, delay: Duration) {
        *lock(&self.release_delay) = delay;
    }

    pub fn set_acquire_fails(&self, fails: bool) {
        self.acquire_fails.store(fails, Ordering::SeqCst);
    }

    fn record(&self, op: Op) {
        lock(&self.log).push(op);
    }
}

impl CameraPool for FakePool {
    fn acquire(&self, selector: CameraSelector) -> Result<Arc<dyn CameraDevice>, CameraError> {
        self.record(Op::Acquire(selector));
        let delay = *lock(&self.acquire_delay);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if self.acquire_fails.load(Ordering::SeqCst) {
            return Err(CameraError::Open(format!("{:?} camera busy", selector)));
        }
        let camera: Arc<dyn CameraDevice> = self.camera(selector);
        Ok(camera)
    }

    fn release(&self, selector: CameraSelector) {
        self.record(Op::Release(selector));
        let delay = *lock(&self.release_delay);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }

    fn set_capture_mode(&self, selector: CameraSelector, mode: i32) {
        self.record(Op::CaptureMode(selector, mode));
    }

    fn set_capture_quality(&self, selector: CameraSelector, quality: CaptureQuality) {
        self.record(Op::CaptureQuality(selector, quality));
    }

    fn set_torch_mode(&self, selector: CameraSelector, mode: TorchMode) {
        self.record(Op::TorchMode(selector, mode));
    }

    fn set_flash_mode(&self, selector: CameraSelector, mode: FlashMode) {
        self.record(Op::FlashMode(selector, mode));
    }

    fn preview_size(&self, selector: CameraSelector) -> Option<Size> {
        self.camera(selector).params().preview_size
    }

    fn device_orientation(&self) -> i32 {
        self.orientation.load(Ordering::SeqCst)
    }

    fn is_barcode_scanner_enabled(&self) -> bool {
        self.scanner_enabled.load(Ordering::SeqCst)
    }
}
