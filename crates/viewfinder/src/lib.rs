//! Camera Viewfinder Engine
//!
//! Binds a camera preview to a host surface and layers live features on top:
//! - `CameraSessionManager`: acquire, configure, preview and release the device
//! - Barcode scanning of preview frames through `FrameDecodeScheduler`
//! - Pinch zoom and tap-to-focus through `GestureZoomFocusController`
//!
//! Host events (surface lifecycle, touches, setting changes) enter through
//! [`ViewFinder`]; decoded codes leave as `"BarCodeRead"` events on an
//! [`EventSink`].

pub mod config;
pub mod session;

pub use config::ViewFinderConfig;
pub use session::{
    CameraSessionManager, FrameHandler, Session, SessionState, StartOutcome, StopOutcome,
};

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use barcode_scanner::{
    ChannelSink, Decoder, EmittedEvent, EventSink, FrameDecodeScheduler, FrameDisposition,
    QrDecoder, ScanError, ScanStats,
};
use camera_capture::{
    CameraPool, CameraSelector, CaptureQuality, DeviceHandle, FlashMode, SurfaceBinding, TorchMode,
};
use gesture_control::{GestureZoomFocusController, TouchEvent, TouchOutcome};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Viewfinder error types
#[derive(Error, Debug)]
pub enum ViewFinderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("Scanner error: {0}")]
    Scanner(#[from] ScanError),
}

/// Initialize logging at the given max level (`"trace"` .. `"error"`)
pub fn init_logging(level: &str) -> Result<(), ViewFinderError> {
    let level: Level = level
        .parse()
        .map_err(|e| ViewFinderError::Logging(format!("invalid level '{}': {}", level, e)))?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ViewFinderError::Logging(e.to_string()))
}

/// Host-facing viewfinder: one session, one decode scheduler, one gesture controller
pub struct ViewFinder {
    session: Arc<CameraSessionManager>,
    scheduler: Arc<FrameDecodeScheduler>,
    gestures: Mutex<GestureZoomFocusController>,
}

impl ViewFinder {
    pub fn new(
        config: &ViewFinderConfig,
        pool: Arc<dyn CameraPool>,
        decoder: Arc<dyn Decoder>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, ViewFinderError> {
        let scheduler = Arc::new(FrameDecodeScheduler::new(
            &config.scanner,
            pool.clone(),
            decoder,
            sink,
        )?);

        let frames = scheduler.clone();
        let handler: FrameHandler = Arc::new(move |data: &[u8], device: &Arc<DeviceHandle>| {
            frames.on_frame(data, device);
        });
        let session = Arc::new(CameraSessionManager::new(config, pool, handler));

        info!("Viewfinder ready");
        Ok(Self {
            session,
            scheduler,
            gestures: Mutex::new(GestureZoomFocusController::new()),
        })
    }

    /// Viewfinder with the QR decoder, publishing into a tokio channel
    pub fn with_event_channel(
        config: &ViewFinderConfig,
        pool: Arc<dyn CameraPool>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<EmittedEvent>), ViewFinderError> {
        let (sink, events) = ChannelSink::channel();
        let viewfinder = Self::new(config, pool, Arc::new(QrDecoder::new()), Arc::new(sink))?;
        Ok((viewfinder, events))
    }

    pub fn session(&self) -> &Arc<CameraSessionManager> {
        &self.session
    }

    pub fn scheduler(&self) -> &FrameDecodeScheduler {
        &self.scheduler
    }

    pub fn on_surface_available(&self, binding: SurfaceBinding) -> StartOutcome {
        self.session.on_surface_available(binding)
    }

    pub fn on_surface_size_changed(&self, width: u32, height: u32) {
        self.session.on_surface_size_changed(width, height);
    }

    pub fn on_surface_destroyed(&self) -> bool {
        self.scheduler.cancel_pending();
        self.session.on_surface_destroyed()
    }

    /// Feed a preview buffer from the running device. `None` without a session.
    pub fn on_preview_frame(&self, data: &[u8]) -> Option<FrameDisposition> {
        let device = self.session.current_device()?;
        Some(self.scheduler.on_frame(data, &device))
    }

    pub fn on_touch(&self, event: &TouchEvent) -> TouchOutcome {
        let Some(device) = self.session.current_device() else {
            return TouchOutcome::ParametersUnavailable;
        };
        let surface_size = self.session.surface_size();
        self.gestures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_touch(event, &device, surface_size)
    }

    pub fn set_camera_type(&self, selector: CameraSelector) -> Option<JoinHandle<()>> {
        self.session.set_camera_type(selector)
    }

    pub fn set_capture_mode(&self, mode: i32) {
        self.session.set_capture_mode(mode);
    }

    pub fn set_capture_quality(&self, quality: CaptureQuality) {
        self.session.set_capture_quality(quality);
    }

    pub fn set_torch_mode(&self, mode: TorchMode) {
        self.session.set_torch_mode(mode);
    }

    pub fn set_flash_mode(&self, mode: FlashMode) {
        self.session.set_flash_mode(mode);
    }

    pub fn ratio(&self) -> Option<f64> {
        self.session.ratio()
    }

    pub fn scan_stats(&self) -> ScanStats {
        self.scheduler.stats()
    }

    /// Stop the session and the decode worker
    pub fn shutdown(&self) {
        self.session.stop();
        self.session.settle();
        self.scheduler.shutdown();
        info!("Viewfinder shut down");
    }
}
