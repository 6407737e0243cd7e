//! Camera session lifecycle
//!
//! `Idle → Starting → Running → Stopping → Idle`. Transitions are taken under
//! a short lock; device calls run outside it, so a trigger that finds the
//! machine mid-transition returns immediately instead of waiting.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::JoinHandle;

use camera_capture::{
    CameraError, CameraPool, CameraSelector, CaptureMode, CaptureQuality, DeviceHandle,
    FlashMode, FrameCallback, SurfaceBinding, TorchMode,
};
use tracing::{debug, error, info, warn};

use crate::config::ViewFinderConfig;

/// Receives every preview buffer together with the device that produced it
pub type FrameHandler = Arc<dyn Fn(&[u8], &Arc<DeviceHandle>) + Send + Sync>;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Running,
    Stopping,
}

/// Result of a `start()` trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// Another start is in progress or a session already runs
    Ignored,
    /// A stop is in progress; the start runs as soon as it finishes
    Deferred,
    /// No valid surface is bound
    NoSurface,
    /// Transient error swallowed. The lifecycle is back to `Idle` and an
    /// acquired device stays held for the next start to reuse.
    Degraded(CameraError),
    /// Configuration error; the partial session was torn down
    Failed(CameraError),
}

/// Result of a `stop()` trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    /// A start is in flight; it tears itself down when it finishes
    Deferred,
    /// Nothing running, or another stop is in progress
    Ignored,
}

/// Live binding between an opened device and the preview surface
#[derive(Debug, Clone)]
pub struct Session {
    pub device: Arc<DeviceHandle>,
    pub selector: CameraSelector,
    pub capture_mode: Option<CaptureMode>,
    pub active: bool,
}

/// Host settings cached for reapplication on every start
#[derive(Debug, Clone, Copy)]
struct Settings {
    selector: CameraSelector,
    capture_mode: i32,
    capture_quality: Option<CaptureQuality>,
    torch_mode: Option<TorchMode>,
    flash_mode: Option<FlashMode>,
}

#[derive(Debug)]
struct Lifecycle {
    state: SessionState,
    stop_requested: bool,
    start_requested: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns acquisition, configuration and release of the camera device
pub struct CameraSessionManager {
    pool: Arc<dyn CameraPool>,
    frame_handler: FrameHandler,
    lifecycle: Mutex<Lifecycle>,
    /// Signalled on every transition into `Idle` or `Running`
    settled: Condvar,
    settings: Mutex<Settings>,
    surface: Mutex<Option<SurfaceBinding>>,
    session: Mutex<Option<Session>>,
}

impl CameraSessionManager {
    /// Create an idle manager with the configured initial settings
    pub fn new(
        config: &ViewFinderConfig,
        pool: Arc<dyn CameraPool>,
        frame_handler: FrameHandler,
    ) -> Self {
        info!(
            "Creating camera session manager: camera={:?}, capture_mode={}",
            config.camera, config.capture_mode
        );
        Self {
            pool,
            frame_handler,
            lifecycle: Mutex::new(Lifecycle {
                state: SessionState::Idle,
                stop_requested: false,
                start_requested: false,
            }),
            settled: Condvar::new(),
            settings: Mutex::new(Settings {
                selector: config.camera,
                capture_mode: config.capture_mode,
                capture_quality: config.capture_quality,
                torch_mode: config.torch_mode,
                flash_mode: config.flash_mode,
            }),
            surface: Mutex::new(None),
            session: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        lock(&self.lifecycle).state
    }

    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    pub fn camera_type(&self) -> CameraSelector {
        lock(&self.settings).selector
    }

    /// Device of the previewing session, if one is running
    pub fn current_device(&self) -> Option<Arc<DeviceHandle>> {
        lock(&self.session)
            .as_ref()
            .filter(|s| s.active)
            .map(|s| s.device.clone())
    }

    pub fn session(&self) -> Option<Session> {
        lock(&self.session).clone()
    }

    pub fn surface(&self) -> Option<SurfaceBinding> {
        *lock(&self.surface)
    }

    /// Current surface size, `(0, 0)` when no surface is bound
    pub fn surface_size(&self) -> (u32, u32) {
        self.surface().map_or((0, 0), |s| (s.width, s.height))
    }

    /// Preview aspect ratio (width / height) of the selected camera
    pub fn ratio(&self) -> Option<f64> {
        let size = self.pool.preview_size(self.camera_type())?;
        (size.height > 0).then(|| f64::from(size.width) / f64::from(size.height))
    }

    pub fn on_surface_available(&self, binding: SurfaceBinding) -> StartOutcome {
        debug!("Surface {:?} available ({}x{})", binding.id, binding.width, binding.height);
        *lock(&self.surface) = Some(binding);
        self.start()
    }

    pub fn on_surface_size_changed(&self, width: u32, height: u32) {
        if let Some(surface) = lock(&self.surface).as_mut() {
            surface.width = width;
            surface.height = height;
        }
    }

    /// Drop the surface and tear the session down. Always reports the
    /// teardown as handled.
    pub fn on_surface_destroyed(&self) -> bool {
        debug!("Surface destroyed");
        *lock(&self.surface) = None;
        self.stop();
        true
    }

    /// Acquire, configure and start previewing on the selected camera
    pub fn start(&self) -> StartOutcome {
        {
            let mut lifecycle = lock(&self.lifecycle);
            match lifecycle.state {
                SessionState::Idle => {}
                SessionState::Stopping => {
                    debug!("Start deferred until stop completes");
                    lifecycle.start_requested = true;
                    return StartOutcome::Deferred;
                }
                SessionState::Starting | SessionState::Running => {
                    debug!("Start ignored while {:?}", lifecycle.state);
                    return StartOutcome::Ignored;
                }
            }
            lifecycle.state = SessionState::Starting;
            lifecycle.stop_requested = false;
        }

        let Some(surface) = self.surface().filter(|s| s.valid) else {
            debug!("Start skipped: no valid surface");
            self.finish_start(SessionState::Idle);
            return StartOutcome::NoSurface;
        };
        let settings = *lock(&self.settings);

        match self.open_session(settings, &surface) {
            Ok(()) => {
                info!("Camera {:?} preview started", settings.selector);
                self.finish_start(SessionState::Running);
                StartOutcome::Started
            }
            Err(e) if e.is_transient() => {
                warn!("Camera {:?} start incomplete: {}", settings.selector, e);
                self.finish_start(SessionState::Idle);
                StartOutcome::Degraded(e)
            }
            Err(e) => {
                error!("Camera {:?} configuration failed: {}", settings.selector, e);
                {
                    let mut lifecycle = lock(&self.lifecycle);
                    lifecycle.state = SessionState::Stopping;
                    lifecycle.stop_requested = false;
                }
                self.release_session();
                self.finish_stop();
                StartOutcome::Failed(e)
            }
        }
    }

    /// Stop preview and release the device, including one held after a
    /// transient start failure
    pub fn stop(&self) -> StopOutcome {
        {
            let mut lifecycle = lock(&self.lifecycle);
            match lifecycle.state {
                SessionState::Running => lifecycle.state = SessionState::Stopping,
                SessionState::Idle if lock(&self.session).is_some() => {
                    lifecycle.state = SessionState::Stopping;
                }
                SessionState::Starting => {
                    debug!("Stop deferred until start completes");
                    lifecycle.stop_requested = true;
                    return StopOutcome::Deferred;
                }
                SessionState::Stopping => {
                    // A later stop supersedes a start queued behind this one
                    lifecycle.start_requested = false;
                    return StopOutcome::Ignored;
                }
                SessionState::Idle => return StopOutcome::Ignored,
            }
        }

        self.release_session();
        self.finish_stop();
        StopOutcome::Stopped
    }

    /// Block until no start or stop is in flight
    pub fn settle(&self) -> SessionState {
        let mut lifecycle = lock(&self.lifecycle);
        while matches!(lifecycle.state, SessionState::Starting | SessionState::Stopping) {
            lifecycle = self
                .settled
                .wait(lifecycle)
                .unwrap_or_else(PoisonError::into_inner);
        }
        lifecycle.state
    }

    /// Switch cameras off the calling thread.
    ///
    /// The running session is fully stopped before the new camera starts.
    /// Returns `None` when the selector is unchanged.
    pub fn set_camera_type(self: &Arc<Self>, selector: CameraSelector) -> Option<JoinHandle<()>> {
        {
            let mut settings = lock(&self.settings);
            if settings.selector == selector {
                return None;
            }
            settings.selector = selector;
        }
        info!("Switching camera to {:?}", selector);

        let manager = self.clone();
        let spawned = std::thread::Builder::new()
            .name("camera-switch".to_string())
            .spawn(move || manager.restart());
        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Cannot spawn camera switch thread, switching inline: {}", e);
                self.restart();
                None
            }
        }
    }

    pub fn set_capture_mode(&self, mode: i32) {
        let mut settings = lock(&self.settings);
        self.pool.set_capture_mode(settings.selector, mode);
        settings.capture_mode = mode;
    }

    pub fn set_capture_quality(&self, quality: CaptureQuality) {
        let mut settings = lock(&self.settings);
        self.pool.set_capture_quality(settings.selector, quality);
        settings.capture_quality = Some(quality);
    }

    pub fn set_torch_mode(&self, mode: TorchMode) {
        let mut settings = lock(&self.settings);
        self.pool.set_torch_mode(settings.selector, mode);
        settings.torch_mode = Some(mode);
    }

    pub fn set_flash_mode(&self, mode: FlashMode) {
        let mut settings = lock(&self.settings);
        self.pool.set_flash_mode(settings.selector, mode);
        settings.flash_mode = Some(mode);
    }

    fn restart(&self) {
        self.stop();
        self.settle();
        if self.surface().is_some() {
            self.start();
        }
    }

    fn open_session(&self, settings: Settings, surface: &SurfaceBinding) -> Result<(), CameraError> {
        let selector = settings.selector;
        let held = lock(&self.session).take();
        let device = match held {
            Some(session) if session.selector == selector => {
                debug!("Reusing held camera {:?}", selector);
                session.device
            }
            held => {
                if let Some(session) = held {
                    self.pool.release(session.selector);
                }
                Arc::new(DeviceHandle::new(selector, self.pool.acquire(selector)?))
            }
        };
        *lock(&self.session) = Some(Session {
            device: device.clone(),
            selector,
            capture_mode: None,
            active: false,
        });

        self.pool.set_capture_mode(selector, settings.capture_mode);
        if let Some(quality) = settings.capture_quality {
            self.pool.set_capture_quality(selector, quality);
        }
        if let Some(mode) = settings.torch_mode {
            self.pool.set_torch_mode(selector, mode);
        }
        if let Some(mode) = settings.flash_mode {
            self.pool.set_flash_mode(selector, mode);
        }

        let mode = CaptureMode::try_from(settings.capture_mode)?;
        device.with_parameters(|camera, params| {
            match params.preferred_focus_mode(mode) {
                Some(focus) => params.focus_mode = Some(focus),
                None => debug!("No preferred focus mode supported, keeping {:?}", params.focus_mode),
            }

            let size = self
                .pool
                .best_size(params.sizes_for(mode))
                .ok_or(CameraError::NoSupportedSize(mode))?;
            params.picture_size = Some(size);
            debug!("Capture size {}x{} for {:?}", size.width, size.height, mode);

            camera.set_parameters(params)
        })?;

        let camera = device.device();
        camera.set_preview_surface(surface)?;
        camera.start_preview()?;

        let weak: Weak<DeviceHandle> = Arc::downgrade(&device);
        let handler = self.frame_handler.clone();
        let callback: FrameCallback = Arc::new(move |data: &[u8]| {
            if let Some(device) = weak.upgrade() {
                handler(data, &device);
            }
        });
        camera.set_frame_callback(Some(callback));

        if let Some(session) = lock(&self.session).as_mut() {
            session.capture_mode = Some(mode);
            session.active = true;
        }
        Ok(())
    }

    /// Tear down whatever the session holds. Errors are logged only.
    fn release_session(&self) {
        let Some(session) = lock(&self.session).take() else {
            return;
        };
        let camera = session.device.device();
        if let Err(e) = camera.stop_preview() {
            warn!("Stopping preview failed: {}", e);
        }
        camera.set_frame_callback(None);
        self.pool.release(session.selector);
        info!("Camera {:?} released", session.selector);
    }

    /// Leave `Stopping` for `Idle`, running any start that arrived meanwhile
    fn finish_stop(&self) {
        let start_requested = {
            let mut lifecycle = lock(&self.lifecycle);
            lifecycle.state = SessionState::Idle;
            std::mem::take(&mut lifecycle.start_requested)
        };
        self.settled.notify_all();

        if start_requested {
            debug!("Running deferred start");
            self.start();
        }
    }

    /// Leave `Starting`, running any stop that arrived meanwhile
    fn finish_start(&self, state: SessionState) {
        let run_stop = {
            let mut lifecycle = lock(&self.lifecycle);
            let requested = std::mem::take(&mut lifecycle.stop_requested);
            let run_stop =
                requested && (state == SessionState::Running || lock(&self.session).is_some());
            lifecycle.state = if run_stop {
                SessionState::Stopping
            } else {
                state
            };
            run_stop
        };

        if run_stop {
            debug!("Running deferred stop");
            self.release_session();
            self.finish_stop();
        } else {
            self.settled.notify_all();
        }
    }
}

impl Drop for CameraSessionManager {
    fn drop(&mut self) {
        self.stop();
    }
}
