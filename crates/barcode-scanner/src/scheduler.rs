//! Single-flight decode scheduler
//!
//! Preview frames arrive far faster than a decode completes, so the
//! scheduler keeps exactly one slot: a frame arriving while a decode runs is
//! dropped, and a frame arriving while another is still waiting replaces it.
//! One dedicated worker thread drains the slot.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use camera_capture::{CameraPool, DeviceHandle, PreviewFrame};
use tracing::{debug, info, trace, warn};

use crate::config::ScannerConfig;
use crate::decoder::Decoder;
use crate::sink::EventSink;
use crate::symbol::{BarCodeRead, BAR_CODE_READ_EVENT};
use crate::ScanError;

/// Lifecycle of a decode task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Cancelled,
}

impl TaskStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TaskStatus::Pending,
            1 => TaskStatus::Running,
            2 => TaskStatus::Completed,
            _ => TaskStatus::Cancelled,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Running => 1,
            TaskStatus::Completed => 2,
            TaskStatus::Cancelled => 3,
        }
    }
}

#[derive(Debug)]
struct TaskState {
    id: u64,
    status: AtomicU8,
    cancelled: AtomicBool,
}

impl TaskState {
    fn set_status(&self, status: TaskStatus) {
        self.status.store(status.as_u8(), Ordering::SeqCst);
    }
}

/// Observer handle for a decode task
#[derive(Debug, Clone)]
pub struct TaskHandle(Arc<TaskState>);

impl TaskHandle {
    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn status(&self) -> TaskStatus {
        TaskStatus::from_u8(self.0.status.load(Ordering::SeqCst))
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    /// Cooperative cancel; only honoured before the task starts
    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        if self.status() == TaskStatus::Pending {
            self.0.set_status(TaskStatus::Cancelled);
        }
    }
}

/// A queued decode attempt owning its frame snapshot
struct DecodeTask {
    state: Arc<TaskState>,
    data: Vec<u8>,
    orientation: i32,
    device: Arc<DeviceHandle>,
}

impl DecodeTask {
    fn handle(&self) -> TaskHandle {
        TaskHandle(self.state.clone())
    }
}

/// What happened to a delivered frame
#[derive(Debug, Clone)]
pub enum FrameDisposition {
    /// Scanning is disabled by the host
    ScannerDisabled,
    /// A decode is running; the frame is dropped
    DroppedBusy,
    /// Queued into the empty slot
    Queued(TaskHandle),
    /// Queued after cancelling the task that was still waiting
    Replaced(TaskHandle),
    /// The scheduler was shut down
    ShutDown,
}

impl FrameDisposition {
    pub fn is_accepted(&self) -> bool {
        matches!(self, FrameDisposition::Queued(_) | FrameDisposition::Replaced(_))
    }
}

/// Result of running one task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeOutcome {
    Cancelled,
    DecoderNotOperational,
    FrameSizeUnavailable,
    NoSymbols,
    Published,
    Failed,
}

/// Counter snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub frames_received: u64,
    pub frames_disabled: u64,
    pub frames_dropped_busy: u64,
    pub frames_replaced: u64,
    pub decode_invocations: u64,
    pub symbols_published: u64,
    pub tasks_completed: u64,
}

#[derive(Default)]
struct Counters {
    frames_received: AtomicU64,
    frames_disabled: AtomicU64,
    frames_dropped_busy: AtomicU64,
    frames_replaced: AtomicU64,
    decode_invocations: AtomicU64,
    symbols_published: AtomicU64,
    tasks_completed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> ScanStats {
        ScanStats {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_disabled: self.frames_disabled.load(Ordering::Relaxed),
            frames_dropped_busy: self.frames_dropped_busy.load(Ordering::Relaxed),
            frames_replaced: self.frames_replaced.load(Ordering::Relaxed),
            decode_invocations: self.decode_invocations.load(Ordering::Relaxed),
            symbols_published: self.symbols_published.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Default)]
struct Slot {
    pending: Option<DecodeTask>,
    running: Option<TaskHandle>,
    paused: bool,
    shutdown: bool,
}

struct Inner {
    slot: Mutex<Slot>,
    /// Signalled when a task is queued, on resume and on shutdown
    wake: Condvar,
    /// Signalled whenever the worker finishes a task
    idle: Condvar,
    pool: Arc<dyn CameraPool>,
    decoder: Arc<dyn Decoder>,
    sink: Arc<dyn EventSink>,
    counters: Counters,
    next_id: AtomicU64,
}

impl Inner {
    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Frame decode scheduler with a one-slot cancel-and-replace queue
pub struct FrameDecodeScheduler {
    inner: Arc<Inner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl FrameDecodeScheduler {
    /// Create the scheduler and spawn its worker thread
    pub fn new(
        config: &ScannerConfig,
        pool: Arc<dyn CameraPool>,
        decoder: Arc<dyn Decoder>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, ScanError> {
        let inner = Arc::new(Inner {
            slot: Mutex::new(Slot {
                paused: config.start_paused,
                ..Default::default()
            }),
            wake: Condvar::new(),
            idle: Condvar::new(),
            pool,
            decoder,
            sink,
            counters: Counters::default(),
            next_id: AtomicU64::new(1),
        });

        let worker_inner = inner.clone();
        let worker = std::thread::Builder::new()
            .name(config.worker_name.clone())
            .spawn(move || worker_loop(worker_inner))?;

        info!(
            "Barcode decode worker '{}' started, formats {:#x}",
            config.worker_name,
            inner.decoder.formats()
        );

        Ok(Self {
            inner,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Offer one preview buffer captured by `device`
    pub fn on_frame(&self, data: &[u8], device: &Arc<DeviceHandle>) -> FrameDisposition {
        let counters = &self.inner.counters;
        counters.frames_received.fetch_add(1, Ordering::Relaxed);

        if !self.inner.pool.is_barcode_scanner_enabled() {
            counters.frames_disabled.fetch_add(1, Ordering::Relaxed);
            return FrameDisposition::ScannerDisabled;
        }
        let orientation = self.inner.pool.device_orientation();

        let mut slot = self.inner.lock_slot();
        if slot.shutdown {
            return FrameDisposition::ShutDown;
        }
        if slot.running.is_some() {
            counters.frames_dropped_busy.fetch_add(1, Ordering::Relaxed);
            trace!("Decode in flight, dropping frame");
            return FrameDisposition::DroppedBusy;
        }

        let replaced = match slot.pending.take() {
            Some(stale) => {
                stale.handle().cancel();
                counters.frames_replaced.fetch_add(1, Ordering::Relaxed);
                trace!("Cancelled pending decode task {}", stale.state.id);
                true
            }
            None => false,
        };

        let task = DecodeTask {
            state: Arc::new(TaskState {
                id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
                status: AtomicU8::new(TaskStatus::Pending.as_u8()),
                cancelled: AtomicBool::new(false),
            }),
            data: data.to_vec(),
            orientation,
            device: device.clone(),
        };
        let handle = task.handle();
        slot.pending = Some(task);
        drop(slot);
        self.inner.wake.notify_one();

        if replaced {
            FrameDisposition::Replaced(handle)
        } else {
            FrameDisposition::Queued(handle)
        }
    }

    /// Task currently running, or else the one waiting in the slot
    pub fn current_task(&self) -> Option<TaskHandle> {
        let slot = self.inner.lock_slot();
        slot.running
            .clone()
            .or_else(|| slot.pending.as_ref().map(DecodeTask::handle))
    }

    /// Stop the worker from picking up new tasks. The slot keeps the latest frame.
    pub fn pause(&self) {
        self.inner.lock_slot().paused = true;
        debug!("Barcode decoding paused");
    }

    pub fn resume(&self) {
        self.inner.lock_slot().paused = false;
        self.inner.wake.notify_one();
        debug!("Barcode decoding resumed");
    }

    /// Cancel the waiting task, if any
    pub fn cancel_pending(&self) {
        let mut slot = self.inner.lock_slot();
        if let Some(task) = slot.pending.take() {
            task.handle().cancel();
        }
        drop(slot);
        self.inner.idle.notify_all();
    }

    /// Block until the slot is empty and nothing runs. Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut slot = self.inner.lock_slot();
        loop {
            let busy = slot.running.is_some() || (slot.pending.is_some() && !slot.paused);
            if !busy {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            slot = self
                .inner
                .idle
                .wait_timeout(slot, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    pub fn stats(&self) -> ScanStats {
        self.inner.counters.snapshot()
    }

    /// Cancel the waiting task and join the worker. A running decode finishes first.
    pub fn shutdown(&self) {
        {
            let mut slot = self.inner.lock_slot();
            if slot.shutdown {
                return;
            }
            slot.shutdown = true;
            if let Some(task) = slot.pending.take() {
                task.handle().cancel();
            }
        }
        self.inner.wake.notify_all();

        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                warn!("Barcode decode worker panicked");
            }
        }
        info!("Barcode decode worker stopped");
    }
}

impl Drop for FrameDecodeScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(inner: Arc<Inner>) {
    loop {
        let task = {
            let mut slot = inner.lock_slot();
            loop {
                if slot.shutdown {
                    return;
                }
                if !slot.paused {
                    if let Some(task) = slot.pending.take() {
                        task.state.set_status(TaskStatus::Running);
                        slot.running = Some(task.handle());
                        break task;
                    }
                }
                slot = inner.wake.wait(slot).unwrap_or_else(PoisonError::into_inner);
            }
        };

        let state = task.state.clone();
        let outcome = run_task(&inner, task);
        trace!("Decode task {} finished: {:?}", state.id, outcome);

        let mut slot = inner.lock_slot();
        state.set_status(if outcome == DecodeOutcome::Cancelled {
            TaskStatus::Cancelled
        } else {
            TaskStatus::Completed
        });
        slot.running = None;
        inner.counters.tasks_completed.fetch_add(1, Ordering::Relaxed);
        drop(slot);
        inner.idle.notify_all();
    }
}

fn run_task(inner: &Inner, task: DecodeTask) -> DecodeOutcome {
    if task.state.cancelled.load(Ordering::SeqCst) {
        return DecodeOutcome::Cancelled;
    }
    if !inner.decoder.is_operational() {
        debug!("Decoder not operational, skipping frame");
        return DecodeOutcome::DecoderNotOperational;
    }

    let size = match task.device.read_parameters() {
        Ok(params) => params.preview_size,
        Err(e) => {
            warn!("Cannot read preview size: {}", e);
            None
        }
    };
    let Some(size) = size else {
        return DecodeOutcome::FrameSizeUnavailable;
    };

    let frame = PreviewFrame::new(task.data, size.width, size.height, task.orientation);
    match decode_and_publish(inner, frame) {
        Ok(true) => DecodeOutcome::Published,
        Ok(false) => DecodeOutcome::NoSymbols,
        Err(e) => {
            warn!("Barcode decode failed: {}", e);
            DecodeOutcome::Failed
        }
    }
}

/// Decode a frame and publish the first symbol. Returns whether one was published.
fn decode_and_publish(inner: &Inner, frame: PreviewFrame) -> Result<bool, ScanError> {
    let frame = frame.upright()?;
    let image = frame.luma_image()?;
    drop(frame);

    inner.counters.decode_invocations.fetch_add(1, Ordering::Relaxed);
    let symbols = catch_unwind(AssertUnwindSafe(|| inner.decoder.detect(&image)))
        .map_err(|_| ScanError::Decoder("decoder panicked".to_string()))??;

    // Decoder order decides; the first symbol wins
    let Some(symbol) = symbols.first() else {
        return Ok(false);
    };
    let payload = serde_json::to_value(BarCodeRead::from(symbol))?;
    inner.sink.emit(BAR_CODE_READ_EVENT, payload);
    inner.counters.symbols_published.fetch_add(1, Ordering::Relaxed);
    debug!("Published barcode (format {})", symbol.format);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{RecordingSink, ScriptedDecoder};
    use crate::format;
    use crate::symbol::{DecodedSymbol, Point};
    use camera_capture::fake::FakePool;
    use camera_capture::{CameraSelector, Size};

    const WAIT: Duration = Duration::from_secs(5);

    struct Harness {
        pool: Arc<FakePool>,
        decoder: Arc<ScriptedDecoder>,
        sink: Arc<RecordingSink>,
        device: Arc<DeviceHandle>,
        scheduler: FrameDecodeScheduler,
    }

    fn symbol(text: &str) -> DecodedSymbol {
        DecodedSymbol {
            raw_value: text.to_string(),
            format: format::QR_CODE,
            corner_points: vec![Point { x: 10, y: 20 }, Point { x: 30, y: 40 }],
        }
    }

    fn harness(symbols: Vec<DecodedSymbol>, config: ScannerConfig) -> Harness {
        let pool = Arc::new(FakePool::new());
        let decoder = Arc::new(ScriptedDecoder::new(symbols));
        let sink = Arc::new(RecordingSink::new());
        let device = Arc::new(DeviceHandle::new(
            CameraSelector::Back,
            pool.acquire(CameraSelector::Back).unwrap(),
        ));
        let scheduler =
            FrameDecodeScheduler::new(&config, pool.clone(), decoder.clone(), sink.clone()).unwrap();
        Harness {
            pool,
            decoder,
            sink,
            device,
            scheduler,
        }
    }

    fn vga_frame() -> Vec<u8> {
        vec![128u8; 640 * 480 * 3 / 2]
    }

    #[test]
    fn test_first_symbol_wins() {
        let h = harness(vec![symbol("first"), symbol("second")], ScannerConfig::default());

        assert!(h.scheduler.on_frame(&vga_frame(), &h.device).is_accepted());
        assert!(h.scheduler.wait_idle(WAIT));

        let events = h.sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, BAR_CODE_READ_EVENT);
        assert_eq!(events[0].payload["data"], "first");
        assert_eq!(events[0].payload["type"], 256);
        assert_eq!(events[0].payload["bounds"][1]["x"], "30");
    }

    #[test]
    fn test_disabled_scanner_drops_frame() {
        let h = harness(vec![symbol("x")], ScannerConfig::default());
        h.pool.set_scanner_enabled(false);

        let disposition = h.scheduler.on_frame(&vga_frame(), &h.device);
        assert!(matches!(disposition, FrameDisposition::ScannerDisabled));
        assert!(h.scheduler.wait_idle(WAIT));
        assert_eq!(h.decoder.calls(), 0);
        assert_eq!(h.scheduler.stats().frames_disabled, 1);
    }

    #[test]
    fn test_frame_dropped_while_running() {
        let h = harness(vec![symbol("x")], ScannerConfig::default());
        let gate = h.decoder.gate();

        let first = h.scheduler.on_frame(&vga_frame(), &h.device);
        assert!(first.is_accepted());
        assert!(gate.wait_entered(WAIT));

        let second = h.scheduler.on_frame(&vga_frame(), &h.device);
        assert!(matches!(second, FrameDisposition::DroppedBusy));

        gate.release();
        assert!(h.scheduler.wait_idle(WAIT));

        let stats = h.scheduler.stats();
        assert_eq!(stats.frames_received, 2);
        assert_eq!(stats.decode_invocations, 1);
        assert_eq!(h.decoder.calls(), 1);
        assert_eq!(h.sink.events().len(), 1);
    }

    #[test]
    fn test_pending_task_is_replaced() {
        let config = ScannerConfig {
            start_paused: true,
            ..Default::default()
        };
        let h = harness(vec![symbol("x")], config);

        let FrameDisposition::Queued(stale) = h.scheduler.on_frame(&vga_frame(), &h.device) else {
            panic!("first frame should be queued");
        };
        let FrameDisposition::Replaced(fresh) = h.scheduler.on_frame(&vga_frame(), &h.device)
        else {
            panic!("second frame should replace the pending task");
        };

        assert_eq!(stale.status(), TaskStatus::Cancelled);
        assert_eq!(fresh.status(), TaskStatus::Pending);
        assert_eq!(h.scheduler.current_task().unwrap().id(), fresh.id());

        h.scheduler.resume();
        assert!(h.scheduler.wait_idle(WAIT));
        assert_eq!(fresh.status(), TaskStatus::Completed);
        assert_eq!(h.decoder.calls(), 1);
        assert_eq!(h.scheduler.stats().frames_replaced, 1);
    }

    #[test]
    fn test_natural_orientation_rotates_before_decoding() {
        let h = harness(vec![], ScannerConfig::default());
        h.pool.set_orientation(0);

        h.scheduler.on_frame(&vga_frame(), &h.device);
        assert!(h.scheduler.wait_idle(WAIT));
        assert_eq!(h.decoder.last_dimensions(), Some((480, 640)));

        h.pool.set_orientation(90);
        h.scheduler.on_frame(&vga_frame(), &h.device);
        assert!(h.scheduler.wait_idle(WAIT));
        assert_eq!(h.decoder.last_dimensions(), Some((640, 480)));
        assert!(h.sink.events().is_empty());
    }

    #[test]
    fn test_non_operational_decoder_is_skipped() {
        let h = harness(vec![symbol("x")], ScannerConfig::default());
        h.decoder.set_operational(false);

        h.scheduler.on_frame(&vga_frame(), &h.device);
        assert!(h.scheduler.wait_idle(WAIT));
        assert_eq!(h.decoder.calls(), 0);
        assert_eq!(h.scheduler.stats().tasks_completed, 1);
    }

    #[test]
    fn test_missing_preview_size_is_not_fatal() {
        let h = harness(vec![symbol("x")], ScannerConfig::default());
        let camera = h.pool.camera(CameraSelector::Back);
        let mut params = camera.params();
        params.preview_size = None;
        camera.replace_params(params);

        h.scheduler.on_frame(&vga_frame(), &h.device);
        assert!(h.scheduler.wait_idle(WAIT));
        assert_eq!(h.decoder.calls(), 0);

        // Next frame proceeds normally once the size is known again
        let mut params = camera.params();
        params.preview_size = Some(Size::new(640, 480));
        camera.replace_params(params);
        h.scheduler.on_frame(&vga_frame(), &h.device);
        assert!(h.scheduler.wait_idle(WAIT));
        assert_eq!(h.sink.events().len(), 1);
    }

    #[test]
    fn test_decoder_failure_and_short_frames_are_swallowed() {
        let h = harness(vec![symbol("x")], ScannerConfig::default());
        h.decoder.set_failing(true);
        h.scheduler.on_frame(&vga_frame(), &h.device);
        assert!(h.scheduler.wait_idle(WAIT));

        h.decoder.set_failing(false);
        h.scheduler.on_frame(&[0u8; 16], &h.device);
        assert!(h.scheduler.wait_idle(WAIT));

        assert!(h.sink.events().is_empty());
        assert_eq!(h.decoder.calls(), 1);

        h.scheduler.on_frame(&vga_frame(), &h.device);
        assert!(h.scheduler.wait_idle(WAIT));
        assert_eq!(h.sink.events().len(), 1);
    }

    #[test]
    fn test_never_two_decodes_at_once() {
        let h = Arc::new(harness(vec![symbol("x")], ScannerConfig::default()));
        h.decoder.set_delay(Duration::from_millis(2));

        let producers: Vec<_> = (0..4)
            .map(|_| {
                let h = h.clone();
                std::thread::spawn(move || {
                    let frame = vga_frame();
                    for _ in 0..50 {
                        h.scheduler.on_frame(&frame, &h.device);
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }
        assert!(h.scheduler.wait_idle(WAIT));

        let stats = h.scheduler.stats();
        assert_eq!(h.decoder.max_in_flight(), 1);
        assert_eq!(stats.frames_received, 200);
        assert!(stats.decode_invocations <= stats.frames_received);
        assert!(stats.decode_invocations >= 1);
    }

    #[test]
    fn test_shutdown_rejects_frames() {
        let h = harness(vec![symbol("x")], ScannerConfig::default());
        h.scheduler.shutdown();
        assert!(matches!(
            h.scheduler.on_frame(&vga_frame(), &h.device),
            FrameDisposition::ShutDown
        ));
    }
}
