//! Scripted decoder and recording sink for tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use image::GrayImage;
use serde_json::Value;

use crate::decoder::Decoder;
use crate::sink::{EmittedEvent, EventSink};
use crate::symbol::DecodedSymbol;
use crate::ScanError;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Gate {
    entered: mpsc::Sender<()>,
    release: mpsc::Receiver<()>,
}

/// Test-side control of a gated [`ScriptedDecoder`]
pub struct GateControl {
    entered: mpsc::Receiver<()>,
    release: mpsc::Sender<()>,
}

impl GateControl {
    /// Wait until a `detect` call is blocked inside the decoder
    pub fn wait_entered(&self, timeout: Duration) -> bool {
        self.entered.recv_timeout(timeout).is_ok()
    }

    /// Let one blocked `detect` call return
    pub fn release(&self) {
        let _ = self.release.send(());
    }
}

/// Decoder returning a fixed symbol list on every call
#[derive(Default)]
pub struct ScriptedDecoder {
    operational: AtomicBool,
    fail: AtomicBool,
    symbols: Mutex<Vec<DecodedSymbol>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Mutex<Duration>,
    gate: Mutex<Option<Gate>>,
    last_dimensions: Mutex<Option<(u32, u32)>>,
}

impl ScriptedDecoder {
    pub fn new(symbols: Vec<DecodedSymbol>) -> Self {
        Self {
            operational: AtomicBool::new(true),
            symbols: Mutex::new(symbols),
            ..Default::default()
        }
    }

    pub fn set_operational(&self, operational: bool) {
        self.operational.store(operational, Ordering::SeqCst);
    }

    /// Make `detect` return `ScanError::Decoder`
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = delay;
    }

    /// Block every `detect` call until the returned control releases it
    pub fn gate(&self) -> GateControl {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *lock(&self.gate) = Some(Gate {
            entered: entered_tx,
            release: release_rx,
        });
        GateControl {
            entered: entered_rx,
            release: release_tx,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping `detect` calls observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Dimensions of the last image handed to `detect`
    pub fn last_dimensions(&self) -> Option<(u32, u32)> {
        *lock(&self.last_dimensions)
    }
}

impl Decoder for ScriptedDecoder {
    fn is_operational(&self) -> bool {
        self.operational.load(Ordering::SeqCst)
    }

    fn detect(&self, image: &GrayImage) -> Result<Vec<DecodedSymbol>, ScanError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        *lock(&self.last_dimensions) = Some(image.dimensions());

        if let Some(gate) = lock(&self.gate).as_ref() {
            let _ = gate.entered.send(());
            let _ = gate.release.recv();
        }
        let delay = *lock(&self.delay);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ScanError::Decoder("scripted failure".to_string()));
        }
        Ok(lock(&self.symbols).clone())
    }
}

/// Sink keeping every emitted event in memory
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<EmittedEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EmittedEvent> {
        lock(&self.events).clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event_name: &str, payload: Value) {
        lock(&self.events).push(EmittedEvent {
            name: event_name.to_string(),
            payload,
        });
    }
}
