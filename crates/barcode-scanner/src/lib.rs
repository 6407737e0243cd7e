//! Barcode Scanner for Camera Preview Frames
//!
//! Decodes 2D barcodes from the continuous preview stream without ever
//! queueing more than one frame:
//! - `FrameDecodeScheduler`: one background worker, one-slot mailbox with
//!   cancel-and-replace for pending frames and drop-while-running backpressure
//! - `Decoder` capability plus a QR implementation on top of `rqrr`
//! - `"BarCodeRead"` event payload and the `EventSink` it is published through

pub mod config;
pub mod decoder;
pub mod scheduler;
pub mod sink;
pub mod symbol;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use config::ScannerConfig;
pub use decoder::{Decoder, QrDecoder};
pub use scheduler::{FrameDecodeScheduler, FrameDisposition, ScanStats, TaskHandle, TaskStatus};
pub use sink::{ChannelSink, EmittedEvent, EventSink};
pub use symbol::{BarCodeRead, BoundsPoint, DecodedSymbol, Point, BAR_CODE_READ_EVENT};

use camera_capture::CameraError;
use thiserror::Error;

/// Barcode scanning error types
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Frame preparation failed: {0}")]
    Frame(#[from] CameraError),

    #[error("Decoder failed: {0}")]
    Decoder(String),

    #[error("Event payload serialization failed: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Failed to spawn decode worker: {0}")]
    Worker(#[from] std::io::Error),
}

/// Symbol format codes reported in the `type` field of `"BarCodeRead"`
pub mod format {
    pub const CODE_128: i32 = 1;
    pub const CODE_39: i32 = 2;
    pub const CODE_93: i32 = 4;
    pub const CODABAR: i32 = 8;
    pub const DATA_MATRIX: i32 = 16;
    pub const EAN_13: i32 = 32;
    pub const EAN_8: i32 = 64;
    pub const ITF: i32 = 128;
    pub const QR_CODE: i32 = 256;
    pub const UPC_A: i32 = 512;
    pub const UPC_E: i32 = 1024;
    pub const PDF417: i32 = 2048;
    pub const AZTEC: i32 = 4096;
}
