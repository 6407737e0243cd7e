//! Viewfinder configuration
//!
//! Loaded from an optional file plus `VIEWFINDER__*` environment overrides,
//! e.g. `VIEWFINDER__CAMERA=front` or `VIEWFINDER__SCANNER__START_PAUSED=true`.

use std::path::Path;

use barcode_scanner::ScannerConfig;
use camera_capture::{CameraSelector, CaptureMode, CaptureQuality, FlashMode, TorchMode};
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ViewFinderError;

/// Viewfinder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewFinderConfig {
    /// Camera opened on the first surface
    pub camera: CameraSelector,

    /// Raw host capture-mode code (0 = still, 1 = video)
    pub capture_mode: i32,

    /// Settings forwarded to the pool at every start when present
    pub capture_quality: Option<CaptureQuality>,
    pub torch_mode: Option<TorchMode>,
    pub flash_mode: Option<FlashMode>,

    pub scanner: ScannerConfig,

    /// Max tracing level
    pub log_level: String,
}

impl Default for ViewFinderConfig {
    fn default() -> Self {
        Self {
            camera: CameraSelector::Back,
            capture_mode: CaptureMode::Still.code(),
            capture_quality: None,
            torch_mode: None,
            flash_mode: None,
            scanner: ScannerConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl ViewFinderConfig {
    /// Front camera in video mode
    pub fn selfie_video() -> Self {
        Self {
            camera: CameraSelector::Front,
            capture_mode: CaptureMode::Video.code(),
            capture_quality: Some(CaptureQuality::P720),
            ..Default::default()
        }
    }

    /// Back camera tuned for scanning codes in poor light
    pub fn scanner() -> Self {
        Self {
            torch_mode: Some(TorchMode::Auto),
            flash_mode: Some(FlashMode::Off),
            capture_quality: Some(CaptureQuality::Preview),
            ..Default::default()
        }
    }

    /// Install the global tracing subscriber at `log_level`
    pub fn init_logging(&self) -> Result<(), ViewFinderError> {
        crate::init_logging(&self.log_level)
    }

    /// Load from `path` (if given and present) with environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ViewFinderError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        let settings = builder
            .add_source(Environment::with_prefix("VIEWFINDER").separator("__"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}
