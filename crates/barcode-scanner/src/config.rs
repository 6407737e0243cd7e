//! Scanner configuration

use serde::{Deserialize, Serialize};

/// Barcode scanner configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Name of the decode worker thread
    pub worker_name: String,

    /// Start with the worker paused; the latest frame is held until `resume`
    pub start_paused: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            worker_name: "barcode-decode".to_string(),
            start_paused: false,
        }
    }
}
