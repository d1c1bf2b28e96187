//! HID back-end error types

use thiserror::Error;

/// Errors from HID sinks
#[derive(Error, Debug)]
pub enum HidError {
    /// Gadget endpoint could not be opened
    #[error("Failed to open HID endpoint {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing a report failed (host disconnected, endpoint gone)
    #[error("Failed to write HID report: {0}")]
    Write(#[source] std::io::Error),

    #[error("Failed to create virtual device: {0}")]
    CreateDevice(#[source] std::io::Error),

    #[error("Failed to emit event: {0}")]
    EmitEvent(#[source] std::io::Error),
}
