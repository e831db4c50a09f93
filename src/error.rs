//! Error types for controller and backend operations.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::traits::GrabMode;

/// Errors raised by a configuration backend while talking to the driver.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Opening the device node failed.
    #[error("failed to open device {device}: {source}")]
    Open {
        /// Path of the device node that could not be opened.
        device: String,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The driver does not expose a usable control with this id.
    #[error("unknown control id 0x{id:08x}")]
    UnknownControl {
        /// The rejected control id.
        id: u32,
    },
    /// No capture buffer arrived within the allowed time.
    #[error("no buffer received within {timeout:?}")]
    Timeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },
    /// Buffer access was attempted without an active requesting phase.
    #[error("buffer requesting has not been initialised")]
    NotRequesting,
    /// Any other driver I/O failure.
    #[error("device I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Errors raised by the camera controller.
#[derive(Debug, Error)]
pub enum CameraError {
    /// The operation is not allowed in the current camera mode or grab state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// The attribute is not part of this camera's control set.
    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),
    /// The requested grab mode is not implemented by this adapter.
    #[error("unsupported grab mode: {0:?}")]
    UnsupportedMode(GrabMode),
    /// A backend operation failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Result type for camera operations.
pub type Result<T> = std::result::Result<T, CameraError>;
