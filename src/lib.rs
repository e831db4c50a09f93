//! USB camera adapter dispatching a fixed camera contract onto a V4L2
//! configuration backend.
//!
//! The controller ([`UsbCamera`]) tracks which camera mode is active,
//! owns at most one backend at a time and routes every
//! [`CameraInterface`] operation to it or rejects the call according to
//! a per-operation failure policy. Production code talks to the driver
//! through [`V4l2Config`]; tests substitute the mock backend.

pub mod camera;
pub mod controls;
pub mod device;
pub mod error;
pub mod frame;
pub mod helpers;
pub mod pipeline;
pub mod traits;

#[cfg(test)]
pub mod mock;

pub use camera::UsbCamera;
pub use device::V4l2Config;
pub use error::{BackendError, CameraError, Result};
pub use frame::{FourCC, Frame, FrameMode, FrameSettings, FrameSize, FrameStatus};
pub use traits::{
    AccessMode, CamInfo, CameraInterface, CameraMode, ConfigBackend, GrabMode, InterfaceType,
};
