//! The camera contract and the configuration backend seam.

use std::os::unix::io::RawFd;
use std::path::Path;
use std::time::Duration;

use crate::controls::{DoubleAttrib, EnumAttrib, IntAttrib};
use crate::error::{BackendResult, Result};
use crate::frame::{FourCC, Frame, FrameSettings};

/// The camera id this adapter manages. Exactly one camera per controller.
pub const CAM_ID: u32 = 0;

/// How a client wants to attach to the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Full control over the device.
    Master,
    /// Read-only attachment.
    Monitor,
    /// Read-only attachment with control queries.
    MonitorAccess,
}

/// Capture modes a grab request can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabMode {
    /// Stop capturing and release buffers.
    Stop,
    /// Capture frame by frame on demand.
    SingleFrame,
    /// Capture a fixed number of frames. Requires the streaming pipeline.
    MultiFrame,
    /// Capture continuously. Requires the streaming pipeline.
    Continuously,
}

/// Which backend currently serves the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraMode {
    /// No backend attached.
    #[default]
    None,
    /// The V4L2 configuration backend is attached.
    V4l2,
    /// The streaming pipeline backend is attached.
    Pipeline,
}

impl std::fmt::Display for CameraMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::V4l2 => "v4l2",
            Self::Pipeline => "pipeline",
        };
        f.write_str(name)
    }
}

/// Physical interface a camera is attached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceType {
    /// USB attached camera. The only kind this adapter serves.
    Usb,
    /// Ethernet attached camera.
    Ethernet,
    /// FireWire attached camera.
    FireWire,
}

/// Identity and reachability of a camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CamInfo {
    /// Identifier of the camera within this adapter.
    pub unique_id: u32,
    /// Device node path.
    pub device: String,
    /// Physical interface type.
    pub interface_type: InterfaceType,
    /// Whether the device could be reached when this info was populated.
    pub reachable: bool,
    /// Human readable device name reported by the driver.
    pub display_name: Option<String>,
}

impl CamInfo {
    /// Describe a camera on a device node that has not been opened yet.
    #[must_use]
    pub fn new(device: &str) -> Self {
        Self {
            unique_id: CAM_ID,
            device: device.to_owned(),
            interface_type: InterfaceType::Usb,
            reachable: false,
            display_name: None,
        }
    }
}

/// The fixed contract camera drivers program against.
///
/// Implementations dispatch each operation to whatever backend currently
/// serves the camera. Calls arriving in the wrong camera mode follow a
/// per-operation policy: setters and availability checks degrade to a
/// logged `false`, getters raise an invalid-state error, and frame
/// retrieval never raises. Unknown attributes raise in every mode.
pub trait CameraInterface {
    /// Append the cameras this adapter can serve to `cameras`.
    ///
    /// A vector that already holds an entry with this adapter's camera
    /// id is left unchanged.
    ///
    /// # Returns
    ///
    /// The number of entries appended.
    fn list_cameras(&self, cameras: &mut Vec<CamInfo>) -> usize;

    /// Attach to the camera and switch to the V4L2 configuration backend.
    ///
    /// Re-opening an already open camera is a no-op. Only
    /// [`AccessMode::Master`] is supported.
    fn open(&mut self, cam: &CamInfo, mode: AccessMode) -> Result<bool>;

    /// Whether a backend is currently attached.
    fn is_open(&self) -> bool;

    /// Info for the open camera, enriched with the driver's display name.
    /// `None` while closed.
    fn camera_info(&self) -> Option<&CamInfo>;

    /// Detach from the camera and drop the backend.
    fn close(&mut self) -> bool;

    /// Change the capture state.
    ///
    /// `buffer_len` is the number of capture buffers allocated when a
    /// grab starts.
    ///
    /// # Errors
    ///
    /// [`crate::CameraError::InvalidState`] when a different grab is
    /// already active, [`crate::CameraError::UnsupportedMode`] for grab
    /// modes needing the streaming pipeline.
    fn grab(&mut self, mode: GrabMode, buffer_len: u32) -> Result<bool>;

    /// Fetch the next captured image into `frame`.
    ///
    /// Never raises: returns `false` when no V4L2 backend is attached or
    /// the capture failed. The frame is untouched unless a buffer was
    /// fetched.
    fn retrieve_frame(&mut self, frame: &mut Frame, timeout: Duration) -> bool;

    /// Whether a frame is ready to be retrieved. This camera cannot tell
    /// and always reports `true`.
    fn is_frame_available(&self) -> bool;

    /// Number of frames a consumer should skip between retrieves.
    fn skip_frames(&self) -> u32;

    /// Request a hardware trigger for the next frame. Triggering is
    /// implicit on this camera, so the request always succeeds.
    fn trigger_frame(&mut self) -> bool;

    /// Write a frame's image bytes to `path`. Logs and returns `false`
    /// on failure.
    fn store_frame(&self, frame: &Frame, path: &Path) -> bool;

    /// Set an integer attribute.
    ///
    /// Returns `Ok(false)` outside the V4L2 mode or when the driver
    /// rejects the write.
    fn set_int_attrib(&mut self, attrib: IntAttrib, value: i32) -> Result<bool>;

    /// Read an integer attribute.
    fn int_attrib(&self, attrib: IntAttrib) -> Result<i32>;

    /// Whether an integer attribute is mapped and writable right now.
    fn is_int_attrib_available(&self, attrib: IntAttrib) -> bool;

    /// Set the capture frame rate.
    ///
    /// The driver may adjust the rate; the applied value is what later
    /// reads return.
    fn set_double_attrib(&mut self, attrib: DoubleAttrib, value: f64) -> Result<bool>;

    /// Read a floating point attribute.
    ///
    /// Outside the V4L2 mode the frame rate is answered from the local
    /// retrieve statistics instead of raising.
    fn double_attrib(&mut self, attrib: DoubleAttrib) -> Result<f64>;

    /// Whether a floating point attribute can be answered right now.
    fn is_double_attrib_available(&self, attrib: DoubleAttrib) -> bool;

    /// Apply a switch-style attribute.
    fn set_enum_attrib(&mut self, attrib: EnumAttrib) -> Result<bool>;

    /// Whether the camera is currently in the state the switch selects.
    fn is_enum_attrib_set(&self, attrib: EnumAttrib) -> Result<bool>;

    /// Whether a switch-style attribute is mapped on this camera.
    fn is_enum_attrib_available(&self, attrib: EnumAttrib) -> bool;

    /// Bounds of an integer attribute, or `None` when the attribute is
    /// not mapped or no backend is attached.
    fn int_attrib_range(&self, attrib: IntAttrib) -> Option<(i32, i32)>;

    /// Write a raw V4L2 control, bypassing the attribute tables.
    fn set_raw_control(&mut self, control_id: u32, value: i32) -> Result<bool>;

    /// Read a raw V4L2 control, bypassing the attribute tables.
    fn raw_control(&self, control_id: u32) -> Result<i32>;

    /// Whether the driver exposes `control_id`. When `expected_name` is
    /// given, the driver's control name must match it exactly.
    fn is_raw_control_available(&self, control_id: u32, expected_name: Option<&str>) -> bool;

    /// Negotiate image size and pixel format with the driver.
    ///
    /// The driver may adjust the size; the applied values are stored and
    /// returned by [`Self::frame_settings`].
    fn set_frame_settings(&mut self, settings: FrameSettings) -> Result<bool>;

    /// The capture settings currently in effect.
    fn frame_settings(&self) -> FrameSettings;

    /// Reset every writable control to its driver default.
    fn set_to_default(&mut self) -> Result<bool>;

    /// Multi-line report of driver, formats and controls. `None` outside
    /// the V4L2 mode.
    fn camera_information(&self) -> Option<String>;

    /// Descriptor a consumer can poll for ready frames. Only the
    /// streaming pipeline exposes one.
    fn file_descriptor(&self) -> Option<RawFd>;
}

/// Operations the controller needs from a configuration backend.
///
/// The production implementation talks V4L2; tests substitute a mock.
pub trait ConfigBackend {
    /// Open the backend on a device node.
    fn open(device: &str) -> BackendResult<Self>
    where
        Self: Sized;

    /// The device name from the driver capability query.
    fn capability_card(&self) -> &str;

    /// Multi-line description of driver, formats and controls.
    fn describe_capabilities(&self) -> String;

    /// Whether the driver exposes a usable control with this id.
    fn is_control_valid(&self, id: u32) -> bool;

    /// Whether the control exists and accepts writes.
    fn is_control_writable(&self, id: u32) -> bool;

    /// Driver name of the control, if it exists.
    fn control_name(&self, id: u32) -> Option<String>;

    /// Lower bound of the control's range, if known.
    fn control_minimum(&self, id: u32) -> Option<i32>;

    /// Upper bound of the control's range, if known.
    fn control_maximum(&self, id: u32) -> Option<i32>;

    /// Read the control's current value.
    fn control_value(&self, id: u32) -> BackendResult<i32>;

    /// Write a control value.
    fn write_control_value(&mut self, id: u32, value: i32) -> BackendResult<()>;

    /// Reset every writable scalar control to its driver default.
    fn reset_controls_to_default(&mut self) -> BackendResult<()>;

    /// Select the capture frame rate.
    fn write_fps(&mut self, fps: u32) -> BackendResult<()>;

    /// The frame rate the driver is actually using.
    fn read_fps(&self) -> BackendResult<f64>;

    /// Whether the driver honours frame period selection.
    fn has_timeperframe(&self) -> bool;

    /// Select image size and pixel format. `None` keeps the current
    /// pixel format. The driver may adjust the size; read it back with
    /// [`Self::image_size`].
    fn write_image_format(
        &mut self,
        width: u32,
        height: u32,
        fourcc: Option<FourCC>,
    ) -> BackendResult<()>;

    /// The image size the driver is actually using.
    fn image_size(&self) -> BackendResult<(u32, u32)>;

    /// Allocate capture buffers and start streaming.
    fn init_requesting(&mut self, buffer_count: u32) -> BackendResult<()>;

    /// Stop streaming and release capture buffers. Safe to call when
    /// requesting never started.
    fn cleanup_requesting(&mut self);

    /// Fetch the next capture into `buffer`, resizing it as needed.
    ///
    /// # Returns
    ///
    /// The number of bytes written.
    fn get_buffer(&mut self, buffer: &mut Vec<u8>, timeout: Duration) -> BackendResult<usize>;
}
