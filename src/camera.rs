//! The mode-dispatching camera controller.

use std::collections::HashMap;
use std::os::unix::io::RawFd;
use std::path::Path;
use std::time::{Duration, Instant, SystemTime};

use log::{debug, error, info, warn};

use crate::controls::{DoubleAttrib, EnumAttrib, IntAttrib};
use crate::device::V4l2Config;
use crate::error::{CameraError, Result};
use crate::frame::{Frame, FrameSettings, FrameSize, FrameStatus};
use crate::helpers::{remove_jpeg_comment_block, store_frame_to_file};
use crate::pipeline::PipelineBackend;
use crate::traits::{
    AccessMode, CamInfo, CameraInterface, CameraMode, ConfigBackend, GrabMode, InterfaceType,
    CAM_ID,
};

/// Applied frame rates within this distance of the request do not warn.
const FPS_TOLERANCE: f64 = 0.1;

/// The backend currently serving the contract.
enum Backend<C> {
    /// V4L2 configuration backend.
    V4l2(C),
    /// Streaming pipeline backend. Structurally present, never built in
    /// this revision.
    #[allow(dead_code)]
    Pipeline(PipelineBackend),
}

/// Controller for one USB camera.
///
/// Owns at most one configuration backend at a time and dispatches every
/// [`CameraInterface`] operation to it according to the active camera
/// mode. Mode transitions release the old backend before the new one is
/// constructed, so the device node is never held twice.
///
/// The backend is generic so tests can substitute a mock; production
/// code uses the default [`V4l2Config`].
pub struct UsbCamera<C: ConfigBackend = V4l2Config> {
    device: String,
    backend: Option<Backend<C>>,
    attrib_map: HashMap<IntAttrib, u32>,
    info: Option<CamInfo>,
    settings: FrameSettings,
    fps: f64,
    grab_mode: GrabMode,
    grab_started: Option<Instant>,
    frames_received: u32,
    scratch: Vec<u8>,
}

impl<C: ConfigBackend> UsbCamera<C> {
    /// Create a controller for the camera on `device`. No backend is
    /// attached until the camera is opened or a grab starts.
    #[must_use]
    pub fn new(device: &str) -> Self {
        Self {
            device: device.to_owned(),
            backend: None,
            attrib_map: HashMap::new(),
            info: None,
            settings: FrameSettings::default(),
            fps: 0.0,
            grab_mode: GrabMode::Stop,
            grab_started: None,
            frames_received: 0,
            scratch: Vec::new(),
        }
    }

    /// The camera mode currently in effect.
    #[must_use]
    pub fn mode(&self) -> CameraMode {
        match self.backend {
            None => CameraMode::None,
            Some(Backend::V4l2(_)) => CameraMode::V4l2,
            Some(Backend::Pipeline(_)) => CameraMode::Pipeline,
        }
    }

    fn config(&self) -> Option<&C> {
        match &self.backend {
            Some(Backend::V4l2(config)) => Some(config),
            _ => None,
        }
    }

    fn config_mut(&mut self) -> Option<&mut C> {
        match &mut self.backend {
            Some(Backend::V4l2(config)) => Some(config),
            _ => None,
        }
    }

    /// Drop the backend and clear everything derived from it.
    fn teardown(&mut self) {
        self.backend = None;
        self.attrib_map.clear();
    }

    /// Switch to `target`, releasing the old backend first.
    ///
    /// Transitioning to the current mode is a no-op. When constructing
    /// the new backend fails the controller is left in mode
    /// [`CameraMode::None`].
    fn change_mode(&mut self, target: CameraMode) -> Result<()> {
        if self.mode() == target {
            return Ok(());
        }
        self.teardown();
        match target {
            CameraMode::None => Ok(()),
            CameraMode::V4l2 => {
                let config = C::open(&self.device)?;
                self.backend = Some(Backend::V4l2(config));
                self.rebuild_attrib_map();
                debug!("switched to the v4l2 mode on {}", self.device);
                Ok(())
            }
            CameraMode::Pipeline => Err(CameraError::InvalidState(
                "the streaming pipeline backend is not implemented".to_owned(),
            )),
        }
    }

    /// Probe the backend for each integer attribute's candidate
    /// controls and keep the first valid one.
    fn rebuild_attrib_map(&mut self) {
        let mapped: Vec<(IntAttrib, u32)> = match self.config() {
            Some(config) => IntAttrib::ALL
                .iter()
                .filter_map(|&attrib| {
                    attrib
                        .candidate_controls()
                        .iter()
                        .copied()
                        .find(|&id| config.is_control_valid(id))
                        .map(|id| (attrib, id))
                })
                .collect(),
            None => Vec::new(),
        };
        self.attrib_map = mapped.into_iter().collect();
        debug!("attribute map holds {} controls", self.attrib_map.len());
    }

    /// First candidate control the backend reports valid, if any.
    fn probe_candidate(&self, candidates: &[u32]) -> Option<u32> {
        let config = self.config()?;
        candidates
            .iter()
            .copied()
            .find(|&id| config.is_control_valid(id))
    }

    /// Frame rate derived from the retrieve counter, or the last applied
    /// rate when no grab ran.
    fn statistics_rate(&self) -> f64 {
        match self.grab_started {
            Some(started) => {
                let elapsed = started.elapsed().as_secs_f64();
                if elapsed > 0.0 {
                    f64::from(self.frames_received) / elapsed
                } else {
                    0.0
                }
            }
            None => self.fps,
        }
    }
}

impl<C: ConfigBackend> CameraInterface for UsbCamera<C> {
    fn list_cameras(&self, cameras: &mut Vec<CamInfo>) -> usize {
        if cameras.iter().any(|cam| cam.unique_id == CAM_ID) {
            info!("camera already contained in the passed vector, nothing added");
            return 0;
        }
        let entry = self
            .info
            .clone()
            .unwrap_or_else(|| CamInfo::new(&self.device));
        cameras.push(entry);
        1
    }

    fn open(&mut self, cam: &CamInfo, mode: AccessMode) -> Result<bool> {
        if mode != AccessMode::Master {
            return Err(CameraError::InvalidState(format!(
                "access mode {mode:?} is not supported"
            )));
        }
        if self.info.is_some() {
            debug!("camera on {} is already open", self.device);
            return Ok(true);
        }
        self.device = cam.device.clone();
        self.change_mode(CameraMode::V4l2)?;
        let mut info = cam.clone();
        info.unique_id = CAM_ID;
        info.interface_type = InterfaceType::Usb;
        info.reachable = true;
        if let Some(config) = self.config() {
            info.display_name = Some(config.capability_card().to_owned());
        }
        info!(
            "opened {} ({})",
            self.device,
            info.display_name.as_deref().unwrap_or("unnamed")
        );
        self.info = Some(info);
        Ok(true)
    }

    fn is_open(&self) -> bool {
        self.info.is_some()
    }

    fn camera_info(&self) -> Option<&CamInfo> {
        self.info.as_ref()
    }

    fn close(&mut self) -> bool {
        if self.info.is_none() {
            debug!("camera on {} is already closed", self.device);
            return true;
        }
        self.teardown();
        self.info = None;
        self.grab_mode = GrabMode::Stop;
        info!("closed {}", self.device);
        true
    }

    fn grab(&mut self, mode: GrabMode, buffer_len: u32) -> Result<bool> {
        if self.grab_mode != GrabMode::Stop && mode != GrabMode::Stop {
            if mode == self.grab_mode {
                debug!("grab mode {mode:?} is already active");
                return Ok(true);
            }
            return Err(CameraError::InvalidState(format!(
                "grab mode {:?} is active, stop it before switching to {mode:?}",
                self.grab_mode
            )));
        }
        match mode {
            GrabMode::Stop => {
                if let Some(config) = self.config_mut() {
                    config.cleanup_requesting();
                }
                self.change_mode(CameraMode::V4l2)?;
            }
            GrabMode::SingleFrame => {
                self.change_mode(CameraMode::V4l2)?;
                let Some(config) = self.config_mut() else {
                    return Err(CameraError::InvalidState(
                        "no v4l2 backend after the mode change".to_owned(),
                    ));
                };
                config.init_requesting(buffer_len)?;
                self.grab_started = Some(Instant::now());
                self.frames_received = 0;
            }
            GrabMode::MultiFrame | GrabMode::Continuously => {
                return Err(CameraError::UnsupportedMode(mode));
            }
        }
        self.grab_mode = mode;
        Ok(true)
    }

    fn retrieve_frame(&mut self, frame: &mut Frame, timeout: Duration) -> bool {
        if self.mode() != CameraMode::V4l2 {
            warn!(
                "frame retrieve requires the v4l2 mode (current: {}), frame left untouched",
                self.mode()
            );
            return false;
        }
        let mut scratch = std::mem::take(&mut self.scratch);
        let result = match self.config_mut() {
            Some(config) => config.get_buffer(&mut scratch, timeout),
            None => unreachable_backend(),
        };
        self.scratch = scratch;
        let len = match result {
            Ok(len) => len,
            Err(err) => {
                error!("frame retrieve failed: {err}");
                return false;
            }
        };
        let mode = self.settings.mode;
        frame.init(self.settings.size, mode.data_depth(), mode, len);
        if let Some(bytes) = self.scratch.get(..len) {
            frame.image.extend_from_slice(bytes);
        }
        frame.status = FrameStatus::Valid;
        frame.time = Some(SystemTime::now());
        remove_jpeg_comment_block(frame);
        self.frames_received = self.frames_received.saturating_add(1);
        true
    }

    fn is_frame_available(&self) -> bool {
        true
    }

    fn skip_frames(&self) -> u32 {
        1
    }

    fn trigger_frame(&mut self) -> bool {
        true
    }

    fn store_frame(&self, frame: &Frame, path: &Path) -> bool {
        match store_frame_to_file(frame, path) {
            Ok(()) => true,
            Err(err) => {
                warn!("storing a frame to {} failed: {err}", path.display());
                false
            }
        }
    }

    fn set_int_attrib(&mut self, attrib: IntAttrib, value: i32) -> Result<bool> {
        if attrib.candidate_controls().is_empty() {
            return Err(CameraError::UnknownAttribute(format!("{attrib:?}")));
        }
        if self.mode() != CameraMode::V4l2 {
            warn!("cannot set {attrib:?} without the v4l2 backend");
            return Ok(false);
        }
        let Some(&id) = self.attrib_map.get(&attrib) else {
            return Err(CameraError::UnknownAttribute(format!("{attrib:?}")));
        };
        let Some(config) = self.config_mut() else {
            return Ok(false);
        };
        if let Err(err) = config.write_control_value(id, value) {
            warn!("writing {attrib:?} failed: {err}");
            return Ok(false);
        }
        Ok(true)
    }

    fn int_attrib(&self, attrib: IntAttrib) -> Result<i32> {
        if attrib.candidate_controls().is_empty() {
            return Err(CameraError::UnknownAttribute(format!("{attrib:?}")));
        }
        let Some(config) = self.config() else {
            return Err(CameraError::InvalidState(format!(
                "reading {attrib:?} requires the v4l2 mode (current: {})",
                self.mode()
            )));
        };
        let Some(&id) = self.attrib_map.get(&attrib) else {
            return Err(CameraError::UnknownAttribute(format!("{attrib:?}")));
        };
        Ok(config.control_value(id)?)
    }

    fn is_int_attrib_available(&self, attrib: IntAttrib) -> bool {
        let Some(config) = self.config() else {
            return false;
        };
        self.attrib_map
            .get(&attrib)
            .is_some_and(|&id| config.is_control_writable(id))
    }

    fn set_double_attrib(&mut self, attrib: DoubleAttrib, value: f64) -> Result<bool> {
        // both float attributes select the capture frame rate
        if self.mode() != CameraMode::V4l2 {
            warn!("cannot set {attrib:?} without the v4l2 backend");
            return Ok(false);
        }
        if value <= 0.0 {
            warn!("rejecting the non-positive frame rate {value}");
            return Ok(false);
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let requested = value.round() as u32;
        let applied = {
            let Some(config) = self.config_mut() else {
                return Ok(false);
            };
            if let Err(err) = config.write_fps(requested) {
                warn!("frame rate request failed: {err}");
                return Ok(false);
            }
            config.read_fps()?
        };
        if (applied - value).abs() > FPS_TOLERANCE {
            warn!("driver applied {applied} fps instead of the requested {value}");
        }
        self.fps = applied;
        Ok(true)
    }

    fn double_attrib(&mut self, attrib: DoubleAttrib) -> Result<f64> {
        // both float attributes report the capture frame rate: the
        // driver's applied rate with a backend attached, the rate
        // derived from the retrieve statistics otherwise
        debug!("reading {attrib:?}");
        let applied = match self.config() {
            Some(config) => Some(config.read_fps()?),
            None => None,
        };
        match applied {
            Some(rate) => {
                self.fps = rate;
                Ok(rate)
            }
            None => Ok(self.statistics_rate()),
        }
    }

    fn is_double_attrib_available(&self, attrib: DoubleAttrib) -> bool {
        // the derived rate can always answer either frame rate query
        // without a backend
        debug!("availability check for {attrib:?}");
        match self.config() {
            Some(config) => config.has_timeperframe(),
            None => true,
        }
    }

    fn set_enum_attrib(&mut self, attrib: EnumAttrib) -> Result<bool> {
        let (candidates, value) = attrib.control_mapping();
        if candidates.is_empty() {
            return Err(CameraError::UnknownAttribute(format!("{attrib:?}")));
        }
        if self.mode() != CameraMode::V4l2 {
            warn!("cannot apply {attrib:?} without the v4l2 backend");
            return Ok(false);
        }
        let Some(id) = self.probe_candidate(candidates) else {
            return Err(CameraError::UnknownAttribute(format!("{attrib:?}")));
        };
        let Some(config) = self.config_mut() else {
            return Ok(false);
        };
        if let Err(err) = config.write_control_value(id, value) {
            warn!("applying {attrib:?} failed: {err}");
            return Ok(false);
        }
        Ok(true)
    }

    fn is_enum_attrib_set(&self, attrib: EnumAttrib) -> Result<bool> {
        let (candidates, value) = attrib.control_mapping();
        if candidates.is_empty() {
            return Err(CameraError::UnknownAttribute(format!("{attrib:?}")));
        }
        let Some(config) = self.config() else {
            return Err(CameraError::InvalidState(format!(
                "reading {attrib:?} requires the v4l2 mode (current: {})",
                self.mode()
            )));
        };
        let Some(id) = candidates
            .iter()
            .copied()
            .find(|&id| config.is_control_valid(id))
        else {
            return Err(CameraError::UnknownAttribute(format!("{attrib:?}")));
        };
        Ok(config.control_value(id)? == value)
    }

    fn is_enum_attrib_available(&self, attrib: EnumAttrib) -> bool {
        let (candidates, _) = attrib.control_mapping();
        let Some(config) = self.config() else {
            return false;
        };
        candidates
            .iter()
            .copied()
            .any(|id| config.is_control_valid(id) && config.is_control_writable(id))
    }

    fn int_attrib_range(&self, attrib: IntAttrib) -> Option<(i32, i32)> {
        let config = self.config()?;
        let &id = self.attrib_map.get(&attrib)?;
        Some((config.control_minimum(id)?, config.control_maximum(id)?))
    }

    fn set_raw_control(&mut self, control_id: u32, value: i32) -> Result<bool> {
        let mode = self.mode();
        let Some(config) = self.config_mut() else {
            return Err(CameraError::InvalidState(format!(
                "raw control writes require the v4l2 mode (current: {mode})"
            )));
        };
        config.write_control_value(control_id, value)?;
        Ok(true)
    }

    fn raw_control(&self, control_id: u32) -> Result<i32> {
        let Some(config) = self.config() else {
            return Err(CameraError::InvalidState(format!(
                "raw control reads require the v4l2 mode (current: {})",
                self.mode()
            )));
        };
        Ok(config.control_value(control_id)?)
    }

    fn is_raw_control_available(&self, control_id: u32, expected_name: Option<&str>) -> bool {
        let Some(config) = self.config() else {
            return false;
        };
        if !config.is_control_valid(control_id) {
            return false;
        }
        match expected_name {
            Some(expected) => config.control_name(control_id).as_deref() == Some(expected),
            None => true,
        }
    }

    fn set_frame_settings(&mut self, settings: FrameSettings) -> Result<bool> {
        if self.mode() != CameraMode::V4l2 {
            warn!("cannot negotiate frame settings without the v4l2 backend");
            return Ok(false);
        }
        let fourcc = settings.mode.fourcc();
        if fourcc.is_none() {
            info!("no pixel mode selected, keeping the camera's current format");
        }
        let applied = {
            let Some(config) = self.config_mut() else {
                return Ok(false);
            };
            if let Err(err) =
                config.write_image_format(settings.size.width, settings.size.height, fourcc)
            {
                warn!("format negotiation failed: {err}");
                return Ok(false);
            }
            config.image_size()?
        };
        let applied_size = FrameSize::new(applied.0, applied.1);
        if applied_size != settings.size {
            info!(
                "driver adjusted the frame size to {}x{}",
                applied_size.width, applied_size.height
            );
        }
        self.settings = FrameSettings::new(applied_size, settings.mode, settings.color_depth);
        Ok(true)
    }

    fn frame_settings(&self) -> FrameSettings {
        self.settings
    }

    fn set_to_default(&mut self) -> Result<bool> {
        if self.mode() != CameraMode::V4l2 {
            info!("reset to defaults skipped outside the v4l2 mode");
            return Ok(false);
        }
        let Some(config) = self.config_mut() else {
            return Ok(false);
        };
        if let Err(err) = config.reset_controls_to_default() {
            warn!("resetting controls failed: {err}");
            return Ok(false);
        }
        Ok(true)
    }

    fn camera_information(&self) -> Option<String> {
        match self.config() {
            Some(config) => Some(config.describe_capabilities()),
            None => {
                warn!("no capability report without the v4l2 backend");
                None
            }
        }
    }

    fn file_descriptor(&self) -> Option<RawFd> {
        match &self.backend {
            Some(Backend::Pipeline(pipeline)) => pipeline.file_descriptor(),
            _ => None,
        }
    }
}

/// Only called with a v4l2 backend attached; keeps the retrieve path
/// free of panicking branches.
fn unreachable_backend<T>() -> crate::error::BackendResult<T> {
    Err(crate::error::BackendError::NotRequesting)
}
