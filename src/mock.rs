//! Mock configuration backend for testing the controller without
//! hardware.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::rc::Rc;
use std::time::Duration;

use crate::controls::{
    CID_AUTOGAIN, CID_AUTO_WHITE_BALANCE, CID_BACKLIGHT_COMPENSATION, CID_BRIGHTNESS,
    CID_CONTRAST, CID_EXPOSURE_ABSOLUTE, CID_EXPOSURE_AUTO, CID_EXPOSURE_AUTO_PRIORITY,
    CID_POWER_LINE_FREQUENCY, CID_SATURATION, CID_SHARPNESS, CID_WHITE_BALANCE_TEMPERATURE,
};
use crate::error::{BackendError, BackendResult};
use crate::frame::FourCC;
use crate::traits::ConfigBackend;

/// Shared handle to the simulated hardware of one device node.
pub type MockHandle = Rc<RefCell<MockHardware>>;

thread_local! {
    static REGISTRY: RefCell<HashMap<String, MockHandle>> = RefCell::new(HashMap::new());
}

/// Install simulated hardware for `device`, replacing any previous one.
///
/// Tests keep the returned handle to adjust the hardware and inspect the
/// recorded events. The registry is thread local, so parallel tests do
/// not interfere.
pub fn install(device: &str, hardware: MockHardware) -> MockHandle {
    let handle = Rc::new(RefCell::new(hardware));
    REGISTRY.with(|registry| {
        registry
            .borrow_mut()
            .insert(device.to_owned(), Rc::clone(&handle));
    });
    handle
}

/// Hardware interactions recorded by the mock, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    /// A backend attached to the device.
    Opened,
    /// A backend released the device.
    Released,
    /// Buffer requesting started with this many buffers.
    RequestingStarted(u32),
    /// Buffer requesting stopped.
    RequestingStopped,
    /// A control value was written.
    ControlWritten {
        /// Control id.
        id: u32,
        /// Stored value after clamping.
        value: i32,
    },
    /// A frame rate was requested.
    FpsWritten(u32),
    /// An image format was requested.
    FormatWritten {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
        /// Requested pixel format, if any.
        fourcc: Option<FourCC>,
    },
    /// All writable controls were reset to their defaults.
    ControlsReset,
}

/// One simulated V4L2 control.
#[derive(Debug, Clone)]
pub struct MockControl {
    /// Control id.
    pub id: u32,
    /// Driver name.
    pub name: String,
    /// Lower bound.
    pub minimum: i32,
    /// Upper bound.
    pub maximum: i32,
    /// Driver default.
    pub default: i32,
    /// Current value.
    pub value: i32,
    /// Whether writes are accepted.
    pub writable: bool,
}

impl MockControl {
    /// Create a writable control starting at its default.
    #[must_use]
    pub fn new(id: u32, name: &str, minimum: i32, maximum: i32, default: i32) -> Self {
        Self {
            id,
            name: name.to_owned(),
            minimum,
            maximum,
            default,
            value: default,
            writable: true,
        }
    }
}

/// Simulated camera hardware behind a device node.
///
/// The default models a typical UVC webcam: the usual picture controls,
/// YUYV and MJPG formats up to 1280x720 and a small set of frame rates.
#[derive(Debug, Clone)]
pub struct MockHardware {
    /// Device name reported by the capability query.
    pub card: String,
    /// Exposed controls.
    pub controls: Vec<MockControl>,
    /// Pixel formats the simulated driver accepts.
    pub supported_fourccs: Vec<FourCC>,
    /// Largest frame size the driver applies.
    pub max_size: (u32, u32),
    /// Currently applied format.
    pub format: (u32, u32, FourCC),
    /// Frame rates the driver can apply; the nearest one wins.
    pub supported_fps: Vec<u32>,
    /// Currently applied frame rate.
    pub fps: u32,
    /// Whether frame period selection is honoured.
    pub timeperframe: bool,
    /// Payload served for every captured buffer.
    pub frame_data: Vec<u8>,
    /// Simulated capture latency.
    pub frame_delay: Duration,
    /// Refuse open calls when set.
    pub fail_open: bool,
    /// Recorded interactions.
    pub events: Vec<MockEvent>,
    /// Number of successful opens.
    pub open_count: usize,
    /// Number of releases.
    pub release_count: usize,
}

impl Default for MockHardware {
    fn default() -> Self {
        Self {
            card: "Mock USB Camera".to_owned(),
            controls: vec![
                MockControl::new(CID_BRIGHTNESS, "Brightness", 0, 255, 128),
                MockControl::new(CID_CONTRAST, "Contrast", 0, 255, 32),
                MockControl::new(CID_SATURATION, "Saturation", 0, 100, 64),
                MockControl::new(CID_AUTO_WHITE_BALANCE, "White Balance, Automatic", 0, 1, 1),
                MockControl::new(
                    CID_WHITE_BALANCE_TEMPERATURE,
                    "White Balance Temperature",
                    2800,
                    6500,
                    4600,
                ),
                MockControl::new(CID_SHARPNESS, "Sharpness", 0, 7, 2),
                MockControl::new(CID_BACKLIGHT_COMPENSATION, "Backlight Compensation", 0, 2, 0),
                MockControl::new(CID_AUTOGAIN, "Gain, Automatic", 0, 1, 1),
                MockControl::new(CID_POWER_LINE_FREQUENCY, "Power Line Frequency", 0, 2, 2),
                MockControl::new(CID_EXPOSURE_AUTO, "Auto Exposure", 0, 3, 0),
                MockControl::new(CID_EXPOSURE_ABSOLUTE, "Exposure Time, Absolute", 3, 2047, 250),
                MockControl::new(
                    CID_EXPOSURE_AUTO_PRIORITY,
                    "Exposure, Dynamic Framerate",
                    0,
                    1,
                    0,
                ),
            ],
            supported_fourccs: vec![FourCC::YUYV, FourCC::MJPG],
            max_size: (1280, 720),
            format: (640, 480, FourCC::YUYV),
            supported_fps: vec![5, 10, 15, 30],
            fps: 30,
            timeperframe: true,
            frame_data: vec![0x80; 64],
            frame_delay: Duration::ZERO,
            fail_open: false,
            events: Vec::new(),
            open_count: 0,
            release_count: 0,
        }
    }
}

impl MockHardware {
    /// Remove a control, simulating hardware without it.
    #[must_use]
    pub fn without_control(mut self, id: u32) -> Self {
        self.controls.retain(|ctrl| ctrl.id != id);
        self
    }

    /// Serve `data` for every captured buffer.
    #[must_use]
    pub fn with_frame_data(mut self, data: Vec<u8>) -> Self {
        self.frame_data = data;
        self
    }

    /// Simulate a capture latency of `delay`.
    #[must_use]
    pub fn with_frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = delay;
        self
    }

    /// Current value of a control, if present.
    #[must_use]
    pub fn control_value(&self, id: u32) -> Option<i32> {
        self.control(id).map(|ctrl| ctrl.value)
    }

    fn control(&self, id: u32) -> Option<&MockControl> {
        self.controls.iter().find(|ctrl| ctrl.id == id)
    }
}

/// Configuration backend driving [`MockHardware`].
pub struct MockConfig {
    hw: MockHandle,
    card: String,
    requesting: bool,
}

impl Drop for MockConfig {
    fn drop(&mut self) {
        let mut hw = self.hw.borrow_mut();
        hw.release_count += 1;
        hw.events.push(MockEvent::Released);
    }
}

impl ConfigBackend for MockConfig {
    fn open(device: &str) -> BackendResult<Self> {
        let handle = REGISTRY.with(|registry| registry.borrow().get(device).map(Rc::clone));
        let Some(hw) = handle else {
            return Err(BackendError::Open {
                device: device.to_owned(),
                source: io::Error::new(io::ErrorKind::NotFound, "no mock hardware installed"),
            });
        };
        let card = {
            let mut state = hw.borrow_mut();
            if state.fail_open {
                return Err(BackendError::Open {
                    device: device.to_owned(),
                    source: io::Error::new(io::ErrorKind::PermissionDenied, "open refused"),
                });
            }
            state.open_count += 1;
            state.events.push(MockEvent::Opened);
            state.card.clone()
        };
        Ok(Self {
            hw,
            card,
            requesting: false,
        })
    }

    fn capability_card(&self) -> &str {
        &self.card
    }

    fn describe_capabilities(&self) -> String {
        use std::fmt::Write as _;

        let hw = self.hw.borrow();
        let mut out = format!("card: {}\n", hw.card);
        for ctrl in &hw.controls {
            let _ = writeln!(
                out,
                "control {}: id 0x{:08x} range [{}, {}] default {}",
                ctrl.name, ctrl.id, ctrl.minimum, ctrl.maximum, ctrl.default
            );
        }
        out
    }

    fn is_control_valid(&self, id: u32) -> bool {
        self.hw.borrow().control(id).is_some()
    }

    fn is_control_writable(&self, id: u32) -> bool {
        self.hw
            .borrow()
            .control(id)
            .is_some_and(|ctrl| ctrl.writable)
    }

    fn control_name(&self, id: u32) -> Option<String> {
        self.hw.borrow().control(id).map(|ctrl| ctrl.name.clone())
    }

    fn control_minimum(&self, id: u32) -> Option<i32> {
        self.hw.borrow().control(id).map(|ctrl| ctrl.minimum)
    }

    fn control_maximum(&self, id: u32) -> Option<i32> {
        self.hw.borrow().control(id).map(|ctrl| ctrl.maximum)
    }

    fn control_value(&self, id: u32) -> BackendResult<i32> {
        self.hw
            .borrow()
            .control_value(id)
            .ok_or(BackendError::UnknownControl { id })
    }

    fn write_control_value(&mut self, id: u32, value: i32) -> BackendResult<()> {
        let mut hw = self.hw.borrow_mut();
        let Some(index) = hw.controls.iter().position(|ctrl| ctrl.id == id) else {
            return Err(BackendError::UnknownControl { id });
        };
        let Some(ctrl) = hw.controls.get_mut(index) else {
            return Err(BackendError::UnknownControl { id });
        };
        if !ctrl.writable {
            return Err(BackendError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "read-only control",
            )));
        }
        let clamped = value.clamp(ctrl.minimum, ctrl.maximum);
        ctrl.value = clamped;
        hw.events.push(MockEvent::ControlWritten { id, value: clamped });
        Ok(())
    }

    fn reset_controls_to_default(&mut self) -> BackendResult<()> {
        let mut hw = self.hw.borrow_mut();
        for ctrl in &mut hw.controls {
            if ctrl.writable {
                ctrl.value = ctrl.default;
            }
        }
        hw.events.push(MockEvent::ControlsReset);
        Ok(())
    }

    fn write_fps(&mut self, fps: u32) -> BackendResult<()> {
        let mut hw = self.hw.borrow_mut();
        let applied = hw
            .supported_fps
            .iter()
            .copied()
            .min_by_key(|&candidate| candidate.abs_diff(fps))
            .unwrap_or(fps);
        hw.fps = applied;
        hw.events.push(MockEvent::FpsWritten(fps));
        Ok(())
    }

    fn read_fps(&self) -> BackendResult<f64> {
        Ok(f64::from(self.hw.borrow().fps))
    }

    fn has_timeperframe(&self) -> bool {
        self.hw.borrow().timeperframe
    }

    fn write_image_format(
        &mut self,
        width: u32,
        height: u32,
        fourcc: Option<FourCC>,
    ) -> BackendResult<()> {
        let mut hw = self.hw.borrow_mut();
        let applied_width = width.min(hw.max_size.0);
        let applied_height = height.min(hw.max_size.1);
        let current = hw.format.2;
        let applied_fourcc = match fourcc {
            Some(requested) if hw.supported_fourccs.contains(&requested) => requested,
            _ => current,
        };
        hw.format = (applied_width, applied_height, applied_fourcc);
        hw.events.push(MockEvent::FormatWritten {
            width,
            height,
            fourcc,
        });
        Ok(())
    }

    fn image_size(&self) -> BackendResult<(u32, u32)> {
        let hw = self.hw.borrow();
        Ok((hw.format.0, hw.format.1))
    }

    fn init_requesting(&mut self, buffer_count: u32) -> BackendResult<()> {
        if self.requesting {
            return Ok(());
        }
        self.requesting = true;
        self.hw
            .borrow_mut()
            .events
            .push(MockEvent::RequestingStarted(buffer_count));
        Ok(())
    }

    fn cleanup_requesting(&mut self) {
        if self.requesting {
            self.requesting = false;
            self.hw
                .borrow_mut()
                .events
                .push(MockEvent::RequestingStopped);
        }
    }

    fn get_buffer(&mut self, buffer: &mut Vec<u8>, timeout: Duration) -> BackendResult<usize> {
        if !self.requesting {
            return Err(BackendError::NotRequesting);
        }
        let hw = self.hw.borrow();
        if hw.frame_delay > timeout {
            return Err(BackendError::Timeout { timeout });
        }
        buffer.clear();
        buffer.extend_from_slice(&hw.frame_data);
        Ok(buffer.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_requires_installed_hardware() {
        let result = MockConfig::open("mock:not-installed");
        assert!(matches!(result, Err(BackendError::Open { .. })));
    }

    #[test]
    fn test_open_and_drop_are_recorded() {
        let handle = install("mock:lifecycle", MockHardware::default());
        {
            let config = MockConfig::open("mock:lifecycle").expect("open should succeed");
            assert_eq!(config.capability_card(), "Mock USB Camera");
        }
        let hw = handle.borrow();
        assert_eq!(hw.open_count, 1);
        assert_eq!(hw.release_count, 1);
        assert_eq!(hw.events, [MockEvent::Opened, MockEvent::Released]);
    }

    #[test]
    fn test_control_writes_clamp_to_the_declared_range() {
        let handle = install("mock:clamp", MockHardware::default());
        let mut config = MockConfig::open("mock:clamp").expect("open should succeed");

        config
            .write_control_value(CID_BRIGHTNESS, 9000)
            .expect("write should succeed");
        assert_eq!(handle.borrow().control_value(CID_BRIGHTNESS), Some(255));
    }

    #[test]
    fn test_fps_requests_pick_the_nearest_supported_rate() {
        let _handle = install("mock:fps", MockHardware::default());
        let mut config = MockConfig::open("mock:fps").expect("open should succeed");

        config.write_fps(28).expect("write should succeed");
        let applied = config.read_fps().expect("read should succeed");
        assert!((applied - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_format_requests_clamp_size_and_reject_unknown_formats() {
        let handle = install("mock:format", MockHardware::default());
        let mut config = MockConfig::open("mock:format").expect("open should succeed");

        config
            .write_image_format(1920, 1080, Some(FourCC::new(b"H264")))
            .expect("write should succeed");
        assert_eq!(config.image_size().expect("size should succeed"), (1280, 720));
        assert_eq!(handle.borrow().format.2, FourCC::YUYV);
    }

    #[test]
    fn test_buffers_need_an_active_requesting_phase() {
        let _handle = install("mock:requesting", MockHardware::default());
        let mut config = MockConfig::open("mock:requesting").expect("open should succeed");
        let mut buffer = Vec::new();

        let result = config.get_buffer(&mut buffer, Duration::from_millis(10));
        assert!(matches!(result, Err(BackendError::NotRequesting)));

        config.init_requesting(4).expect("init should succeed");
        let len = config
            .get_buffer(&mut buffer, Duration::from_millis(10))
            .expect("buffer should arrive");
        assert_eq!(len, 64);
    }
}
