//! V4L2 configuration backend built on the v4l crate.

use std::io;
use std::time::Duration;

use log::debug;
use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::control::{Control, Description, Type as ControlType, Value};
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream as V4lCaptureStream;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::Device;

use crate::error::{BackendError, BackendResult};
use crate::frame::FourCC;
use crate::traits::ConfigBackend;

/// Streamparm flag the driver sets when frame period selection works.
const CAP_TIMEPERFRAME: u32 = 0x1000;
/// Control flag marking a control as permanently unusable.
const CTRL_FLAG_DISABLED: u32 = 0x0001;
/// Control flag marking a control as read-only.
const CTRL_FLAG_READ_ONLY: u32 = 0x0004;

/// Configuration backend over a V4L2 device node.
///
/// Control descriptions are cached at open time; value reads and writes
/// go to the driver. Capture buffers are mapped while a requesting
/// phase is active and released when it ends or the backend drops.
pub struct V4l2Config {
    // declared first so the stream unmaps before the device closes
    stream: Option<Stream<'static>>,
    device: Device,
    card: String,
    controls: Vec<Description>,
}

impl V4l2Config {
    fn description(&self, id: u32) -> Option<&Description> {
        self.controls.iter().find(|desc| desc.id == id)
    }

    fn writable(desc: &Description) -> bool {
        desc.flags.bits() & (CTRL_FLAG_DISABLED | CTRL_FLAG_READ_ONLY) == 0
    }

    fn scalar(desc: &Description) -> bool {
        matches!(
            desc.typ,
            ControlType::Integer | ControlType::Boolean | ControlType::Menu
        )
    }
}

impl ConfigBackend for V4l2Config {
    fn open(device: &str) -> BackendResult<Self> {
        let dev = Device::with_path(device).map_err(|source| BackendError::Open {
            device: device.to_owned(),
            source,
        })?;
        let caps = dev.query_caps().map_err(|source| BackendError::Open {
            device: device.to_owned(),
            source,
        })?;
        if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
            return Err(BackendError::Open {
                device: device.to_owned(),
                source: io::Error::new(io::ErrorKind::Unsupported, "not a capture device"),
            });
        }
        let controls = dev.query_controls().map_err(|source| BackendError::Open {
            device: device.to_owned(),
            source,
        })?;
        debug!(
            "opened {device}: {} with {} controls",
            caps.card,
            controls.len()
        );
        Ok(Self {
            stream: None,
            device: dev,
            card: caps.card,
            controls,
        })
    }

    fn capability_card(&self) -> &str {
        &self.card
    }

    fn describe_capabilities(&self) -> String {
        use std::fmt::Write as _;

        let mut out = String::new();
        if let Ok(caps) = self.device.query_caps() {
            let _ = writeln!(out, "card: {}", caps.card);
            let _ = writeln!(out, "driver: {}", caps.driver);
            let _ = writeln!(out, "bus: {}", caps.bus);
        }
        if let Ok(formats) = self.device.enum_formats() {
            for fmt in formats {
                let _ = write!(out, "format {}: {}", FourCC::from(fmt.fourcc), fmt.description);
                if let Ok(sizes) = self.device.enum_framesizes(fmt.fourcc) {
                    for size in sizes {
                        for discrete in size.size.to_discrete() {
                            let _ = write!(out, " {}x{}", discrete.width, discrete.height);
                        }
                    }
                }
                let _ = writeln!(out);
            }
        }
        for desc in &self.controls {
            let _ = writeln!(
                out,
                "control {}: id 0x{:08x} range [{}, {}] default {}",
                desc.name, desc.id, desc.minimum, desc.maximum, desc.default
            );
        }
        out
    }

    fn is_control_valid(&self, id: u32) -> bool {
        self.description(id)
            .is_some_and(|desc| desc.flags.bits() & CTRL_FLAG_DISABLED == 0)
    }

    fn is_control_writable(&self, id: u32) -> bool {
        self.description(id).is_some_and(Self::writable)
    }

    fn control_name(&self, id: u32) -> Option<String> {
        self.description(id).map(|desc| desc.name.clone())
    }

    fn control_minimum(&self, id: u32) -> Option<i32> {
        self.description(id).map(|desc| saturate_i32(desc.minimum))
    }

    fn control_maximum(&self, id: u32) -> Option<i32> {
        self.description(id).map(|desc| saturate_i32(desc.maximum))
    }

    fn control_value(&self, id: u32) -> BackendResult<i32> {
        if !self.is_control_valid(id) {
            return Err(BackendError::UnknownControl { id });
        }
        let ctrl = self.device.control(id)?;
        match ctrl.value {
            Value::Integer(value) => Ok(saturate_i32(value)),
            Value::Boolean(value) => Ok(i32::from(value)),
            _ => Err(BackendError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "control value is not scalar",
            ))),
        }
    }

    fn write_control_value(&mut self, id: u32, value: i32) -> BackendResult<()> {
        let Some(desc) = self.description(id) else {
            return Err(BackendError::UnknownControl { id });
        };
        let typed = match desc.typ {
            ControlType::Boolean => Value::Boolean(value != 0),
            _ => Value::Integer(i64::from(value)),
        };
        self.device.set_control(Control { id, value: typed })?;
        debug!("control 0x{id:08x} set to {value}");
        Ok(())
    }

    fn reset_controls_to_default(&mut self) -> BackendResult<()> {
        let defaults: Vec<Control> = self
            .controls
            .iter()
            .filter(|desc| Self::writable(desc) && Self::scalar(desc))
            .map(|desc| Control {
                id: desc.id,
                value: match desc.typ {
                    ControlType::Boolean => Value::Boolean(desc.default != 0),
                    _ => Value::Integer(desc.default),
                },
            })
            .collect();
        let count = defaults.len();
        for ctrl in defaults {
            self.device.set_control(ctrl)?;
        }
        debug!("reset {count} controls to their defaults");
        Ok(())
    }

    fn write_fps(&mut self, fps: u32) -> BackendResult<()> {
        self.device.set_params(&Parameters::with_fps(fps))?;
        debug!("requested {fps} fps");
        Ok(())
    }

    fn read_fps(&self) -> BackendResult<f64> {
        let params = self.device.params()?;
        let interval = params.interval;
        if interval.numerator == 0 {
            return Ok(0.0);
        }
        Ok(f64::from(interval.denominator) / f64::from(interval.numerator))
    }

    fn has_timeperframe(&self) -> bool {
        self.device
            .params()
            .is_ok_and(|params| params.capabilities.bits() & CAP_TIMEPERFRAME != 0)
    }

    fn write_image_format(
        &mut self,
        width: u32,
        height: u32,
        fourcc: Option<FourCC>,
    ) -> BackendResult<()> {
        let mut fmt = self.device.format()?;
        fmt.width = width;
        fmt.height = height;
        if let Some(fourcc) = fourcc {
            fmt.fourcc = fourcc.into();
        }
        let applied = self.device.set_format(&fmt)?;
        debug!(
            "format now {}x{} {}",
            applied.width,
            applied.height,
            FourCC::from(applied.fourcc)
        );
        Ok(())
    }

    fn image_size(&self) -> BackendResult<(u32, u32)> {
        let fmt = self.device.format()?;
        Ok((fmt.width, fmt.height))
    }

    fn init_requesting(&mut self, buffer_count: u32) -> BackendResult<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        let count = buffer_count.max(1);
        self.stream = Some(Stream::with_buffers(
            &self.device,
            Type::VideoCapture,
            count,
        )?);
        debug!("streaming with {count} buffers");
        Ok(())
    }

    fn cleanup_requesting(&mut self) {
        if self.stream.take().is_some() {
            debug!("streaming stopped");
        }
    }

    fn get_buffer(&mut self, buffer: &mut Vec<u8>, timeout: Duration) -> BackendResult<usize> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(BackendError::NotRequesting);
        };
        stream.set_timeout(timeout);
        let (data, meta) = stream.next().map_err(|err| {
            if err.kind() == io::ErrorKind::TimedOut {
                BackendError::Timeout { timeout }
            } else {
                BackendError::Io(err)
            }
        })?;
        let used = usize::try_from(meta.bytesused)
            .unwrap_or(data.len())
            .min(data.len());
        buffer.clear();
        buffer.extend_from_slice(data.get(..used).unwrap_or(data));
        Ok(buffer.len())
    }
}

/// Clamp a driver-reported 64-bit bound into the contract's i32 range.
fn saturate_i32(value: i64) -> i32 {
    if value > i64::from(i32::MAX) {
        i32::MAX
    } else if value < i64::from(i32::MIN) {
        i32::MIN
    } else {
        #[allow(clippy::cast_possible_truncation)]
        {
            value as i32
        }
    }
}
