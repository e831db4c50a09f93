//! Frame buffer, pixel modes and capture settings.

use std::time::SystemTime;

/// Pixel format representation (e.g., YUYV, MJPG, RGB3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Create a new `FourCC` from a 4-byte array.
    #[must_use]
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    /// GREY pixel format (8-bit greyscale).
    pub const GREY: Self = Self::new(b"GREY");
    /// RGB3 pixel format (24-bit RGB).
    pub const RGB3: Self = Self::new(b"RGB3");
    /// BGR3 pixel format (24-bit BGR).
    pub const BGR3: Self = Self::new(b"BGR3");
    /// UYVY pixel format (4:2:2 packed, U first).
    pub const UYVY: Self = Self::new(b"UYVY");
    /// YUYV pixel format (4:2:2 packed, Y first).
    pub const YUYV: Self = Self::new(b"YUYV");
    /// MJPG pixel format (Motion JPEG).
    pub const MJPG: Self = Self::new(b"MJPG");
}

impl std::fmt::Display for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in self.0 {
            write!(f, "{}", char::from(byte))?;
        }
        Ok(())
    }
}

impl From<v4l::FourCC> for FourCC {
    fn from(fourcc: v4l::FourCC) -> Self {
        Self(fourcc.repr)
    }
}

impl From<FourCC> for v4l::FourCC {
    fn from(fourcc: FourCC) -> Self {
        Self::new(&fourcc.0)
    }
}

/// Image mode carried by a frame and requested through frame settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameMode {
    /// No mode selected yet; the camera keeps its current pixel format.
    #[default]
    Undefined,
    /// 8-bit greyscale.
    Grayscale,
    /// 24-bit RGB.
    Rgb,
    /// 24-bit BGR.
    Bgr,
    /// Packed 4:2:2 YUV, U first.
    Uyvy,
    /// Packed 4:2:2 YUV, Y first.
    Yuyv,
    /// Motion JPEG compressed.
    Jpeg,
}

impl FrameMode {
    /// The V4L2 pixel format for this mode, or `None` for `Undefined`.
    #[must_use]
    pub const fn fourcc(self) -> Option<FourCC> {
        match self {
            Self::Undefined => None,
            Self::Grayscale => Some(FourCC::GREY),
            Self::Rgb => Some(FourCC::RGB3),
            Self::Bgr => Some(FourCC::BGR3),
            Self::Uyvy => Some(FourCC::UYVY),
            Self::Yuyv => Some(FourCC::YUYV),
            Self::Jpeg => Some(FourCC::MJPG),
        }
    }

    /// Bits per sample for frames in this mode (16 for packed YUV, 8
    /// otherwise).
    #[must_use]
    pub const fn data_depth(self) -> u8 {
        match self {
            Self::Uyvy | Self::Yuyv => 16,
            _ => 8,
        }
    }
}

/// Lifecycle status of a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameStatus {
    /// Never filled.
    #[default]
    Empty,
    /// Holds a complete capture.
    Valid,
    /// The last capture into this frame was incomplete.
    Invalid,
}

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl FrameSize {
    /// Create a new size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Requested or applied capture configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameSettings {
    /// Frame dimensions.
    pub size: FrameSize,
    /// Pixel mode.
    pub mode: FrameMode,
    /// Bytes per pixel the consumer expects after decoding.
    pub color_depth: u8,
}

impl FrameSettings {
    /// Create new capture settings.
    #[must_use]
    pub const fn new(size: FrameSize, mode: FrameMode, color_depth: u8) -> Self {
        Self {
            size,
            mode,
            color_depth,
        }
    }
}

/// A captured image with its metadata.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    /// Raw image bytes.
    pub image: Vec<u8>,
    /// Image dimensions.
    pub size: FrameSize,
    /// Bits per sample (16 for packed YUV, 8 otherwise).
    pub data_depth: u8,
    /// Pixel mode of `image`.
    pub mode: FrameMode,
    /// Whether `image` holds a complete capture.
    pub status: FrameStatus,
    /// Time the capture was received.
    pub time: Option<SystemTime>,
}

impl Frame {
    /// Create an empty frame.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepare the frame for an image with the given parameters.
    ///
    /// The backing buffer is re-allocated only when the parameters differ
    /// from the previous initialisation or the capacity is too small;
    /// otherwise the existing allocation is kept and cleared.
    pub fn init(&mut self, size: FrameSize, data_depth: u8, mode: FrameMode, size_in_bytes: usize) {
        let changed = self.size != size
            || self.data_depth != data_depth
            || self.mode != mode
            || self.image.capacity() < size_in_bytes;
        if changed {
            self.image = Vec::with_capacity(size_in_bytes);
            self.size = size;
            self.data_depth = data_depth;
            self.mode = mode;
            self.status = FrameStatus::Empty;
            self.time = None;
        }
        self.image.clear();
    }

    /// Number of image bytes currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.image.len()
    }

    /// True when no image bytes are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.image.is_empty()
    }
}
