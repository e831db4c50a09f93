//! Attribute families and the V4L2 control ids they map to.
//!
//! Control id values follow the kernel's `v4l2-controls.h`.

/// Base id of the user control class.
pub const CID_USER_BASE: u32 = 0x0098_0900;
/// Picture brightness.
pub const CID_BRIGHTNESS: u32 = CID_USER_BASE;
/// Picture contrast.
pub const CID_CONTRAST: u32 = CID_USER_BASE + 1;
/// Picture color saturation.
pub const CID_SATURATION: u32 = CID_USER_BASE + 2;
/// Automatic white balance (boolean).
pub const CID_AUTO_WHITE_BALANCE: u32 = CID_USER_BASE + 12;
/// Legacy exposure control from the user class.
pub const CID_EXPOSURE: u32 = CID_USER_BASE + 17;
/// Automatic gain (boolean).
pub const CID_AUTOGAIN: u32 = CID_USER_BASE + 18;
/// Power line frequency filter (menu: disabled, 50 Hz, 60 Hz).
pub const CID_POWER_LINE_FREQUENCY: u32 = CID_USER_BASE + 24;
/// White balance temperature in kelvin.
pub const CID_WHITE_BALANCE_TEMPERATURE: u32 = CID_USER_BASE + 26;
/// Edge sharpness.
pub const CID_SHARPNESS: u32 = CID_USER_BASE + 27;
/// Backlight compensation level.
pub const CID_BACKLIGHT_COMPENSATION: u32 = CID_USER_BASE + 28;

/// Base id of the camera control class.
pub const CID_CAMERA_BASE: u32 = 0x009a_0900;
/// Exposure mode (menu: auto, manual, shutter and aperture priority).
pub const CID_EXPOSURE_AUTO: u32 = CID_CAMERA_BASE + 1;
/// Absolute exposure time in 100 us units.
pub const CID_EXPOSURE_ABSOLUTE: u32 = CID_CAMERA_BASE + 2;
/// Whether auto exposure may vary the frame rate (boolean).
pub const CID_EXPOSURE_AUTO_PRIORITY: u32 = CID_CAMERA_BASE + 3;

/// Menu value selecting automatic exposure.
pub const EXPOSURE_MODE_AUTO: i32 = 0;
/// Menu value selecting manual exposure.
pub const EXPOSURE_MODE_MANUAL: i32 = 1;
/// Menu value disabling the power line filter.
pub const POWER_LINE_DISABLED: i32 = 0;
/// Menu value filtering 50 Hz mains flicker.
pub const POWER_LINE_50HZ: i32 = 1;
/// Menu value filtering 60 Hz mains flicker.
pub const POWER_LINE_60HZ: i32 = 2;

/// Integer-valued camera attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntAttrib {
    /// Picture brightness.
    BrightnessValue,
    /// Picture contrast.
    ContrastValue,
    /// Color saturation.
    SaturationValue,
    /// Manual gain level. Not mapped on this hardware.
    GainValue,
    /// White balance temperature.
    WhitebalValue,
    /// Red channel white balance. Not mapped on this hardware.
    WhitebalValueRed,
    /// Blue channel white balance. Not mapped on this hardware.
    WhitebalValueBlue,
    /// Edge sharpness.
    SharpnessValue,
    /// Backlight compensation level.
    BacklightCompensation,
    /// Exposure time.
    ExposureValue,
}

impl IntAttrib {
    /// Every member of the family, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::BrightnessValue,
        Self::ContrastValue,
        Self::SaturationValue,
        Self::GainValue,
        Self::WhitebalValue,
        Self::WhitebalValueRed,
        Self::WhitebalValueBlue,
        Self::SharpnessValue,
        Self::BacklightCompensation,
        Self::ExposureValue,
    ];

    /// Control ids this attribute may map to, in preference order.
    ///
    /// Attributes without a V4L2 counterpart on this hardware return an
    /// empty slice.
    #[must_use]
    pub const fn candidate_controls(self) -> &'static [u32] {
        match self {
            Self::BrightnessValue => &[CID_BRIGHTNESS],
            Self::ContrastValue => &[CID_CONTRAST],
            Self::SaturationValue => &[CID_SATURATION],
            Self::WhitebalValue => &[CID_WHITE_BALANCE_TEMPERATURE],
            Self::SharpnessValue => &[CID_SHARPNESS],
            Self::BacklightCompensation => &[CID_BACKLIGHT_COMPENSATION],
            Self::ExposureValue => &[CID_EXPOSURE_ABSOLUTE, CID_EXPOSURE],
            Self::GainValue | Self::WhitebalValueRed | Self::WhitebalValueBlue => &[],
        }
    }
}

/// Floating point camera attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DoubleAttrib {
    /// Capture frame rate in frames per second.
    FrameRate,
    /// Capture frame rate as reported to statistics consumers. Handled
    /// identically to [`Self::FrameRate`].
    StatFrameRate,
}

/// Switch-style camera attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumAttrib {
    /// Enable automatic white balance.
    WhitebalAutoToOn,
    /// Disable automatic white balance.
    WhitebalAutoToOff,
    /// Enable automatic gain.
    GainAutoToOn,
    /// Disable automatic gain.
    GainAutoToOff,
    /// Mirror the image horizontally. Not mapped on this hardware.
    MirrorXToOn,
    /// Stop mirroring the image. Not mapped on this hardware.
    MirrorXToOff,
    /// Disable the power line frequency filter.
    PowerLineFrequencyDisabled,
    /// Filter 50 Hz mains flicker.
    PowerLineFrequencyTo50,
    /// Filter 60 Hz mains flicker.
    PowerLineFrequencyTo60,
    /// Switch to automatic exposure.
    ExposureModeToAuto,
    /// Switch to manual exposure.
    ExposureModeToManual,
}

impl EnumAttrib {
    /// The control ids this switch may live on, probed in order, and the
    /// value selecting it.
    ///
    /// Unmapped attributes return an empty candidate slice.
    #[must_use]
    pub const fn control_mapping(self) -> (&'static [u32], i32) {
        match self {
            Self::WhitebalAutoToOn => (&[CID_AUTO_WHITE_BALANCE], 1),
            Self::WhitebalAutoToOff => (&[CID_AUTO_WHITE_BALANCE], 0),
            Self::GainAutoToOn => (&[CID_AUTOGAIN], 1),
            Self::GainAutoToOff => (&[CID_AUTOGAIN], 0),
            Self::PowerLineFrequencyDisabled => {
                (&[CID_POWER_LINE_FREQUENCY], POWER_LINE_DISABLED)
            }
            Self::PowerLineFrequencyTo50 => (&[CID_POWER_LINE_FREQUENCY], POWER_LINE_50HZ),
            Self::PowerLineFrequencyTo60 => (&[CID_POWER_LINE_FREQUENCY], POWER_LINE_60HZ),
            Self::ExposureModeToAuto => (
                &[CID_EXPOSURE_AUTO, CID_EXPOSURE_AUTO_PRIORITY],
                EXPOSURE_MODE_AUTO,
            ),
            Self::ExposureModeToManual => (
                &[CID_EXPOSURE_AUTO, CID_EXPOSURE_AUTO_PRIORITY],
                EXPOSURE_MODE_MANUAL,
            ),
            Self::MirrorXToOn | Self::MirrorXToOff => (&[], 0),
        }
    }
}
