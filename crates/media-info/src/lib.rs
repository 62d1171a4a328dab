mod standard;
pub use standard::*;

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VideoFormatError {
    #[error("Unknown video standard: {0}")]
    UnknownStandard(String),
    #[error("Unknown SDI interface: {0}")]
    UnknownInterface(String),
    #[error("Unknown clock divisor: {0}")]
    UnknownClockDivisor(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    pub const fn integer(fps: u32) -> Self {
        Self { num: fps, den: 1 }
    }

    pub fn as_f64(&self) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        f64::from(self.num) / f64::from(self.den)
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{:.2}", self.as_f64())
        }
    }
}

/// Which field of an interlaced frame the board captured first.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum FieldParity {
    #[default]
    Unknown,
    Even,
    Odd,
}

impl FieldParity {
    /// Unknown parity is treated like even-first.
    pub const fn top_field_first(self) -> bool {
        !matches!(self, Self::Odd)
    }
}

/// Layout the board writes into its slots.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum PixelPacking {
    /// 8-bit 4:2:2, `U Y0 V Y1` per pixel pair.
    #[default]
    Yuv422_8,
    /// 8-bit BGRA, already in output order.
    Bgra8,
}

impl PixelPacking {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Yuv422_8 => 2,
            Self::Bgra8 => 4,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum CableColorSpace {
    Rgb,
    Yuv601,
    #[default]
    Yuv709,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum CableSampling {
    Rgb444,
    #[default]
    Yuv422,
    Yuv444,
}

/// Signal description as the board reports it, or as a caller requests it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum SignalInformation {
    Sdi {
        standard: VideoStandard,
        #[cfg_attr(feature = "serde", serde(default))]
        clock_divisor: ClockDivisor,
        #[cfg_attr(feature = "serde", serde(default))]
        interface: SdiInterface,
    },
    /// HDMI/DVI style input, described by its timing rather than a standard.
    Dv {
        width: u32,
        height: u32,
        progressive: bool,
        frame_rate: u32,
        #[cfg_attr(feature = "serde", serde(default))]
        color_space: CableColorSpace,
        #[cfg_attr(feature = "serde", serde(default))]
        sampling: CableSampling,
    },
}

/// The part of the signal description that is not geometry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum SignalTag {
    Sdi {
        standard: VideoStandard,
        clock_divisor: ClockDivisor,
        interface: SdiInterface,
    },
    Dv {
        color_space: CableColorSpace,
        sampling: CableSampling,
    },
}

/// A detected or requested video format.
///
/// Formats are compared by value: any difference, including the signal tag,
/// means the stream has to be reconfigured.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    pub interlaced: bool,
    pub frame_rate: FrameRate,
    pub signal: SignalTag,
}

impl VideoFormat {
    pub fn from_signal(info: &SignalInformation) -> Self {
        match *info {
            SignalInformation::Sdi {
                standard,
                clock_divisor,
                interface,
            } => Self::sdi(standard, clock_divisor, interface),
            SignalInformation::Dv {
                width,
                height,
                progressive,
                frame_rate,
                color_space,
                sampling,
            } => Self {
                width,
                height,
                interlaced: !progressive,
                frame_rate: FrameRate::integer(frame_rate),
                signal: SignalTag::Dv {
                    color_space,
                    sampling,
                },
            },
        }
    }

    pub const fn sdi(
        standard: VideoStandard,
        clock_divisor: ClockDivisor,
        interface: SdiInterface,
    ) -> Self {
        let c = standard.characteristics();
        Self {
            width: c.width,
            height: c.height,
            interlaced: c.interlaced,
            frame_rate: clock_divisor.apply(c.frame_rate),
            signal: SignalTag::Sdi {
                standard,
                clock_divisor,
                interface,
            },
        }
    }

    /// Progressive DV format with default cable settings.
    pub const fn dv(width: u32, height: u32, frame_rate: u32) -> Self {
        Self {
            width,
            height,
            interlaced: false,
            frame_rate: FrameRate::integer(frame_rate),
            signal: SignalTag::Dv {
                color_space: CableColorSpace::Yuv709,
                sampling: CableSampling::Yuv422,
            },
        }
    }

    /// Geometry that cannot be captured in `packing`. Odd widths only fail
    /// for 4:2:2, which stores whole pixel pairs.
    pub const fn is_degenerate(&self, packing: PixelPacking) -> bool {
        self.width == 0
            || self.height == 0
            || (matches!(packing, PixelPacking::Yuv422_8) && self.width % 2 != 0)
    }

    pub const fn bgra_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}{} @ {}",
            self.width,
            self.height,
            if self.interlaced { "i" } else { "p" },
            self.frame_rate
        )?;

        match self.signal {
            SignalTag::Sdi {
                standard,
                interface,
                ..
            } => write!(f, " (SDI {standard} over {interface})"),
            SignalTag::Dv {
                color_space,
                sampling,
            } => write!(f, " (DV {color_space:?} {sampling:?})"),
        }
    }
}
