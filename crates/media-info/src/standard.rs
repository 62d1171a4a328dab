use std::{fmt, str::FromStr};

use crate::{FrameRate, VideoFormatError};

/// SDI video standards the capture boards can lock onto.
///
/// Interlaced standards are named after their field rate (`1080i50` carries
/// 25 frames per second), progressive ones after their frame rate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum VideoStandard {
    Pal576i50,
    Ntsc486i60,
    Hd720p50,
    Hd720p60,
    Hd1080i50,
    Hd1080i60,
    Hd1080p24,
    Hd1080p25,
    Hd1080p30,
    Hd1080p50,
    Hd1080p60,
    Uhd2160p25,
    Uhd2160p30,
    Uhd2160p50,
    Uhd2160p60,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VideoCharacteristics {
    pub width: u32,
    pub height: u32,
    pub interlaced: bool,
    pub frame_rate: FrameRate,
}

impl VideoStandard {
    pub const ALL: [VideoStandard; 15] = [
        Self::Pal576i50,
        Self::Ntsc486i60,
        Self::Hd720p50,
        Self::Hd720p60,
        Self::Hd1080i50,
        Self::Hd1080i60,
        Self::Hd1080p24,
        Self::Hd1080p25,
        Self::Hd1080p30,
        Self::Hd1080p50,
        Self::Hd1080p60,
        Self::Uhd2160p25,
        Self::Uhd2160p30,
        Self::Uhd2160p50,
        Self::Uhd2160p60,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Pal576i50 => "pal576i50",
            Self::Ntsc486i60 => "ntsc486i60",
            Self::Hd720p50 => "hd720p50",
            Self::Hd720p60 => "hd720p60",
            Self::Hd1080i50 => "hd1080i50",
            Self::Hd1080i60 => "hd1080i60",
            Self::Hd1080p24 => "hd1080p24",
            Self::Hd1080p25 => "hd1080p25",
            Self::Hd1080p30 => "hd1080p30",
            Self::Hd1080p50 => "hd1080p50",
            Self::Hd1080p60 => "hd1080p60",
            Self::Uhd2160p25 => "uhd2160p25",
            Self::Uhd2160p30 => "uhd2160p30",
            Self::Uhd2160p50 => "uhd2160p50",
            Self::Uhd2160p60 => "uhd2160p60",
        }
    }

    /// Active picture geometry and nominal frame rate, before any clock
    /// divisor is applied.
    pub const fn characteristics(self) -> VideoCharacteristics {
        let (width, height, interlaced, fps) = match self {
            Self::Pal576i50 => (720, 576, true, 25),
            Self::Ntsc486i60 => (720, 486, true, 30),
            Self::Hd720p50 => (1280, 720, false, 50),
            Self::Hd720p60 => (1280, 720, false, 60),
            Self::Hd1080i50 => (1920, 1080, true, 25),
            Self::Hd1080i60 => (1920, 1080, true, 30),
            Self::Hd1080p24 => (1920, 1080, false, 24),
            Self::Hd1080p25 => (1920, 1080, false, 25),
            Self::Hd1080p30 => (1920, 1080, false, 30),
            Self::Hd1080p50 => (1920, 1080, false, 50),
            Self::Hd1080p60 => (1920, 1080, false, 60),
            Self::Uhd2160p25 => (3840, 2160, false, 25),
            Self::Uhd2160p30 => (3840, 2160, false, 30),
            Self::Uhd2160p50 => (3840, 2160, false, 50),
            Self::Uhd2160p60 => (3840, 2160, false, 60),
        };

        VideoCharacteristics {
            width,
            height,
            interlaced,
            frame_rate: FrameRate::integer(fps),
        }
    }
}

impl fmt::Display for VideoStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VideoStandard {
    type Err = VideoFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|standard| standard.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| VideoFormatError::UnknownStandard(s.to_string()))
    }
}

/// Divides the nominal rate by 1.001 for the NTSC-derived "drop" rates.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum ClockDivisor {
    #[default]
    Div1,
    Div1001,
}

impl ClockDivisor {
    pub const fn apply(self, rate: FrameRate) -> FrameRate {
        match self {
            Self::Div1 => rate,
            Self::Div1001 => FrameRate::new(rate.num * 1000, rate.den * 1001),
        }
    }
}

impl FromStr for ClockDivisor {
    type Err = VideoFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" | "div1" => Ok(Self::Div1),
            "1001" | "1.001" | "div1001" => Ok(Self::Div1001),
            other => Err(VideoFormatError::UnknownClockDivisor(other.to_string())),
        }
    }
}

/// Physical SDI interface carrying the standard.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SdiInterface {
    #[cfg_attr(feature = "serde", serde(rename = "sd"))]
    Sd259,
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "hd"))]
    Hd292,
    #[cfg_attr(feature = "serde", serde(rename = "3g-a"))]
    ThreeGA425,
    /// 3G level B, two independent HD streams on one link.
    #[cfg_attr(feature = "serde", serde(rename = "3g-b-ds"))]
    ThreeGBDualStream425,
    /// 3G level B, one stream split across two links.
    #[cfg_attr(feature = "serde", serde(rename = "3g-b-dl"))]
    ThreeGBDualLink425,
    #[cfg_attr(feature = "serde", serde(rename = "6g"))]
    SixG2081,
    #[cfg_attr(feature = "serde", serde(rename = "12g"))]
    TwelveG2082,
}

impl SdiInterface {
    pub const ALL: [SdiInterface; 7] = [
        Self::Sd259,
        Self::Hd292,
        Self::ThreeGA425,
        Self::ThreeGBDualStream425,
        Self::ThreeGBDualLink425,
        Self::SixG2081,
        Self::TwelveG2082,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Sd259 => "sd",
            Self::Hd292 => "hd",
            Self::ThreeGA425 => "3g-a",
            Self::ThreeGBDualStream425 => "3g-b-ds",
            Self::ThreeGBDualLink425 => "3g-b-dl",
            Self::SixG2081 => "6g",
            Self::TwelveG2082 => "12g",
        }
    }
}

impl fmt::Display for SdiInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SdiInterface {
    type Err = VideoFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|interface| interface.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| VideoFormatError::UnknownInterface(s.to_string()))
    }
}
