use anyhow::{Context, Result};
use dcap_capture::{
    SessionConfig,
    synthetic::{StreamSetup, SyntheticDriver, TestPattern},
};
use dcap_media_info::{
    ClockDivisor, FieldParity, SdiInterface, SignalInformation, VideoFormat, VideoStandard,
};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub session: SessionConfig,
    pub board: BoardConfig,
}

impl CliConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    #[default]
    ColorBars,
    Gradient,
    Black,
    White,
}

impl PatternKind {
    fn pattern(self) -> TestPattern {
        match self {
            Self::ColorBars => TestPattern::ColorBars,
            Self::Gradient => TestPattern::Gradient,
            Self::Black => TestPattern::Solid { r: 0, g: 0, b: 0 },
            Self::White => TestPattern::Solid {
                r: 255,
                g: 255,
                b: 255,
            },
        }
    }
}

/// What the synthetic board feeds the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub signal: SignalInformation,
    /// Signal on the stereo right leg. Defaults to `signal`.
    pub right_signal: Option<SignalInformation>,
    pub pattern: PatternKind,
    pub row_padding: usize,
    pub parity: FieldParity,
    pub frame_interval_ms: u64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            signal: SignalInformation::Sdi {
                standard: VideoStandard::Hd1080i50,
                clock_divisor: ClockDivisor::Div1,
                interface: SdiInterface::ThreeGBDualStream425,
            },
            right_signal: None,
            pattern: PatternKind::default(),
            row_padding: 0,
            parity: FieldParity::Even,
            frame_interval_ms: 40,
        }
    }
}

impl BoardConfig {
    fn stream(&self, signal: &SignalInformation) -> StreamSetup {
        StreamSetup::new(VideoFormat::from_signal(signal))
            .with_pattern(self.pattern.pattern())
            .with_row_padding(self.row_padding)
            .with_parity(self.parity)
            .with_frame_interval(Duration::from_millis(self.frame_interval_ms))
    }

    pub fn driver(&self, session: &SessionConfig) -> SyntheticDriver {
        let driver = SyntheticDriver::new(self.stream(&self.signal));

        match (&self.right_signal, session.stream_indices().get(1)) {
            (Some(right), Some(index)) => driver.with_stream(*index, self.stream(right)),
            _ => driver,
        }
    }
}
