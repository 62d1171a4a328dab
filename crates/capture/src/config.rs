use dcap_media_info::{
    ClockDivisor, PixelPacking, SdiInterface, SignalInformation, VideoFormat, VideoStandard,
};
use serde::{Deserialize, Serialize};

/// Settings for one capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub device_id: u32,
    pub stream_index: u32,
    /// Slots the board may queue. Zero or negative selects the default.
    pub queue_depth: i32,
    pub flip_vertical: bool,
    pub mode: CaptureMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            stream_index: 0,
            queue_depth: Self::DEFAULT_QUEUE_DEPTH as i32,
            flip_vertical: true,
            mode: CaptureMode::Auto,
        }
    }
}

impl SessionConfig {
    pub const DEFAULT_QUEUE_DEPTH: u32 = 8;

    pub fn stereo() -> Self {
        Self::default().with_mode(CaptureMode::stereo())
    }

    pub fn explicit(signal: SignalInformation) -> Self {
        Self::default().with_mode(CaptureMode::Explicit {
            signal,
            packing: PixelPacking::default(),
            field_merge: false,
        })
    }

    pub fn with_device(mut self, device_id: u32) -> Self {
        self.device_id = device_id;
        self
    }

    pub fn with_stream(mut self, stream_index: u32) -> Self {
        self.stream_index = stream_index;
        self
    }

    pub fn with_queue_depth(mut self, depth: i32) -> Self {
        self.queue_depth = depth;
        self
    }

    pub fn with_flip(mut self, flip_vertical: bool) -> Self {
        self.flip_vertical = flip_vertical;
        self
    }

    pub fn with_mode(mut self, mode: CaptureMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn effective_queue_depth(&self) -> u32 {
        match u32::try_from(self.queue_depth) {
            Ok(depth) if depth > 0 => depth,
            _ => Self::DEFAULT_QUEUE_DEPTH,
        }
    }

    /// Streams the session opens, left leg first in stereo.
    pub fn stream_indices(&self) -> Vec<u32> {
        match self.mode {
            CaptureMode::Stereo { right_stream, .. } => vec![self.stream_index, right_stream],
            _ => vec![self.stream_index],
        }
    }

    pub fn packing(&self) -> PixelPacking {
        match self.mode {
            CaptureMode::Explicit { packing, .. } => packing,
            _ => PixelPacking::Yuv422_8,
        }
    }

    pub fn field_merge(&self) -> bool {
        match self.mode {
            CaptureMode::Auto => false,
            CaptureMode::Explicit { field_merge, .. } => field_merge,
            CaptureMode::Stereo { .. } => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaptureMode {
    /// Detect the signal and follow it.
    #[default]
    Auto,
    /// Configure the stream with `signal` instead of the first detection.
    /// Later format changes are still followed.
    Explicit {
        signal: SignalInformation,
        #[serde(default)]
        packing: PixelPacking,
        #[serde(default)]
        field_merge: bool,
    },
    /// Two streams packed side by side into one frame.
    Stereo {
        #[serde(default = "default_right_stream")]
        right_stream: u32,
        #[serde(default)]
        format: StereoFormat,
        #[serde(default = "default_deinterlace")]
        deinterlace: bool,
    },
}

impl CaptureMode {
    pub fn stereo() -> Self {
        Self::Stereo {
            right_stream: default_right_stream(),
            format: StereoFormat::default(),
            deinterlace: default_deinterlace(),
        }
    }

    pub fn is_stereo(&self) -> bool {
        matches!(self, Self::Stereo { .. })
    }
}

fn default_right_stream() -> u32 {
    1
}

fn default_deinterlace() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StereoFormat {
    /// Both legs are configured with this signal and detection is ignored.
    Pinned(SignalInformation),
    /// Each leg follows its own detected format.
    Detect,
}

impl Default for StereoFormat {
    fn default() -> Self {
        Self::Pinned(SignalInformation::Sdi {
            standard: VideoStandard::Hd1080i50,
            clock_divisor: ClockDivisor::Div1,
            interface: SdiInterface::ThreeGBDualStream425,
        })
    }
}

impl StereoFormat {
    pub fn pinned_format(&self) -> Option<VideoFormat> {
        match self {
            Self::Pinned(signal) => Some(VideoFormat::from_signal(signal)),
            Self::Detect => None,
        }
    }
}
