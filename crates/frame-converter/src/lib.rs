mod deinterlace;
pub use deinterlace::*;

mod frame;
pub use frame::*;

mod stereo;
pub use stereo::*;

mod uyvy;
pub use uyvy::*;

use dcap_media_info::PixelPacking;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    #[error("Odd width {0}: 4:2:2 input needs whole pixel pairs")]
    OddWidth(u32),
    #[error("Frame has no rows")]
    EmptyFrame,
    #[error("Row pitch {pitch} is smaller than a row of {row_bytes} bytes")]
    PitchTooSmall { pitch: usize, row_bytes: usize },
    #[error("Source too short: need {expected} bytes, got {actual}")]
    SourceTooShort { expected: usize, actual: usize },
    #[error("Destination is {actual:?}, expected {expected:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("Failed to allocate {0} bytes for a frame buffer")]
    Allocation(usize),
}

/// Turns one raw slot into BGRA, writing into a buffer the caller already
/// sized for the configured format.
pub trait FrameConverter: Send + Sync + 'static {
    fn convert(&self, input: &RawFrame<'_>, output: &mut ConvertedFrame)
    -> Result<(), ConvertError>;

    fn name(&self) -> &'static str;

    fn packing(&self) -> PixelPacking;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionConfig {
    pub packing: PixelPacking,
    pub flip_vertical: bool,
}

impl ConversionConfig {
    pub fn new(packing: PixelPacking, flip_vertical: bool) -> Self {
        Self {
            packing,
            flip_vertical,
        }
    }
}

pub fn create_converter(config: ConversionConfig) -> Arc<dyn FrameConverter> {
    let converter: Arc<dyn FrameConverter> = match config.packing {
        PixelPacking::Yuv422_8 => Arc::new(UyvyConverter::new(config.flip_vertical)),
        PixelPacking::Bgra8 => Arc::new(BgraCopyConverter::new(config.flip_vertical)),
    };

    tracing::debug!(
        "Using {} converter for {:?} (flip: {})",
        converter.name(),
        config.packing,
        config.flip_vertical
    );

    converter
}

/// Copies slots that the board already packed as BGRA, applying the same
/// flip and pitch handling as the 4:2:2 kernel.
pub struct BgraCopyConverter {
    flip_vertical: bool,
}

impl BgraCopyConverter {
    pub fn new(flip_vertical: bool) -> Self {
        Self { flip_vertical }
    }
}

impl FrameConverter for BgraCopyConverter {
    fn convert(
        &self,
        input: &RawFrame<'_>,
        output: &mut ConvertedFrame,
    ) -> Result<(), ConvertError> {
        input.validate(PixelPacking::Bgra8)?;
        output.expect_dimensions(input.width(), input.height())?;

        let height = input.height() as usize;
        let row_bytes = output.pitch();

        for y in 0..height {
            let dst_y = if self.flip_vertical { height - 1 - y } else { y };
            output
                .row_mut(dst_y)
                .copy_from_slice(&input.row(y)[..row_bytes]);
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "bgra-copy"
    }

    fn packing(&self) -> PixelPacking {
        PixelPacking::Bgra8
    }
}
