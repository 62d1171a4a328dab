use crate::ConvertError;
use dcap_media_info::{FieldParity, PixelPacking};

/// A slot's video buffer as the board hands it over.
///
/// Borrowed for one loop iteration only; everything the pipeline needs is
/// copied out by the converter before the slot goes back to the driver.
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    data: &'a [u8],
    pitch: usize,
    width: u32,
    height: u32,
    parity: FieldParity,
}

impl<'a> RawFrame<'a> {
    /// Derives the row pitch from the total byte count, which keeps any
    /// alignment padding the driver appends to each row.
    pub fn from_slot(
        data: &'a [u8],
        width: u32,
        height: u32,
        parity: FieldParity,
    ) -> Result<Self, ConvertError> {
        if height == 0 {
            return Err(ConvertError::EmptyFrame);
        }

        Ok(Self::with_pitch(
            data,
            data.len() / height as usize,
            width,
            height,
            parity,
        ))
    }

    pub fn with_pitch(
        data: &'a [u8],
        pitch: usize,
        width: u32,
        height: u32,
        parity: FieldParity,
    ) -> Self {
        Self {
            data,
            pitch,
            width,
            height,
            parity,
        }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn pitch(&self) -> usize {
        self.pitch
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn parity(&self) -> FieldParity {
        self.parity
    }

    /// Checks that every row of `packing` pixels fits in the buffer.
    pub fn validate(&self, packing: PixelPacking) -> Result<(), ConvertError> {
        if self.height == 0 {
            return Err(ConvertError::EmptyFrame);
        }
        if packing == PixelPacking::Yuv422_8 && self.width % 2 != 0 {
            return Err(ConvertError::OddWidth(self.width));
        }

        let row_bytes = self.width as usize * packing.bytes_per_pixel();
        if self.pitch < row_bytes {
            return Err(ConvertError::PitchTooSmall {
                pitch: self.pitch,
                row_bytes,
            });
        }

        let expected = (self.height as usize - 1) * self.pitch + row_bytes;
        if self.data.len() < expected {
            return Err(ConvertError::SourceTooShort {
                expected,
                actual: self.data.len(),
            });
        }

        Ok(())
    }

    /// Row `y` from its first byte up to the end of the buffer's pitch.
    pub(crate) fn row(&self, y: usize) -> &'a [u8] {
        let start = y * self.pitch;
        let end = (start + self.pitch).min(self.data.len());
        &self.data[start..end]
    }
}

/// Owned BGRA frame with a tight pitch of `width * 4`.
///
/// Worker stages keep one of these per stream and only reallocate when the
/// configured dimensions change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertedFrame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl ConvertedFrame {
    pub const BYTES_PER_PIXEL: usize = 4;

    pub fn new(width: u32, height: u32) -> Result<Self, ConvertError> {
        let mut frame = Self::default();
        frame.resize(width, height)?;
        Ok(frame)
    }

    /// Resizes to `width` x `height`, zeroing the contents. Does nothing when
    /// the dimensions are unchanged.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), ConvertError> {
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }

        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(Self::BYTES_PER_PIXEL))
            .ok_or(ConvertError::Allocation(usize::MAX))?;

        self.data.clear();
        self.data
            .try_reserve_exact(len)
            .map_err(|_| ConvertError::Allocation(len))?;
        self.data.resize(len, 0);
        self.width = width;
        self.height = height;

        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pitch(&self) -> usize {
        self.width as usize * Self::BYTES_PER_PIXEL
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn row(&self, y: usize) -> &[u8] {
        let pitch = self.pitch();
        &self.data[y * pitch..(y + 1) * pitch]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let pitch = self.pitch();
        &mut self.data[y * pitch..(y + 1) * pitch]
    }

    pub fn view(&self) -> FrameView<'_> {
        FrameView {
            data: &self.data,
            width: self.width,
            height: self.height,
            pitch: self.pitch(),
        }
    }

    pub(crate) fn expect_dimensions(&self, width: u32, height: u32) -> Result<(), ConvertError> {
        if self.dimensions() != (width, height) {
            return Err(ConvertError::DimensionMismatch {
                expected: (width, height),
                actual: self.dimensions(),
            });
        }
        Ok(())
    }
}

/// Read-only BGRA image with its own pitch.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    pitch: usize,
}

impl<'a> FrameView<'a> {
    pub fn new(
        data: &'a [u8],
        width: u32,
        height: u32,
        pitch: usize,
    ) -> Result<Self, ConvertError> {
        let row_bytes = width as usize * ConvertedFrame::BYTES_PER_PIXEL;
        if pitch < row_bytes {
            return Err(ConvertError::PitchTooSmall { pitch, row_bytes });
        }
        if height > 0 {
            let expected = (height as usize - 1) * pitch + row_bytes;
            if data.len() < expected {
                return Err(ConvertError::SourceTooShort {
                    expected,
                    actual: data.len(),
                });
            }
        }

        Ok(Self {
            data,
            width,
            height,
            pitch,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pitch(&self) -> usize {
        self.pitch
    }

    pub fn row_bytes(&self) -> usize {
        self.width as usize * ConvertedFrame::BYTES_PER_PIXEL
    }

    pub fn row(&self, y: usize) -> &'a [u8] {
        let start = y * self.pitch;
        &self.data[start..start + self.row_bytes()]
    }
}
