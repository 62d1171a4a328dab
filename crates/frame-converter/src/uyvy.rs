use crate::{ConvertError, ConvertedFrame, FrameConverter, RawFrame};
use dcap_media_info::PixelPacking;

/// Scalar 8-bit 4:2:2 (`U Y0 V Y1`) to BGRA kernel using BT.601 studio-range
/// integer coefficients.
pub struct UyvyConverter {
    flip_vertical: bool,
}

impl UyvyConverter {
    pub fn new(flip_vertical: bool) -> Self {
        Self { flip_vertical }
    }
}

impl FrameConverter for UyvyConverter {
    fn convert(
        &self,
        input: &RawFrame<'_>,
        output: &mut ConvertedFrame,
    ) -> Result<(), ConvertError> {
        input.validate(PixelPacking::Yuv422_8)?;
        output.expect_dimensions(input.width(), input.height())?;

        let height = input.height() as usize;
        let src_row_bytes = input.width() as usize * 2;

        for y in 0..height {
            let dst_y = if self.flip_vertical { height - 1 - y } else { y };
            uyvy_row_to_bgra(&input.row(y)[..src_row_bytes], output.row_mut(dst_y));
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "uyvy"
    }

    fn packing(&self) -> PixelPacking {
        PixelPacking::Yuv422_8
    }
}

fn uyvy_row_to_bgra(src: &[u8], dst: &mut [u8]) {
    for (pair, out) in src.chunks_exact(4).zip(dst.chunks_exact_mut(8)) {
        let d = pair[0] as i32 - 128;
        let e = pair[2] as i32 - 128;

        write_bgra(pair[1], d, e, &mut out[..4]);
        write_bgra(pair[3], d, e, &mut out[4..]);
    }
}

#[inline]
fn write_bgra(luma: u8, d: i32, e: i32, out: &mut [u8]) {
    let c = (luma as i32 - 16).max(0) * 298;

    out[0] = clamp_u8((c + 516 * d + 128) >> 8);
    out[1] = clamp_u8((c - 100 * d - 208 * e + 128) >> 8);
    out[2] = clamp_u8((c + 409 * e + 128) >> 8);
    out[3] = 255;
}

#[inline]
fn clamp_u8(val: i32) -> u8 {
    val.clamp(0, 255) as u8
}
