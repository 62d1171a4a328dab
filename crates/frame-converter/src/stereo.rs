use crate::{ConvertError, ConvertedFrame, FrameView, bob_row};
use dcap_media_info::FieldParity;

/// Canvas size for two frames laid side by side.
pub fn packed_dimensions(left: (u32, u32), right: (u32, u32)) -> (u32, u32) {
    (left.0 + right.0, left.1.max(right.1))
}

/// Lays `left` and `right` out side by side in `dst`.
///
/// Rows past the end of the shorter source are zero on that side. With
/// `deinterlace` set each source is bob-reconstructed using `parity` as it is
/// copied.
pub fn pack_side_by_side(
    left: &FrameView<'_>,
    right: &FrameView<'_>,
    deinterlace: bool,
    parity: FieldParity,
    dst: &mut ConvertedFrame,
) -> Result<(), ConvertError> {
    let (width, height) = packed_dimensions(
        (left.width(), left.height()),
        (right.width(), right.height()),
    );
    dst.expect_dimensions(width, height)?;

    let left_bytes = left.row_bytes();

    for y in 0..height as usize {
        let (left_out, right_out) = dst.row_mut(y).split_at_mut(left_bytes);
        copy_leg(left, y, deinterlace, parity, left_out);
        copy_leg(right, y, deinterlace, parity, right_out);
    }

    Ok(())
}

fn copy_leg(
    src: &FrameView<'_>,
    y: usize,
    deinterlace: bool,
    parity: FieldParity,
    out: &mut [u8],
) {
    if y >= src.height() as usize {
        out.fill(0);
    } else if deinterlace {
        bob_row(src, y, parity, out);
    } else {
        out.copy_from_slice(src.row(y));
    }
}
