use crate::{ConvertError, ConvertedFrame, FrameView};
use dcap_media_info::FieldParity;

/// Whether row `y` was captured in the field that arrived first.
///
/// Even rows belong to the first field when the top field leads; unknown
/// parity is treated the same way.
pub fn is_field_line(y: usize, parity: FieldParity) -> bool {
    (y % 2 == 0) == parity.top_field_first()
}

/// Writes row `y` of `src` into `out`, reconstructing non-field rows by
/// averaging their neighbours. Neighbours outside the image clamp to `y`.
///
/// `out` must hold at least `src.row_bytes()` bytes.
pub fn bob_row(src: &FrameView<'_>, y: usize, parity: FieldParity, out: &mut [u8]) {
    let row_bytes = src.row_bytes();
    let out = &mut out[..row_bytes];

    if is_field_line(y, parity) {
        out.copy_from_slice(src.row(y));
        return;
    }

    let height = src.height() as usize;
    let up = src.row(y.saturating_sub(1));
    let down = src.row(if y + 1 < height { y + 1 } else { y });

    for ((o, a), b) in out.iter_mut().zip(up).zip(down) {
        *o = ((*a as u16 + *b as u16) >> 1) as u8;
    }
}

/// Bob-deinterlaces a whole frame into `dst`, which must already have the
/// source's dimensions.
pub fn deinterlace(
    src: &FrameView<'_>,
    parity: FieldParity,
    dst: &mut ConvertedFrame,
) -> Result<(), ConvertError> {
    dst.expect_dimensions(src.width(), src.height())?;

    for y in 0..src.height() as usize {
        bob_row(src, y, parity, dst.row_mut(y));
    }

    Ok(())
}
