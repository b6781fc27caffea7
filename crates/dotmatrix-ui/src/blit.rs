/// Expand `src` into `dst` by an integer scale factor.
///
/// `src` is a row-major image `src_width` pixels wide; `dst` must hold
/// exactly `src.len() * scale * scale` pixels. Each source pixel becomes a
/// `scale` x `scale` block.
pub fn blit_scaled(src: &[u32], dst: &mut [u32], src_width: usize, scale: usize) {
    debug_assert_eq!(src.len() % src_width, 0);
    debug_assert_eq!(dst.len(), src.len() * scale * scale);

    let src_height = src.len() / src_width;
    let dst_width = src_width * scale;
    for y in 0..src_height {
        let src_row = &src[y * src_width..(y + 1) * src_width];
        for sy in 0..scale {
            let base = (y * scale + sy) * dst_width;
            for (x, &px) in src_row.iter().enumerate() {
                dst[base + x * scale..base + (x + 1) * scale].fill(px);
            }
        }
    }
}
