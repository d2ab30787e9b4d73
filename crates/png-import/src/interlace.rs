//! Adam7 interlacing geometry.
//!
//! Seven passes, each a sub-image on an offset grid; together they cover
//! every pixel exactly once.

/// Per-pass `(x_offset, y_offset, x_step, y_step)`.
pub const ADAM7: [(u32, u32, u32, u32); 7] = [
    (0, 0, 8, 8),
    (4, 0, 8, 8),
    (0, 4, 4, 8),
    (2, 0, 4, 4),
    (0, 2, 2, 4),
    (1, 0, 2, 2),
    (0, 1, 1, 2),
];

/// Pixel dimensions of one pass over a `width` x `height` image; `(0, 0)`
/// when the pass is empty.
pub fn pass_size(pass: usize, width: u32, height: u32) -> (u32, u32) {
    let (x0, y0, dx, dy) = ADAM7[pass];
    if width <= x0 || height <= y0 {
        return (0, 0);
    }
    ((width - x0 + dx - 1) / dx, (height - y0 + dy - 1) / dy)
}
