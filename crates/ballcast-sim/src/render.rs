//! Software rasterizer for the simulator's single primitive: a filled circle
//! on a black BGR canvas.

use ballcast_core::{Bounds, Color, Position};
use bytes::BytesMut;

const CHANNELS: usize = 3;

/// Allocates a zero-filled (black) BGR canvas sized to `bounds`.
pub fn blank_canvas(bounds: Bounds) -> BytesMut {
    BytesMut::zeroed(bounds.total_pixels() as usize * CHANNELS)
}

/// Fills every pixel whose center lies within `radius` of `center`.
///
/// The circle is clipped to the canvas; a center outside the canvas is fine.
pub fn fill_circle(canvas: &mut [u8], bounds: Bounds, center: Position, radius: u32, color: Color) {
    debug_assert_eq!(canvas.len(), bounds.total_pixels() as usize * CHANNELS);

    let r = radius as i64;
    let r_sq = r * r;
    let (cx, cy) = (center.x as i64, center.y as i64);
    let (w, h) = (bounds.width as i64, bounds.height as i64);
    let bgr = color.to_bgr_bytes();

    let y_start = (cy - r).max(0);
    let y_end = (cy + r).min(h - 1);

    for y in y_start..=y_end {
        let dy = y - cy;
        // Widest dx with dx² + dy² <= r².
        let half = isqrt(r_sq - dy * dy);
        let x_start = (cx - half).max(0);
        let x_end = (cx + half).min(w - 1);
        if x_start > x_end {
            continue;
        }
        let row = (y * w) as usize * CHANNELS;
        let span = &mut canvas[row + x_start as usize * CHANNELS..row + (x_end as usize + 1) * CHANNELS];
        for px in span.chunks_exact_mut(CHANNELS) {
            px.copy_from_slice(&bgr);
        }
    }
}

fn isqrt(n: i64) -> i64 {
    if n <= 0 {
        return 0;
    }
    let mut x = (n as f64).sqrt() as i64;
    while x * x > n {
        x -= 1;
    }
    while (x + 1) * (x + 1) <= n {
        x += 1;
    }
    x
}
