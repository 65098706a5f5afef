//! Shared synthetic-image helpers for unit tests.

use image::{GrayImage, Luma};

/// Fill an axis-aligned square of `side` pixels at (x, y).
pub(crate) fn draw_filled_square(img: &mut GrayImage, x: u32, y: u32, side: u32, value: u8) {
    let (w, h) = img.dimensions();
    for yy in y..(y + side).min(h) {
        for xx in x..(x + side).min(w) {
            img.put_pixel(xx, yy, Luma([value]));
        }
    }
}

/// Fill a disc of radius `r` centered at (cx, cy).
pub(crate) fn draw_filled_circle(img: &mut GrayImage, cx: f64, cy: f64, r: f64, value: u8) {
    let (w, h) = img.dimensions();
    for y in 0..h {
        for x in 0..w {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            if dx * dx + dy * dy <= r * r {
                img.put_pixel(x, y, Luma([value]));
            }
        }
    }
}
