//! Synthetic scans and masks.

use image::{GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use std::io::Cursor;

/// Paper color of the synthetic scans.
pub const PAPER: Rgb<u8> = Rgb([235, 225, 200]);
/// Ink color of the synthetic scans.
pub const INK: Rgb<u8> = Rgb([30, 30, 40]);

/// Sets the rectangle `[x0, x1) x [y0, y1)` of `mask` to ink.
pub fn fill_mask(mask: &mut GrayImage, x0: u32, y0: u32, x1: u32, y1: u32) {
    for y in y0..y1 {
        for x in x0..x1 {
            mask.put_pixel(x, y, Luma([255]));
        }
    }
}

/// A binary mask with one solid ink band per `(top, bottom)` row range, spanning
/// columns `[x0, x1)`.
pub fn mask_with_bands(width: u32, height: u32, x0: u32, x1: u32, rows: &[(u32, u32)]) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    for &(top, bottom) in rows {
        fill_mask(&mut mask, x0, top, x1, bottom);
    }
    mask
}

/// A 500 x 400 scan with dark handwriting-like strokes on the given row ranges.
///
/// Strokes are broken every few pixels so the ruling-line detector does not take them
/// for table rules.
pub fn page_with_lines(rows: &[(u32, u32)]) -> RgbImage {
    RgbImage::from_fn(500, 400, |x, y| {
        let on_line = rows.iter().any(|&(top, bottom)| (top..bottom).contains(&y));
        if on_line && (60..440).contains(&x) && (x / 12) % 3 != 0 {
            INK
        } else {
            PAPER
        }
    })
}

/// PNG encoding of `page`.
pub fn png_bytes(page: &RgbImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    page.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("should encode png");
    bytes
}
