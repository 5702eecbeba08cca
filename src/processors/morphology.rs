//! Morphology with rectangular structuring elements.
//!
//! A rectangle is separable, so every operation is a horizontal pass followed by a
//! vertical one, each built from `imageproc::morphology` line masks.
//!
//! The element anchor sits at `(k_w / 2, k_h / 2)`. Dilation uses the reflected element so
//! that an opening never grows a shape, including for even-sized elements. Pixels outside
//! the image are ignored, which behaves as if the border were padded with the neutral value
//! of the operation.

use image::{GrayImage, Luma};
use imageproc::morphology::{Mask, grayscale_dilate, grayscale_erode};

/// Largest reach on either side of the anchor that one `Mask` can hold (side < 512).
const MAX_REACH: u32 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Erode,
    Dilate,
}

impl Operation {
    fn apply(self, image: &GrayImage, mask: &Mask) -> GrayImage {
        match self {
            Operation::Erode => grayscale_erode(image, mask),
            Operation::Dilate => grayscale_dilate(image, mask),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Horizontal,
    Vertical,
}

/// Window reach `(before, after)` of an element of length `k` anchored at `k / 2`.
fn reach(k: u32, operation: Operation) -> (u32, u32) {
    let anchor = k / 2;
    let rest = k.saturating_sub(anchor + 1);
    match operation {
        Operation::Erode => (anchor, rest),
        Operation::Dilate => (rest, anchor),
    }
}

/// Line element covering offsets `-before..=after` along `axis`.
fn line_mask(axis: Axis, before: u32, after: u32) -> Mask {
    let length = before + after + 1;
    let (width, height, center_x, center_y) = match axis {
        Axis::Horizontal => (length, 1, before, 0),
        Axis::Vertical => (1, length, 0, before),
    };
    let element = GrayImage::from_pixel(width, height, Luma([255]));
    Mask::from_image(&element, center_x as u8, center_y as u8)
}

/// Splits the reach `-before..=after` into masks no longer than `MAX_REACH` per side.
///
/// Every piece contains the origin, so chaining them is exact up to the image border.
/// Only very wide dilations on large pages need more than one piece.
fn line_masks(axis: Axis, before: u32, after: u32) -> Vec<Mask> {
    let pieces = before.max(after).div_ceil(MAX_REACH);
    (0..pieces)
        .map(|i| {
            let take = |reach: u32| reach.saturating_sub(i * MAX_REACH).min(MAX_REACH);
            line_mask(axis, take(before), take(after))
        })
        .collect()
}

/// Separable rectangular filter: rows with `kernel_w`, then columns with `kernel_h`.
fn filter_rect(image: &GrayImage, kernel_w: u32, kernel_h: u32, operation: Operation) -> GrayImage {
    if image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    let (left, right) = reach(kernel_w, operation);
    let (up, down) = reach(kernel_h, operation);
    line_masks(Axis::Horizontal, left, right)
        .iter()
        .chain(&line_masks(Axis::Vertical, up, down))
        .fold(image.clone(), |filtered, mask| operation.apply(&filtered, mask))
}

/// Grayscale erosion (local minimum) with a `kernel_w` x `kernel_h` rectangle.
pub fn erode_rect(image: &GrayImage, kernel_w: u32, kernel_h: u32) -> GrayImage {
    filter_rect(image, kernel_w, kernel_h, Operation::Erode)
}

/// Grayscale dilation (local maximum) with a `kernel_w` x `kernel_h` rectangle.
pub fn dilate_rect(image: &GrayImage, kernel_w: u32, kernel_h: u32) -> GrayImage {
    filter_rect(image, kernel_w, kernel_h, Operation::Dilate)
}

/// Opening: erosion followed by dilation. Keeps only structures that contain the element.
pub fn open_rect(image: &GrayImage, kernel_w: u32, kernel_h: u32) -> GrayImage {
    dilate_rect(&erode_rect(image, kernel_w, kernel_h), kernel_w, kernel_h)
}

/// Closing: dilation followed by erosion. Fills gaps narrower than the element.
pub fn close_rect(image: &GrayImage, kernel_w: u32, kernel_h: u32) -> GrayImage {
    erode_rect(&dilate_rect(image, kernel_w, kernel_h), kernel_w, kernel_h)
}

/// Saturating per-pixel `a - b`.
pub fn subtract(a: &GrayImage, b: &GrayImage) -> GrayImage {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let data = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(&x, &y)| x.saturating_sub(y))
        .collect();
    GrayImage::from_raw(a.width(), a.height(), data).unwrap_or_else(|| a.clone())
}

/// Per-pixel inversion (`255 - v`).
pub fn invert(image: &GrayImage) -> GrayImage {
    let mut output = image.clone();
    image::imageops::invert(&mut output);
    output
}

/// Sets a frame of `band` pixels along all four edges to zero.
pub fn blank_border(image: &mut GrayImage, band: u32) {
    let (width, height) = image.dimensions();
    if band == 0 {
        return;
    }
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        if x < band || y < band || x + band >= width || y + band >= height {
            pixel.0[0] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn from_rows(rows: &[&[u8]]) -> GrayImage {
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        GrayImage::from_raw(width, height, rows.concat()).expect("valid dimensions")
    }

    /// Window extreme of every pixel, computed pixel by pixel.
    fn naive_rect(image: &GrayImage, kernel_w: u32, kernel_h: u32, operation: Operation) -> GrayImage {
        let (left, right) = reach(kernel_w, operation);
        let (up, down) = reach(kernel_h, operation);
        let (width, height) = image.dimensions();
        GrayImage::from_fn(width, height, |x, y| {
            let xs = x.saturating_sub(left)..=(x + right).min(width - 1);
            let ys = y.saturating_sub(up)..=(y + down).min(height - 1);
            let window = ys.flat_map(|wy| xs.clone().map(move |wx| image.get_pixel(wx, wy)[0]));
            let value = match operation {
                Operation::Erode => window.min(),
                Operation::Dilate => window.max(),
            };
            Luma([value.unwrap_or(0)])
        })
    }

    #[test]
    fn test_rect_filters_match_naive_window() {
        let image = GrayImage::from_fn(23, 17, |x, y| Luma([((x * 37 + y * 91) % 251) as u8]));
        for (kw, kh) in [(1, 1), (2, 2), (3, 1), (1, 4), (5, 3), (40, 1)] {
            assert_eq!(
                erode_rect(&image, kw, kh),
                naive_rect(&image, kw, kh, Operation::Erode),
                "erode {kw}x{kh}"
            );
            assert_eq!(
                dilate_rect(&image, kw, kh),
                naive_rect(&image, kw, kh, Operation::Dilate),
                "dilate {kw}x{kh}"
            );
        }
    }

    #[test]
    fn test_reach_reflects_for_dilation() {
        assert_eq!(reach(40, Operation::Erode), (20, 19));
        assert_eq!(reach(40, Operation::Dilate), (19, 20));
        assert_eq!(reach(25, Operation::Erode), (12, 12));
        assert_eq!(reach(1, Operation::Dilate), (0, 0));
    }

    #[test]
    fn test_wide_dilation_is_split_into_masks() {
        assert!(line_masks(Axis::Horizontal, 0, 0).is_empty());
        assert_eq!(line_masks(Axis::Horizontal, 255, 255).len(), 1);
        assert_eq!(line_masks(Axis::Horizontal, 400, 399).len(), 2);

        // A single lit pixel spreads over the whole 801px element.
        let mut row = GrayImage::new(1200, 1);
        row.put_pixel(600, 0, Luma([255]));
        let dilated = dilate_rect(&row, 801, 1);
        assert_eq!(dilated, naive_rect(&row, 801, 1, Operation::Dilate));
        assert_eq!(dilated.get_pixel(200, 0)[0], 255);
        assert_eq!(dilated.get_pixel(1000, 0)[0], 255);
        assert_eq!(dilated.get_pixel(199, 0)[0], 0);
        assert_eq!(dilated.get_pixel(1001, 0)[0], 0);
    }

    #[test]
    fn test_opening_never_grows_shapes() {
        let image = GrayImage::from_fn(64, 48, |x, y| Luma([if (x * 3 + y * 5) % 7 < 3 { 255 } else { 0 }]));
        for (kw, kh) in [(2, 2), (40, 1), (1, 40), (3, 2)] {
            let opened = open_rect(&image, kw, kh);
            assert!(
                opened
                    .pixels()
                    .zip(image.pixels())
                    .all(|(o, i)| o[0] <= i[0]),
                "opening {kw}x{kh} added pixels"
            );
        }
    }

    #[test]
    fn test_horizontal_opening_keeps_only_long_runs() {
        let mut mask = GrayImage::new(100, 10);
        // A 60px horizontal rule and a 10px stroke.
        for x in 10..70 {
            mask.put_pixel(x, 3, Luma([255]));
        }
        for x in 80..90 {
            mask.put_pixel(x, 7, Luma([255]));
        }
        let opened = open_rect(&mask, 40, 1);
        for x in 10..70 {
            assert_eq!(opened.get_pixel(x, 3)[0], 255, "rule pixel {x} lost");
        }
        for x in 80..90 {
            assert_eq!(opened.get_pixel(x, 7)[0], 0, "stroke pixel {x} kept");
        }
    }

    #[test]
    fn test_vertical_opening_keeps_only_long_runs() {
        let mut mask = GrayImage::new(10, 100);
        for y in 5..95 {
            mask.put_pixel(2, y, Luma([255]));
        }
        for y in 10..20 {
            mask.put_pixel(7, y, Luma([255]));
        }
        let opened = open_rect(&mask, 1, 40);
        assert_eq!(opened.get_pixel(2, 50)[0], 255);
        assert_eq!(opened.get_pixel(7, 15)[0], 0);
    }

    #[test]
    fn test_square_opening_removes_isolated_pixels() {
        let mut mask = GrayImage::new(20, 20);
        mask.put_pixel(3, 3, Luma([255]));
        for y in 10..14 {
            for x in 10..14 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let opened = open_rect(&mask, 2, 2);
        assert_eq!(opened.get_pixel(3, 3)[0], 0);
        assert_eq!(opened.get_pixel(11, 11)[0], 255);
        assert_eq!(opened.get_pixel(10, 10)[0], 255);
        assert_eq!(opened.get_pixel(13, 13)[0], 255);
    }

    #[test]
    fn test_closing_fills_narrow_dark_strokes() {
        // Light paper with a 3px dark stroke: a 25px closing estimates plain paper.
        let mut page = GrayImage::from_pixel(60, 60, Luma([200]));
        for y in 0..60 {
            for x in 30..33 {
                page.put_pixel(x, y, Luma([20]));
            }
        }
        let background = close_rect(&page, 25, 25);
        assert!(background.pixels().all(|p| p[0] == 200));
    }

    #[test]
    fn test_subtract_saturates() {
        let a = from_rows(&[&[255, 10, 0]]);
        let b = from_rows(&[&[255, 20, 0]]);
        assert_eq!(subtract(&a, &b).as_raw(), &vec![0, 0, 0]);
    }

    #[test]
    fn test_blank_border() {
        let mut mask = GrayImage::from_pixel(10, 8, Luma([255]));
        blank_border(&mut mask, 2);
        assert_eq!(mask.get_pixel(1, 4)[0], 0);
        assert_eq!(mask.get_pixel(8, 4)[0], 0);
        assert_eq!(mask.get_pixel(4, 6)[0], 0);
        assert_eq!(mask.get_pixel(2, 2)[0], 255);
        assert_eq!(mask.get_pixel(7, 5)[0], 255);
    }

    #[test]
    fn test_invert() {
        let mask = from_rows(&[&[0, 255, 100]]);
        assert_eq!(invert(&mask).as_raw(), &vec![255, 0, 155]);
    }
}
