//! Rotation of page images about their center.
//!
//! Masks go through `imageproc` with nearest-neighbor sampling and zero fill. The gray
//! page is warped here instead: `imageproc` fills uncovered pixels with a constant, while
//! the page must replicate its border so no dark wedge appears in the corners.
//! The output keeps the input dimensions and the center is `(width / 2, height / 2)`.
//!
//! Angles are in degrees, positive meaning clockwise on screen (image y axis down).

use image::{GrayImage, Luma};
use imageproc::geometric_transformations::{Interpolation, rotate};
use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;

/// Builds the forward rotation of `degrees` clockwise about `(cx, cy)`.
fn rotation_about(cx: f32, cy: f32, degrees: f32) -> Matrix3<f32> {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let to_origin = Matrix3::new(1.0, 0.0, -cx, 0.0, 1.0, -cy, 0.0, 0.0, 1.0);
    let rotate = Matrix3::new(cos, -sin, 0.0, sin, cos, 0.0, 0.0, 0.0, 1.0);
    let back = Matrix3::new(1.0, 0.0, cx, 0.0, 1.0, cy, 0.0, 0.0, 1.0);
    back * rotate * to_origin
}

fn center_of(image: &GrayImage) -> (f32, f32) {
    ((image.width() / 2) as f32, (image.height() / 2) as f32)
}

/// Maps every destination pixel back into the source and samples it bicubically.
pub fn rotate_gray_about_center(image: &GrayImage, degrees: f32) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut dst = GrayImage::new(width, height);
    if width == 0 || height == 0 {
        return dst;
    }

    let (center_x, center_y) = center_of(image);
    // Inverse of a rotation is the rotation by the opposite angle.
    let inverse = rotation_about(center_x, center_y, -degrees);

    let buffer: &mut [u8] = dst.as_mut();
    buffer
        .par_chunks_mut(width as usize)
        .enumerate()
        .for_each(|(dst_y, row)| {
            for (dst_x, value) in row.iter_mut().enumerate() {
                let src_point = inverse * Vector3::new(dst_x as f32, dst_y as f32, 1.0);
                *value = bicubic_interpolate(image, src_point.x, src_point.y);
            }
        });

    dst
}

/// Rotates a binary mask with nearest-neighbor sampling, filling uncovered pixels with 0.
pub fn rotate_mask_about_center(mask: &GrayImage, degrees: f32) -> GrayImage {
    if mask.width() == 0 || mask.height() == 0 {
        return mask.clone();
    }
    rotate(
        mask,
        center_of(mask),
        degrees.to_radians(),
        Interpolation::Nearest,
        Luma([0]),
    )
}

/// Cubic convolution weight of a sample at distance `t` (Keys, a = -0.5).
#[inline]
fn cubic_weight(t: f32) -> f32 {
    const A: f32 = -0.5;
    let t = t.abs();
    match t {
        t if t <= 1.0 => ((A + 2.0) * t - (A + 3.0)) * t * t + 1.0,
        t if t < 2.0 => ((A * t - 5.0 * A) * t + 8.0 * A) * t - 4.0 * A,
        _ => 0.0,
    }
}

/// Weights of the four taps around a sample at fractional offset `frac`.
#[inline]
fn taps(frac: f32) -> [f32; 4] {
    std::array::from_fn(|k| cubic_weight(frac + 1.0 - k as f32))
}

/// Samples the 4x4 neighborhood of `(x, y)`, clamping coordinates to the image.
fn bicubic_interpolate(image: &GrayImage, x: f32, y: f32) -> u8 {
    let (x0, y0) = (x.floor(), y.floor());
    let (wx, wy) = (taps(x - x0), taps(y - y0));
    let max_x = image.width() as i64 - 1;
    let max_y = image.height() as i64 - 1;

    let value: f32 = wy
        .iter()
        .enumerate()
        .map(|(j, weight_y)| {
            let row = (y0 as i64 - 1 + j as i64).clamp(0, max_y) as u32;
            let along_row: f32 = wx
                .iter()
                .enumerate()
                .map(|(i, weight_x)| {
                    let col = (x0 as i64 - 1 + i as i64).clamp(0, max_x) as u32;
                    let Luma([v]) = *image.get_pixel(col, row);
                    weight_x * v as f32
                })
                .sum();
            weight_y * along_row
        })
        .sum();

    value.round().clamp(0.0, 255.0) as u8
}
