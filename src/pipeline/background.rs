//! Background Normalizer
//!
//! Flattens paper texture and uneven illumination before binarization:
//!
//! 1. the page is converted to luminance,
//! 2. a large square closing erases the (dark) ink and leaves an estimate of the paper,
//! 3. the page is divided by that estimate and rescaled to 0..=255, so paper becomes white
//!    and ink stays dark,
//! 4. an Otsu threshold with inverted polarity marks ink as 255 and paper as 0.

use image::{GrayImage, RgbImage};
use imageproc::contrast::otsu_level;
use tracing::debug;

use crate::core::errors::{PipelineError, PipelineStage};
use crate::processors::close_rect;
use crate::utils::rgb_to_gray;

/// Result of background normalization.
#[derive(Debug, Clone)]
pub struct NormalizedPage {
    /// Binary mask, ink = 255.
    pub mask: GrayImage,
    /// Illumination-flattened gray page, kept for re-sampling by later stages.
    pub normalized: GrayImage,
}

/// Estimates and divides out the paper background, then binarizes.
#[derive(Debug, Clone, Copy)]
pub struct BackgroundNormalizer {
    kernel: u32,
}

impl BackgroundNormalizer {
    pub fn new(kernel: u32) -> Self {
        Self { kernel }
    }

    pub fn normalize(&self, page: &RgbImage) -> Result<NormalizedPage, PipelineError> {
        self.normalize_gray(&rgb_to_gray(page))
    }

    pub fn normalize_gray(&self, gray: &GrayImage) -> Result<NormalizedPage, PipelineError> {
        if gray.width() == 0 || gray.height() == 0 {
            return Err(PipelineError::processing(
                PipelineStage::BackgroundNormalization,
                "page has no pixels",
            ));
        }

        let background = close_rect(gray, self.kernel, self.kernel);
        let normalized = divide_scaled(gray, &background);
        let level = otsu_level(&normalized);
        let mask = threshold_inverse(&normalized, level);

        debug!(otsu_level = level, "normalized page background");
        Ok(NormalizedPage { mask, normalized })
    }
}

impl Default for BackgroundNormalizer {
    fn default() -> Self {
        Self::new(25)
    }
}

/// Per-pixel `round(src * 255 / background)`, saturated; 0 where the background is 0.
fn divide_scaled(src: &GrayImage, background: &GrayImage) -> GrayImage {
    let mut out = src.clone();
    for (value, &bg) in out.iter_mut().zip(background.as_raw()) {
        *value = if bg == 0 {
            0
        } else {
            ((*value as f32 * 255.0 / bg as f32).round()).min(255.0) as u8
        };
    }
    out
}

/// 255 where `value <= level`, 0 elsewhere.
fn threshold_inverse(image: &GrayImage, level: u8) -> GrayImage {
    let mut out = image.clone();
    for value in out.iter_mut() {
        *value = if *value > level { 0 } else { 255 };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_divide_scaled_whitens_background() {
        let src = GrayImage::from_pixel(3, 1, Luma([180]));
        let background = GrayImage::from_pixel(3, 1, Luma([180]));
        assert!(divide_scaled(&src, &background).pixels().all(|p| p.0[0] == 255));

        let dark = GrayImage::from_pixel(1, 1, Luma([90]));
        let paper = GrayImage::from_pixel(1, 1, Luma([180]));
        assert_eq!(divide_scaled(&dark, &paper).get_pixel(0, 0).0[0], 128);
    }

    #[test]
    fn test_divide_by_zero_background_is_zero() {
        let src = GrayImage::from_pixel(2, 2, Luma([0]));
        let background = GrayImage::from_pixel(2, 2, Luma([0]));
        assert!(divide_scaled(&src, &background).pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn test_uniform_paper_has_no_ink() {
        let page = RgbImage::from_pixel(120, 80, image::Rgb([230, 220, 190]));
        let result = BackgroundNormalizer::default()
            .normalize(&page)
            .expect("should normalize");
        assert!(result.normalized.pixels().all(|p| p.0[0] == 255));
        assert!(result.mask.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn test_ink_on_gradient_paper_becomes_foreground() {
        // Paper brightening left to right, with a dark stroke across it.
        let gray = GrayImage::from_fn(200, 100, |x, y| {
            if (45..52).contains(&y) && (20..180).contains(&x) {
                Luma([40])
            } else {
                Luma([150 + (x / 4) as u8])
            }
        });
        let result = BackgroundNormalizer::default()
            .normalize_gray(&gray)
            .expect("should normalize");
        assert_eq!(result.mask.get_pixel(100, 48).0[0], 255);
        assert_eq!(result.mask.get_pixel(10, 10).0[0], 0);
        assert_eq!(result.mask.get_pixel(190, 90).0[0], 0);
    }

    #[test]
    fn test_empty_page_is_rejected() {
        let err = BackgroundNormalizer::default()
            .normalize_gray(&GrayImage::new(0, 0))
            .expect_err("should reject");
        assert!(matches!(
            err,
            PipelineError::Processing {
                stage: PipelineStage::BackgroundNormalization,
                ..
            }
        ));
    }
}
