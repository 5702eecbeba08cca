//! Orientation Corrector
//!
//! Lines of text laid out horizontally give a strongly peaked row projection: rows
//! crossing a line are full of ink and rows between lines are nearly empty. A page lying
//! on its side gives a flat row projection and a peaked column projection instead.
//!
//! The corrector compares the variance of the row projection at 0° with the one after a
//! quarter turn clockwise and turns the page only when the latter wins by a margin.

use image::GrayImage;
use image::imageops::rotate90;
use tracing::debug;

use crate::processors::{row_projection, variance};

/// Mask and companion page after the orientation decision.
#[derive(Debug, Clone)]
pub struct Oriented {
    pub mask: GrayImage,
    pub page: GrayImage,
    /// Whether both images were turned 90° clockwise.
    pub rotated: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct OrientationCorrector {
    margin: f64,
}

impl OrientationCorrector {
    pub fn new(margin: f64) -> Self {
        Self { margin }
    }

    /// Returns `(variance at 0°, variance at 90°)` of the row projection of `mask`.
    pub fn variances(&self, mask: &GrayImage) -> (f64, f64) {
        let upright = variance(&row_projection(mask));
        let turned = variance(&row_projection(&rotate90(mask)));
        (upright, turned)
    }

    /// Turns `mask` and `page` a quarter clockwise when the page lies on its side.
    pub fn correct(&self, mask: GrayImage, page: GrayImage) -> Oriented {
        let (upright, turned) = self.variances(&mask);
        let rotate = turned > upright * self.margin;

        debug!(
            variance_0 = upright,
            variance_90 = turned,
            rotate,
            "orientation decision"
        );

        if rotate {
            Oriented {
                mask: rotate90(&mask),
                page: rotate90(&page),
                rotated: true,
            }
        } else {
            Oriented {
                mask,
                page,
                rotated: false,
            }
        }
    }
}

impl Default for OrientationCorrector {
    fn default() -> Self {
        Self::new(1.3)
    }
}
