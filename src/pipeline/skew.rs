//! Skew Corrector
//!
//! Fits the minimum area rectangle around all ink of the mask and reads the page tilt
//! from it. Only small tilts are corrected: angles at or below `min_degrees` are noise,
//! and angles at or above `max_degrees` are left to the orientation stage or treated
//! as uncorrectable.
//!
//! Angles are degrees with positive meaning clockwise (lines descending to the right).
//! A measured tilt `m` is corrected by rotating both images by `-m` about their center.

use image::GrayImage;
use tracing::debug;

use crate::processors::PointSet;
use crate::utils::{rotate_gray_about_center, rotate_mask_about_center};

/// Mask and companion page after skew correction.
#[derive(Debug, Clone)]
pub struct Deskewed {
    pub mask: GrayImage,
    pub page: GrayImage,
    /// Tilt read from the mask, `None` for a mask without ink.
    pub measured: Option<f32>,
    /// Rotation applied to both images, `None` when they were left untouched.
    pub applied: Option<f32>,
}

#[derive(Debug, Clone, Copy)]
pub struct SkewCorrector {
    min_degrees: f32,
    max_degrees: f32,
}

impl SkewCorrector {
    pub fn new(min_degrees: f32, max_degrees: f32) -> Self {
        Self {
            min_degrees,
            max_degrees,
        }
    }

    /// Tilt of the ink in `mask`, in degrees within [-45, 45).
    pub fn measure(&self, mask: &GrayImage) -> Option<f32> {
        PointSet::hull_candidates(mask)
            .min_area_rect()
            .map(|rect| rect.tilt())
    }

    /// Rotation that corrects a measured tilt, if the tilt is in the correctable range.
    pub fn rotation_for(&self, measured: f32) -> Option<f32> {
        let magnitude = measured.abs();
        (magnitude > self.min_degrees && magnitude < self.max_degrees).then_some(-measured)
    }

    pub fn correct(&self, mask: GrayImage, page: GrayImage) -> Deskewed {
        let measured = self.measure(&mask);
        let applied = measured.and_then(|m| self.rotation_for(m));
        debug!(?measured, ?applied, "skew decision");

        match applied {
            Some(degrees) => Deskewed {
                mask: rotate_mask_about_center(&mask, degrees),
                page: rotate_gray_about_center(&page, degrees),
                measured,
                applied,
            },
            None => Deskewed {
                mask,
                page,
                measured,
                applied,
            },
        }
    }
}

impl Default for SkewCorrector {
    fn default() -> Self {
        Self::new(0.5, 10.0)
    }
}
