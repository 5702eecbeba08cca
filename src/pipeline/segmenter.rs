//! Line Segmenter
//!
//! Slices a clean, upright mask into full-width line bands:
//!
//! 1. the mask is dilated horizontally so words of one line fuse into a solid stripe,
//! 2. the row projection of the dilated mask is thresholded at a fraction of the mean
//!    of its positive values, which adapts to sparse and dense pages alike,
//! 3. each run of rows above the threshold, widened by a margin on both sides, becomes
//!    a candidate band,
//! 4. candidates that are too short, too narrow or hold too little ink are dropped,
//! 5. accepted bands are cut from the undilated mask and inverted to dark ink on white.

use image::GrayImage;
use image::imageops::crop_imm;
use serde::Serialize;
use tracing::debug;

use crate::core::config::PipelineConfig;
use crate::processors::{count_foreground, dilate_rect, invert, positive_mean, row_projection};

/// One accepted line, in page order.
#[derive(Debug, Clone)]
pub struct LineCrop {
    /// Position among the accepted lines, from 0, top to bottom.
    pub index: usize,
    pub band: Band,
    /// Foreground pixels of the band in the mask.
    pub ink: u64,
    /// Dark ink on a white background.
    pub image: GrayImage,
}

/// Half-open row range `[top, bottom)` of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Band {
    pub top: u32,
    pub bottom: u32,
}

impl Band {
    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

#[derive(Debug, Clone)]
pub struct LineSegmenter {
    config: PipelineConfig,
}

impl LineSegmenter {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Band threshold for a row projection.
    pub fn threshold(&self, projection: &[u64]) -> f64 {
        positive_mean(projection)
            .map(|mean| mean * self.config.threshold_ratio)
            .unwrap_or(1.0)
    }

    /// Candidate bands of a projection, before the quality filter.
    ///
    /// A band opens `band_margin` rows before the first row above `threshold` and closes
    /// `band_margin` rows after the first row back at or below it, clamped to the page.
    /// A band still open at the bottom of the page runs to the last row.
    pub fn bands(&self, projection: &[u64], threshold: f64) -> Vec<Band> {
        let height = projection.len() as u32;
        let margin = self.config.band_margin;
        let mut bands = Vec::new();
        let mut start: Option<u32> = None;

        for (row, &value) in projection.iter().enumerate() {
            let row = row as u32;
            let above = value as f64 > threshold;
            match start {
                None if above => start = Some(row.saturating_sub(margin)),
                Some(top) if !above => {
                    bands.push(Band {
                        top,
                        bottom: (row + margin).min(height),
                    });
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(top) = start {
            bands.push(Band {
                top,
                bottom: height,
            });
        }
        bands
    }

    /// Whether a band of `mask` is a plausible line of handwriting.
    fn accepts(&self, band: Band, width: u32, ink: u64) -> bool {
        band.height() > self.config.min_line_height
            && width > self.config.min_line_width
            && ink > self.config.min_line_ink
    }

    /// Cuts `mask` (ink = non-zero) into line crops ordered top to bottom.
    ///
    /// A mask without accepted bands yields an empty vector.
    pub fn segment(&self, mask: &GrayImage) -> Vec<LineCrop> {
        let (width, height) = mask.dimensions();
        if width == 0 || height == 0 {
            return Vec::new();
        }

        let dilated = dilate_rect(mask, self.config.dilation_width(width), 1);
        let projection = row_projection(&dilated);
        let threshold = self.threshold(&projection);
        let candidates = self.bands(&projection, threshold);

        let mut lines = Vec::with_capacity(candidates.len());
        for band in candidates.iter().copied() {
            let region = crop_imm(mask, 0, band.top, width, band.height()).to_image();
            let ink = count_foreground(&region);
            if !self.accepts(band, width, ink) {
                debug!(top = band.top, bottom = band.bottom, ink, "rejected band");
                continue;
            }
            lines.push(LineCrop {
                index: lines.len(),
                band,
                ink,
                image: invert(&region),
            });
        }

        debug!(
            threshold,
            candidates = candidates.len(),
            lines = lines.len(),
            "segmented lines"
        );
        lines
    }
}

impl Default for LineSegmenter {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}
