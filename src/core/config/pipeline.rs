//! Tunables of the normalization and segmentation pipeline.

use serde::{Deserialize, Serialize};

use crate::core::errors::ConfigError;

/// Every constant the pipeline stages depend on.
///
/// The defaults are the values the stages were tuned with on scanned handwritten
/// registers; a JSON file may override any subset of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Magnification used when rendering the first page of a PDF.
    pub pdf_scale: f32,
    /// Side of the square closing element used to estimate the paper background.
    pub background_kernel: u32,
    /// Width of the frame blanked around the mask.
    pub border_width: u32,
    /// Length of the line elements used to detect table rules and guide lines.
    pub rule_length: u32,
    /// Side of the square opening element used to drop speckle.
    pub speckle_kernel: u32,
    /// The 90° projection variance must exceed the 0° one by this factor to rotate.
    pub orientation_margin: f64,
    /// Skew angles at or below this magnitude (degrees) are left alone.
    pub min_skew_degrees: f32,
    /// Skew angles at or above this magnitude (degrees) are left alone.
    pub max_skew_degrees: f32,
    /// Lower bound of the horizontal dilation width used before projecting.
    pub dilation_min_width: u32,
    /// Horizontal dilation width as a fraction of the page width.
    pub dilation_width_ratio: f32,
    /// Band threshold as a fraction of the mean positive projection value.
    pub threshold_ratio: f64,
    /// Rows added above and below each detected band.
    pub band_margin: u32,
    /// A band must be strictly taller than this.
    pub min_line_height: u32,
    /// A band must be strictly wider than this.
    pub min_line_width: u32,
    /// A band must hold strictly more foreground pixels than this.
    pub min_line_ink: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pdf_scale: 2.0,
            background_kernel: 25,
            border_width: 30,
            rule_length: 40,
            speckle_kernel: 2,
            orientation_margin: 1.3,
            min_skew_degrees: 0.5,
            max_skew_degrees: 10.0,
            dilation_min_width: 25,
            dilation_width_ratio: 0.03,
            threshold_ratio: 0.2,
            band_margin: 5,
            min_line_height: 20,
            min_line_width: 50,
            min_line_ink: 100,
        }
    }
}

impl PipelineConfig {
    /// Checks that every value is inside its domain.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.pdf_scale.is_finite() && self.pdf_scale > 0.0) {
            return Err(ConfigError::invalid_field(
                "pdf_scale",
                "a positive factor",
                self.pdf_scale,
            ));
        }
        for (field, value) in [
            ("background_kernel", self.background_kernel),
            ("rule_length", self.rule_length),
            ("speckle_kernel", self.speckle_kernel),
            ("dilation_min_width", self.dilation_min_width),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid_field(field, "a positive size", value));
            }
        }
        if !(self.orientation_margin.is_finite() && self.orientation_margin >= 1.0) {
            return Err(ConfigError::invalid_field(
                "orientation_margin",
                "a factor >= 1.0",
                self.orientation_margin,
            ));
        }
        if !(self.min_skew_degrees >= 0.0 && self.min_skew_degrees < self.max_skew_degrees) {
            return Err(ConfigError::invalid_field(
                "min_skew_degrees",
                format!("a value in [0, {})", self.max_skew_degrees),
                self.min_skew_degrees,
            ));
        }
        if self.max_skew_degrees > 45.0 {
            return Err(ConfigError::invalid_field(
                "max_skew_degrees",
                "at most 45 degrees",
                self.max_skew_degrees,
            ));
        }
        if !(self.dilation_width_ratio >= 0.0 && self.dilation_width_ratio < 1.0) {
            return Err(ConfigError::invalid_field(
                "dilation_width_ratio",
                "a ratio in [0, 1)",
                self.dilation_width_ratio,
            ));
        }
        if !(self.threshold_ratio > 0.0 && self.threshold_ratio <= 1.0) {
            return Err(ConfigError::invalid_field(
                "threshold_ratio",
                "a ratio in (0, 1]",
                self.threshold_ratio,
            ));
        }
        Ok(())
    }

    /// Horizontal dilation width for a page `width` pixels wide.
    pub fn dilation_width(&self, width: u32) -> u32 {
        let proportional = (width as f32 * self.dilation_width_ratio) as u32;
        self.dilation_min_width.max(proportional)
    }
}
