//! Structural Cleaner
//!
//! Removes everything from the ink mask that is not handwriting: the scan-bed frame,
//! long horizontal and vertical rules, and isolated speckle. Every step works on a copy.

use image::GrayImage;
use tracing::debug;

use crate::core::config::PipelineConfig;
use crate::processors::{blank_border, count_foreground, open_rect, subtract};

/// Strips borders, table rules and speckle from a binary mask.
#[derive(Debug, Clone, Copy)]
pub struct StructuralCleaner {
    border_width: u32,
    rule_length: u32,
    speckle_kernel: u32,
}

impl StructuralCleaner {
    pub fn new(border_width: u32, rule_length: u32, speckle_kernel: u32) -> Self {
        Self {
            border_width,
            rule_length,
            speckle_kernel,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.border_width,
            config.rule_length,
            config.speckle_kernel,
        )
    }

    pub fn clean(&self, mask: &GrayImage) -> GrayImage {
        let mut framed = mask.clone();
        blank_border(&mut framed, self.border_width);

        // Rules are detected on the framed mask and both are subtracted from it.
        let horizontal = open_rect(&framed, self.rule_length, 1);
        let vertical = open_rect(&framed, 1, self.rule_length);
        let without_rules = subtract(&subtract(&framed, &horizontal), &vertical);

        let cleaned = open_rect(&without_rules, self.speckle_kernel, self.speckle_kernel);
        debug!(
            ink_before = count_foreground(mask),
            ink_after = count_foreground(&cleaned),
            "cleaned structural noise"
        );
        cleaned
    }
}

impl Default for StructuralCleaner {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}
