//! Utility functions shared by the pipeline stages and the binary.
//!
//! This module provides image rotation helpers, gray image conversion, and logging setup.

pub mod transform;

pub use transform::{rotate_gray_about_center, rotate_mask_about_center};

use image::{DynamicImage, GrayImage, RgbImage};

/// Initializes the tracing subscriber for logging.
///
/// The filter is read from `RUST_LOG`; without it, `info` and above are shown.
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Converts an RGB page to 8-bit luminance.
pub fn rgb_to_gray(image: &RgbImage) -> GrayImage {
    DynamicImage::ImageRgb8(image.clone()).into_luma8()
}
