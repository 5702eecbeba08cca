//! Helpers shared by the integration tests.

#![allow(dead_code)]

pub mod synthetic_page;

pub use synthetic_page::{fill_mask, mask_with_bands, page_with_lines, png_bytes};
