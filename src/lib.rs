//! # OAR-HTR
//!
//! Handwritten document processing: page normalization, line segmentation and
//! line-by-line recognition driven by a background job coordinator.
//!
//! ## Layout
//!
//! - [`pipeline`] turns a scanned page (raster image or first PDF page) into ordered
//!   line crops: background flattening and binarization, removal of borders, ruling
//!   lines and speckles, quarter-turn orientation, deskew and line band detection.
//! - [`recognizer`] reads one line crop at a time through a [`recognizer::LineRecognizer`].
//! - [`store`] persists documents, results, line segments and corrections.
//! - [`worker`] claims uploaded documents and drives them to `ocr_completed` or `error`.
//! - [`evaluation`] scores recognized text against human corrections.
//!
//! ## Example
//!
//! ```no_run
//! use oar_htr::pipeline::DocumentPipeline;
//! use oar_htr::domain::DocumentKind;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = DocumentPipeline::default();
//! let analysis = pipeline.run_path(Path::new("registo.png"), DocumentKind::Raster)?;
//! for line in &analysis.lines {
//!     println!("line {} rows {}..{}", line.index, line.band.top, line.band.bottom);
//! }
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod core;
pub mod domain;
pub mod evaluation;
pub mod pipeline;
pub mod processors;
pub mod recognizer;
pub mod store;
pub mod utils;
pub mod worker;
