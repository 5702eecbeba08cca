//! Page normalization and line segmentation.
//!
//! A page flows through the stages in a fixed order:
//!
//! 1. [`loader`]: source file to RGB page
//! 2. [`background`]: illumination flattening and inverse Otsu binarization
//! 3. [`cleaner`]: border, rule and speckle removal
//! 4. [`orientation`]: quarter-turn correction of sideways pages
//! 5. [`skew`]: small-angle deskew
//! 6. [`segmenter`]: line bands, filtered and inverted
//!
//! [`DocumentPipeline`] chains them; each stage is also usable on its own.

pub mod background;
pub mod cleaner;
pub mod loader;
pub mod orientation;
pub mod segmenter;
pub mod skew;

pub use background::{BackgroundNormalizer, NormalizedPage};
pub use cleaner::StructuralCleaner;
pub use loader::ImageLoader;
pub use orientation::{OrientationCorrector, Oriented};
pub use segmenter::{Band, LineCrop, LineSegmenter};
pub use skew::{Deskewed, SkewCorrector};

use image::RgbImage;
use std::path::Path;
use tracing::debug;

use crate::core::config::PipelineConfig;
use crate::core::errors::PipelineError;
use crate::domain::DocumentKind;

/// Output of one pipeline run.
#[derive(Debug, Clone)]
pub struct PageAnalysis {
    /// Accepted lines, top to bottom.
    pub lines: Vec<LineCrop>,
    /// Whether the page was turned a quarter clockwise.
    pub rotated: bool,
    /// Tilt read from the mask after orientation.
    pub measured_skew: Option<f32>,
    /// Deskew rotation applied, if any.
    pub applied_skew: Option<f32>,
}

/// Turns the bytes of a source file into line crops.
///
/// [`DocumentPipeline`] is the production implementation; the coordinator only sees
/// this trait.
pub trait LineExtractor: Send + Sync {
    fn extract(
        &self,
        label: &str,
        bytes: &[u8],
        kind: DocumentKind,
    ) -> Result<Vec<LineCrop>, PipelineError>;
}

/// All stages from source file to line crops.
#[derive(Debug, Clone)]
pub struct DocumentPipeline {
    loader: ImageLoader,
    normalizer: BackgroundNormalizer,
    cleaner: StructuralCleaner,
    orientation: OrientationCorrector,
    skew: SkewCorrector,
    segmenter: LineSegmenter,
}

impl DocumentPipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            loader: ImageLoader::new(config.pdf_scale),
            normalizer: BackgroundNormalizer::new(config.background_kernel),
            cleaner: StructuralCleaner::from_config(config),
            orientation: OrientationCorrector::new(config.orientation_margin),
            skew: SkewCorrector::new(config.min_skew_degrees, config.max_skew_degrees),
            segmenter: LineSegmenter::new(config.clone()),
        }
    }

    pub fn run_path(&self, path: &Path, kind: DocumentKind) -> Result<PageAnalysis, PipelineError> {
        let page = self.loader.load_path(path, kind)?;
        self.analyze(&page)
    }

    pub fn run_bytes(
        &self,
        label: &str,
        bytes: &[u8],
        kind: DocumentKind,
    ) -> Result<PageAnalysis, PipelineError> {
        let page = self.loader.load_bytes(label, bytes, kind)?;
        self.analyze(&page)
    }

    /// Runs stages 2 to 6 on a decoded page.
    pub fn analyze(&self, page: &RgbImage) -> Result<PageAnalysis, PipelineError> {
        let NormalizedPage { mask, normalized } = self.normalizer.normalize(page)?;
        let cleaned = self.cleaner.clean(&mask);
        let oriented = self.orientation.correct(cleaned, normalized);
        let deskewed = self.skew.correct(oriented.mask, oriented.page);
        let lines = self.segmenter.segment(&deskewed.mask);

        debug!(
            width = page.width(),
            height = page.height(),
            rotated = oriented.rotated,
            lines = lines.len(),
            "page analyzed"
        );

        Ok(PageAnalysis {
            lines,
            rotated: oriented.rotated,
            measured_skew: deskewed.measured,
            applied_skew: deskewed.applied,
        })
    }
}

impl LineExtractor for DocumentPipeline {
    fn extract(
        &self,
        label: &str,
        bytes: &[u8],
        kind: DocumentKind,
    ) -> Result<Vec<LineCrop>, PipelineError> {
        self.run_bytes(label, bytes, kind).map(|analysis| analysis.lines)
    }
}

impl Default for DocumentPipeline {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}
