//! Image Loader
//!
//! Turns a source file into an RGB page. Raster formats are decoded with the `image`
//! crate; paginated documents (PDF) have only their first page rendered, magnified by
//! `PipelineConfig::pdf_scale` so thin strokes survive binarization.
//!
//! The PDFium library is bound only when a PDF is rendered, so raster-only deployments
//! do not need it installed.

use image::RgbImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::debug;

use crate::core::errors::PipelineError;
use crate::domain::{DocumentKind, is_pdf_bytes};

/// Loads raster images and first pages of PDFs.
#[derive(Debug, Clone, Copy)]
pub struct ImageLoader {
    pdf_scale: f32,
}

impl ImageLoader {
    pub fn new(pdf_scale: f32) -> Self {
        Self { pdf_scale }
    }

    /// Reads and decodes the file at `path`.
    pub fn load_path(&self, path: &Path, kind: DocumentKind) -> Result<RgbImage, PipelineError> {
        let label = path.display().to_string();
        let bytes = std::fs::read(path).map_err(|e| PipelineError::load(&label, e.to_string()))?;
        self.load_bytes(&label, &bytes, kind)
    }

    /// Decodes `bytes` read from `label` according to `kind`.
    ///
    /// A file declared raster but carrying PDF magic bytes is rendered as a PDF.
    pub fn load_bytes(
        &self,
        label: &str,
        bytes: &[u8],
        kind: DocumentKind,
    ) -> Result<RgbImage, PipelineError> {
        if bytes.is_empty() {
            return Err(PipelineError::load(label, "file is empty"));
        }
        match kind {
            DocumentKind::Paginated => self.render_first_page(label, bytes),
            DocumentKind::Raster if is_pdf_bytes(bytes) => self.render_first_page(label, bytes),
            DocumentKind::Raster => image::load_from_memory(bytes)
                .map(|image| image.to_rgb8())
                .map_err(|e| PipelineError::load(label, e.to_string())),
        }
    }
}

fn bind_pdfium() -> Result<Pdfium, String> {
    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("/usr/lib")))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("/usr/local/lib"))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
        .map_err(|e| format!("could not find PDFium library: {e}"))
}

impl ImageLoader {
    fn render_first_page(&self, label: &str, bytes: &[u8]) -> Result<RgbImage, PipelineError> {
        let pdfium = bind_pdfium().map_err(|e| PipelineError::load(label, e))?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| PipelineError::load(label, e.to_string()))?;

        let pages = document.pages();
        if pages.len() == 0 {
            return Err(PipelineError::load(label, "document has no pages"));
        }
        let page = pages
            .get(0)
            .map_err(|e| PipelineError::load(label, e.to_string()))?;

        let render_config = PdfRenderConfig::new().scale_page_by_factor(self.pdf_scale);
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| PipelineError::load(label, format!("failed to render page 1: {e}")))?;
        let image = bitmap.as_image().to_rgb8();

        debug!(
            source = label,
            width = image.width(),
            height = image.height(),
            "rendered first page"
        );
        Ok(image)
    }
}

impl Default for ImageLoader {
    fn default() -> Self {
        Self::new(2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    fn png_bytes(image: &RgbImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("should encode png");
        bytes
    }

    #[test]
    fn test_load_raster_bytes() {
        let page = RgbImage::from_pixel(12, 7, Rgb([10, 20, 30]));
        let loaded = ImageLoader::default()
            .load_bytes("page.png", &png_bytes(&page), DocumentKind::Raster)
            .expect("should decode");
        assert_eq!(loaded, page);
    }

    #[test]
    fn test_corrupt_raster_is_load_error() {
        let err = ImageLoader::default()
            .load_bytes("page.png", b"definitely not an image", DocumentKind::Raster)
            .expect_err("should fail");
        assert!(err.is_load_error());
    }

    #[test]
    fn test_empty_file_is_load_error() {
        let err = ImageLoader::default()
            .load_bytes("page.png", &[], DocumentKind::Raster)
            .expect_err("should fail");
        assert!(err.is_load_error());
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let err = ImageLoader::default()
            .load_path(Path::new("/nonexistent/page.png"), DocumentKind::Raster)
            .expect_err("should fail");
        assert!(err.is_load_error());
    }
}
