//! Segmentation of synthetic pages through the public pipeline API.

mod common;

use common::{mask_with_bands, page_with_lines, png_bytes};
use image::{Rgb, RgbImage};
use oar_htr::core::PipelineConfig;
use oar_htr::domain::DocumentKind;
use oar_htr::pipeline::{
    BackgroundNormalizer, DocumentPipeline, LineSegmenter, OrientationCorrector, StructuralCleaner,
};
use oar_htr::processors::count_foreground;

#[test]
fn test_two_bands_yield_two_ordered_crops() {
    let mask = mask_with_bands(800, 400, 100, 700, &[(50, 90), (200, 240)]);
    let config = PipelineConfig::default();
    let lines = LineSegmenter::new(config.clone()).segment(&mask);

    assert_eq!(lines.len(), 2);
    assert!(lines[0].band.bottom <= lines[1].band.top);
    for (index, line) in lines.iter().enumerate() {
        assert_eq!(line.index, index);
        assert!(line.image.height() > config.min_line_height);
        assert!(line.image.width() > config.min_line_width);
        assert!(line.ink > config.min_line_ink);
    }
    assert_eq!(lines[0].band.top, 45);
    assert_eq!(lines[0].band.bottom, 95);
    assert_eq!(lines[1].band.top, 195);
    assert_eq!(lines[1].band.bottom, 245);
    assert_eq!(lines[0].ink, 600 * 40);
}

#[test]
fn test_blank_paper_has_no_foreground_and_no_lines() {
    let page = RgbImage::from_pixel(600, 450, Rgb([238, 230, 210]));
    let config = PipelineConfig::default();

    let normalized = BackgroundNormalizer::new(config.background_kernel)
        .normalize(&page)
        .expect("should normalize");
    let cleaned = StructuralCleaner::from_config(&config).clean(&normalized.mask);
    assert_eq!(count_foreground(&cleaned), 0);
    assert!(LineSegmenter::new(config).segment(&cleaned).is_empty());
}

#[test]
fn test_upright_page_is_never_rotated() {
    let mask = mask_with_bands(600, 500, 60, 540, &[(60, 90), (150, 180), (240, 270), (330, 360)]);
    let corrector = OrientationCorrector::default();
    let (upright, sideways) = corrector.variances(&mask);
    assert!(upright > sideways);

    let page = image::GrayImage::from_pixel(600, 500, image::Luma([210]));
    let oriented = corrector.correct(mask.clone(), page);
    assert!(!oriented.rotated);
    assert_eq!(oriented.mask, mask);
}

#[test]
fn test_encoded_scan_is_segmented_from_bytes() {
    let bytes = png_bytes(&page_with_lines(&[(80, 100), (180, 200), (280, 300)]));
    let analysis = DocumentPipeline::default()
        .run_bytes("registo.png", &bytes, DocumentKind::Raster)
        .expect("should analyze");

    assert_eq!(analysis.lines.len(), 3);
    assert!(!analysis.rotated);
    assert!(analysis.lines.iter().all(|line| line.image.width() == 500));
}
