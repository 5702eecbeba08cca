//! Ink projections and their statistics.

use image::GrayImage;

/// Sum of pixel values of every row, top to bottom.
pub fn row_projection(image: &GrayImage) -> Vec<u64> {
    let width = image.width() as usize;
    if width == 0 {
        return vec![0; image.height() as usize];
    }
    image
        .as_raw()
        .chunks_exact(width)
        .map(|row| row.iter().map(|&v| v as u64).sum())
        .collect()
}

/// Population variance of `values`; 0 for an empty slice.
pub fn variance(values: &[u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n
}

/// Mean of the strictly positive values, `None` when there are none.
pub fn positive_mean(values: &[u64]) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .filter(|&&v| v > 0)
        .fold((0f64, 0usize), |(sum, count), &v| (sum + v as f64, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Number of non-zero pixels.
pub fn count_foreground(image: &GrayImage) -> u64 {
    image.as_raw().iter().filter(|&&v| v > 0).count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_row_projection_sums_rows() {
        let mut image = GrayImage::new(4, 3);
        image.put_pixel(0, 1, Luma([255]));
        image.put_pixel(3, 1, Luma([255]));
        image.put_pixel(2, 2, Luma([10]));
        assert_eq!(row_projection(&image), vec![0, 510, 10]);
    }

    #[test]
    fn test_variance_is_population_variance() {
        assert_eq!(variance(&[]), 0.0);
        assert_eq!(variance(&[5, 5, 5]), 0.0);
        assert!((variance(&[0, 10]) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_positive_mean_ignores_zeros() {
        assert_eq!(positive_mean(&[0, 0]), None);
        assert_eq!(positive_mean(&[0, 10, 30, 0]), Some(20.0));
    }

    #[test]
    fn test_count_foreground() {
        let mut image = GrayImage::new(5, 5);
        image.put_pixel(1, 1, Luma([1]));
        image.put_pixel(2, 2, Luma([255]));
        assert_eq!(count_foreground(&image), 2);
    }
}
