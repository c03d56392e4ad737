// ============================================================
// Layer 4 — Image Preprocessor
// ============================================================
// Turns an image file into the flat pixel buffer the model eats:
//
//   1. Decode (jpeg/png — whatever the image crate recognises)
//   2. Resize to input_size × input_size, bilinear
//   3. Convert to RGB (drops alpha, expands grayscale)
//   4. Normalise each channel to [-1, 1]: (v/255 − 0.5) / 0.5
//   5. Lay out planar CHW (all R, then all G, then all B)
//
// CHW layout matters: the buffer is reshaped straight into an
// [N, 3, H, W] tensor by the batcher, no further shuffling.

use anyhow::{Context, Result};
use std::path::Path;

const MEAN: f32 = 0.5;
const STD: f32 = 0.5;

/// Decodes and normalises face images to fixed-size CHW buffers.
#[derive(Debug, Clone, Copy)]
pub struct ImagePreprocessor {
    /// Target side length; the model's linear layers are sized for it
    input_size: usize,
}

impl ImagePreprocessor {
    pub fn new(input_size: usize) -> Self {
        Self { input_size }
    }

    /// Number of floats one processed image occupies (3 · size²).
    pub fn pixel_count(&self) -> usize {
        3 * self.input_size * self.input_size
    }

    /// Load one image file and return its normalised CHW pixel buffer.
    pub fn load(&self, path: &Path) -> Result<Vec<f32>> {
        let img = image::open(path)
            .with_context(|| format!("Cannot decode image '{}'", path.display()))?;

        let side = self.input_size as u32;
        let rgb = img
            .resize_exact(side, side, image::imageops::FilterType::Triangle)
            .to_rgb8();

        let plane = self.input_size * self.input_size;
        let mut pixels = vec![0.0f32; 3 * plane];

        for (i, px) in rgb.pixels().enumerate() {
            for c in 0..3 {
                pixels[c * plane + i] = (px[c] as f32 / 255.0 - MEAN) / STD;
            }
        }

        Ok(pixels)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resizes_and_normalises() {
        // 2x2 image: one red, one green, one blue, one white pixel
        let mut img = image::RgbImage::new(2, 2);
        img.put_pixel(0, 0, image::Rgb([255, 0, 0]));
        img.put_pixel(1, 0, image::Rgb([0, 255, 0]));
        img.put_pixel(0, 1, image::Rgb([0, 0, 255]));
        img.put_pixel(1, 1, image::Rgb([255, 255, 255]));

        let dir = std::env::temp_dir().join("aifr_preproc_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("rgb.png");
        img.save(&path).unwrap();

        let pre = ImagePreprocessor::new(2);
        let pixels = pre.load(&path).unwrap();

        assert_eq!(pixels.len(), pre.pixel_count());
        // Red pixel, red channel: (255/255 - 0.5) / 0.5 = 1.0
        assert!((pixels[0] - 1.0).abs() < 1e-6);
        // Red pixel, green channel: (0 - 0.5) / 0.5 = -1.0
        assert!((pixels[4] + 1.0).abs() < 1e-6);
        // Every value stays within [-1, 1]
        assert!(pixels.iter().all(|p| (-1.0..=1.0).contains(p)));
    }

    #[test]
    fn missing_file_is_an_error() {
        let pre = ImagePreprocessor::new(8);
        assert!(pre.load(Path::new("no/such/file.jpg")).is_err());
    }
}
