use cardgrade_core::{to_gray, DetectorSignal};
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::quality::{glare_fraction, laplacian_variance};

/// Thresholds of the standalone blur and glare re-checks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoCheckParams {
    pub blur_threshold: f32,
    pub glare_min_value: u8,
    pub glare_max_saturation: u8,
    pub glare_ratio: f32,
    /// Glare ratio span above `glare_ratio` that maps confidence 0 -> 1.
    pub glare_span: f32,
}

impl Default for PhotoCheckParams {
    fn default() -> Self {
        Self {
            blur_threshold: 140.0,
            glare_min_value: 243,
            glare_max_saturation: 39,
            glare_ratio: 0.02,
            glare_span: 0.10,
        }
    }
}

pub fn detect_blur(img: &RgbImage, params: &PhotoCheckParams) -> DetectorSignal {
    if img.width() < 3 || img.height() < 3 {
        return DetectorSignal::none();
    }
    let fm = laplacian_variance(&to_gray(img));
    let t = params.blur_threshold;
    let flagged = fm < t;
    let confidence = if flagged && t > 0.0 { (t - fm) / t } else { 0.0 };
    DetectorSignal::new(flagged, confidence).with_metric("laplacian_variance", fm as f64)
}

pub fn detect_glare(img: &RgbImage, params: &PhotoCheckParams) -> DetectorSignal {
    if img.width() == 0 || img.height() == 0 {
        return DetectorSignal::none();
    }
    let ratio = glare_fraction(img, params.glare_min_value, params.glare_max_saturation);
    let confidence = if params.glare_span > 0.0 {
        (ratio - params.glare_ratio) / params.glare_span
    } else {
        0.0
    };
    DetectorSignal::new(ratio > params.glare_ratio, confidence)
        .with_metric("glare_ratio", ratio as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use image::Rgb;

    #[test]
    fn flat_image_is_fully_blurred() {
        let img = RgbImage::from_pixel(32, 32, Rgb([90, 90, 90]));
        let s = detect_blur(&img, &PhotoCheckParams::default());
        assert!(s.flagged);
        assert_eq!(s.confidence, 1.0);
    }

    #[test]
    fn glare_confidence_ramps_above_threshold() {
        // 12% of pixels blown out.
        let img = RgbImage::from_fn(100, 100, |_, y| {
            if y < 12 {
                Rgb([255, 255, 255])
            } else {
                Rgb([120, 110, 100])
            }
        });
        let s = detect_glare(&img, &PhotoCheckParams::default());
        assert!(s.flagged);
        assert_abs_diff_eq!(s.confidence, 1.0, epsilon = 1e-5);

        let img = RgbImage::from_fn(100, 100, |_, y| {
            if y < 1 {
                Rgb([255, 255, 255])
            } else {
                Rgb([120, 110, 100])
            }
        });
        let s = detect_glare(&img, &PhotoCheckParams::default());
        assert!(!s.flagged);
        assert_eq!(s.confidence, 0.0);
    }

    #[test]
    fn saturated_bright_pixels_are_not_glare() {
        let img = RgbImage::from_pixel(20, 20, Rgb([255, 250, 40]));
        assert!(!detect_glare(&img, &PhotoCheckParams::default()).flagged);
    }

    #[test]
    fn empty_image_returns_default() {
        let img = RgbImage::new(0, 0);
        assert_eq!(detect_blur(&img, &PhotoCheckParams::default()), DetectorSignal::none());
        assert_eq!(detect_glare(&img, &PhotoCheckParams::default()), DetectorSignal::none());
    }
}
