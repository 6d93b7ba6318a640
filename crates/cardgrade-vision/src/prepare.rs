//! Per-side preparation: rectify, normalize, assess, upscale.

use image::{imageops, RgbImage};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::color::{normalize_colors, ColorParams};
use crate::quality::{assess_quality, QualityParams, QualityReport};
use crate::rectify::{rectify_or_letterbox, CanvasSource, RectifyParams};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepareParams {
    pub rectify: RectifyParams,
    pub color: ColorParams,
    pub quality: QualityParams,
}

/// One card face ready for scoring.
#[derive(Clone, Debug)]
pub struct PreparedSide {
    /// The decoded upload, untouched.
    pub original: RgbImage,
    /// Canonical, color-normalized canvas.
    pub image: RgbImage,
    pub source: CanvasSource,
    /// Quality measured on the normalized canvas before upscaling.
    pub quality: QualityReport,
}

impl PreparedSide {
    pub fn is_rectified(&self) -> bool {
        matches!(self.source, CanvasSource::Rectified { .. })
    }
}

/// Upscale so the short side reaches `min_side`; larger images are returned as is.
pub fn maybe_upscale(img: RgbImage, min_side: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    let short = w.min(h);
    if short == 0 || short >= min_side {
        return img;
    }
    let s = min_side as f32 / short as f32;
    let nw = (w as f32 * s).round() as u32;
    let nh = (h as f32 * s).round() as u32;
    imageops::resize(&img, nw, nh, imageops::FilterType::CatmullRom)
}

#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(img, params), fields(width = img.width(), height = img.height()))
)]
pub fn prepare_side(img: RgbImage, params: &PrepareParams) -> PreparedSide {
    let canvas = rectify_or_letterbox(&img, &params.rectify);
    let normalized = normalize_colors(&canvas.image, &params.color);
    let quality = assess_quality(&normalized, &params.quality);
    if let Some(reason) = &quality.reason {
        log::info!("quality check (advisory): {reason}");
    }
    let image = maybe_upscale(normalized, params.rectify.target_min_side);
    PreparedSide {
        original: img,
        image,
        source: canvas.source,
        quality,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::QualityIssue;
    use crate::rectify::tests::{noise_image, synthetic_photo};

    fn params() -> PrepareParams {
        PrepareParams {
            rectify: RectifyParams {
                target_min_side: 126,
                ..RectifyParams::default()
            },
            quality: QualityParams {
                min_side: 100,
                ..QualityParams::default()
            },
            ..PrepareParams::default()
        }
    }

    #[test]
    fn upscale_only_grows_small_images() {
        let small = RgbImage::new(50, 70);
        assert_eq!(maybe_upscale(small, 100).dimensions(), (100, 140));
        let big = RgbImage::new(300, 400);
        assert_eq!(maybe_upscale(big, 100).dimensions(), (300, 400));
    }

    #[test]
    fn photo_is_rectified_and_assessed() {
        let (img, _) = synthetic_photo(3.0);
        let side = prepare_side(img, &params());
        assert!(side.is_rectified());
        assert_eq!(side.image.dimensions(), (126, 176));
        assert_eq!(side.quality.ok, side.quality.issue.is_none());
        assert!(side.quality.blur_variance.is_finite() && side.quality.blur_variance >= 0.0);
        assert!(side.quality.glare_ratio < 0.01, "{:?}", side.quality);

        let strict = PrepareParams {
            quality: QualityParams {
                min_side: 100,
                min_blur: f32::MAX,
                ..QualityParams::default()
            },
            ..params()
        };
        let (img, _) = synthetic_photo(3.0);
        let side = prepare_side(img, &strict);
        assert_eq!(side.quality.issue, Some(QualityIssue::Blur));
        assert!(!side.quality.ok);
    }

    #[test]
    fn noise_still_yields_canvas() {
        let side = prepare_side(noise_image(200, 160), &params());
        assert_eq!(side.image.dimensions(), (126, 176));
        assert_eq!(side.original.dimensions(), (200, 160));
    }
}
