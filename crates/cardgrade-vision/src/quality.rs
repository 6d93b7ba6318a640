//! Photo quality report: resolution, sharpness and glare.
//!
//! The report is advisory. Which engine treats a failing report as blocking
//! is decided by the caller.

use cardgrade_core::{rgb_to_hsv, to_gray};
use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

/// Thresholds for [`assess_quality`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityParams {
    /// Minimum of width/height, in pixels.
    pub min_side: u32,
    /// Minimum Laplacian variance of the grayscale image.
    pub min_blur: f32,
    /// Maximum fraction of glare pixels.
    pub max_glare: f32,
    /// A pixel is glare when its HSV value is at least this...
    pub glare_min_value: u8,
    /// ...and its HSV saturation at most this. Saturated print (yellow
    /// borders, holo foil) stays out of the count.
    pub glare_max_saturation: u8,
}

impl Default for QualityParams {
    fn default() -> Self {
        Self {
            min_side: 1000,
            min_blur: 140.0,
            max_glare: 0.03,
            glare_min_value: 245,
            glare_max_saturation: 40,
        }
    }
}

impl QualityParams {
    /// Relaxed thresholds used while preparing sides for the regressor.
    pub fn soft() -> Self {
        Self {
            min_side: 700,
            min_blur: 110.0,
            max_glare: 0.18,
            ..Self::default()
        }
    }
}

/// Which check failed first (resolution, then blur, then glare).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityIssue {
    Resolution,
    Blur,
    Glare,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<QualityIssue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub blur_variance: f32,
    pub glare_ratio: f32,
    pub min_side: u32,
}

/// Variance of the 4-neighbour Laplacian over interior pixels.
pub fn laplacian_variance(gray: &GrayImage) -> f32 {
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 {
        return 0.0;
    }
    let raw = gray.as_raw();
    let stride = w as usize;

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut count = 0u64;
    for y in 1..h as usize - 1 {
        let row = y * stride;
        for x in 1..stride - 1 {
            let c = raw[row + x] as f64;
            let lap = raw[row - stride + x] as f64
                + raw[row + stride + x] as f64
                + raw[row + x - 1] as f64
                + raw[row + x + 1] as f64
                - 4.0 * c;
            sum += lap;
            sum_sq += lap * lap;
            count += 1;
        }
    }
    let mean = sum / count as f64;
    ((sum_sq / count as f64) - mean * mean).max(0.0) as f32
}

/// Fraction of pixels that are bright (`V >= min_value`) and pale (`S <= max_saturation`).
pub fn glare_fraction(img: &RgbImage, min_value: u8, max_saturation: u8) -> f32 {
    let total = img.width() as u64 * img.height() as u64;
    if total == 0 {
        return 0.0;
    }
    let hits = img
        .pixels()
        .filter(|p| {
            let [_, s, v] = rgb_to_hsv(p.0);
            v >= min_value && s <= max_saturation
        })
        .count() as u64;
    hits as f32 / total as f32
}

/// Measure all three checks and report the highest-priority failure.
pub fn assess_quality(img: &RgbImage, params: &QualityParams) -> QualityReport {
    let min_side = img.width().min(img.height());
    let blur_variance = laplacian_variance(&to_gray(img));
    let glare_ratio = glare_fraction(img, params.glare_min_value, params.glare_max_saturation);

    let failure = if min_side < params.min_side {
        Some((
            QualityIssue::Resolution,
            format!("Low resolution (min side {min_side} < {})", params.min_side),
        ))
    } else if blur_variance < params.min_blur {
        Some((
            QualityIssue::Blur,
            format!(
                "Image is blurry (Laplacian var {blur_variance:.1} < {})",
                params.min_blur
            ),
        ))
    } else if glare_ratio > params.max_glare {
        Some((
            QualityIssue::Glare,
            format!(
                "Glare too high ({:.1}% > {:.1}%)",
                glare_ratio * 100.0,
                params.max_glare * 100.0
            ),
        ))
    } else {
        None
    };

    let (issue, reason) = match failure {
        Some((i, r)) => (Some(i), Some(r)),
        None => (None, None),
    };
    QualityReport {
        ok: issue.is_none(),
        issue,
        reason,
        blur_variance,
        glare_ratio,
        min_side,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use image::Rgb;

    fn checkerboard(w: u32, h: u32, cell: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            if ((x / cell) + (y / cell)) % 2 == 0 {
                Rgb([30, 30, 30])
            } else {
                Rgb([200, 200, 200])
            }
        })
    }

    fn permissive() -> QualityParams {
        QualityParams {
            min_side: 10,
            ..QualityParams::default()
        }
    }

    #[test]
    fn flat_image_has_zero_laplacian_variance() {
        let img = RgbImage::from_pixel(50, 50, Rgb([120, 120, 120]));
        assert_eq!(laplacian_variance(&to_gray(&img)), 0.0);
    }

    #[test]
    fn sharp_texture_passes() {
        let report = assess_quality(&checkerboard(64, 64, 2), &permissive());
        assert!(report.ok, "{report:?}");
        assert!(report.blur_variance > 140.0);
        assert!(report.reason.is_none());
    }

    #[test]
    fn resolution_is_reported_before_blur() {
        let img = RgbImage::from_pixel(40, 60, Rgb([120, 120, 120]));
        let report = assess_quality(&img, &QualityParams::default());
        assert!(!report.ok);
        assert_eq!(report.issue, Some(QualityIssue::Resolution));
        assert_eq!(
            report.reason.as_deref(),
            Some("Low resolution (min side 40 < 1000)")
        );
    }

    #[test]
    fn flat_image_is_blurry() {
        let img = RgbImage::from_pixel(40, 60, Rgb([120, 120, 120]));
        let report = assess_quality(&img, &permissive());
        assert_eq!(report.issue, Some(QualityIssue::Blur));
        assert!(report.reason.unwrap().starts_with("Image is blurry"));
    }

    #[test]
    fn white_patch_counts_as_glare() {
        let mut img = checkerboard(64, 64, 2);
        for y in 0..16 {
            for x in 0..64 {
                img.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let report = assess_quality(&img, &permissive());
        assert_eq!(report.issue, Some(QualityIssue::Glare));
        assert_abs_diff_eq!(report.glare_ratio, 0.25, epsilon = 1e-6);
    }

    #[test]
    fn yellow_border_is_not_glare() {
        let mut img = checkerboard(200, 200, 2);
        for (x, y, p) in img.enumerate_pixels_mut() {
            if x < 60 || y < 60 || x >= 140 || y >= 140 {
                *p = Rgb([255, 222, 0]);
            }
        }
        let report = assess_quality(&img, &permissive());
        assert_eq!(report.glare_ratio, 0.0);
        assert!(report.ok, "{report:?}");
        assert!(report.issue.is_none());

        let soft = QualityParams {
            min_side: 10,
            ..QualityParams::soft()
        };
        assert!(assess_quality(&img, &soft).ok);
    }
}
