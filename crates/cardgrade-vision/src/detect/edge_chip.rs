use cardgrade_core::{median_u8, to_gray, DetectorSignal};
use image::RgbImage;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeChipParams {
    /// Border band width in pixels, clamped to `2..=6`.
    pub band: u32,
    /// Absolute gray-level deviation from the central median that counts as a chip.
    pub diff_threshold: f32,
    /// `score = 10 * max(0, 1 - decay * chip_ratio)`.
    pub decay: f32,
    /// Chip ratio above which the detector flags.
    pub flag_ratio: f32,
}

impl Default for EdgeChipParams {
    fn default() -> Self {
        Self {
            band: 3,
            diff_threshold: 28.0,
            decay: 180.0,
            flag_ratio: 0.01,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeChipReport {
    /// Edge score on the 0..=10 scale.
    pub score: f32,
    /// Fraction of border-band pixels deviating from the central median.
    pub chip_ratio: f32,
    pub band: u32,
    pub reference: u8,
}

impl EdgeChipReport {
    /// Report for an image the estimator cannot read: no chips.
    pub fn clean() -> Self {
        Self {
            score: 10.0,
            ..Self::default()
        }
    }

    pub fn signal(&self, params: &EdgeChipParams) -> DetectorSignal {
        DetectorSignal::new(
            self.chip_ratio > params.flag_ratio,
            (params.decay * self.chip_ratio).min(1.0),
        )
        .with_metric("edge_score", self.score as f64)
        .with_metric("chip_ratio", self.chip_ratio as f64)
    }
}

/// True when `(x, y)` lies in the outer `band` pixels of a `w` x `h` image.
#[inline]
pub(crate) fn in_border(x: u32, y: u32, w: u32, h: u32, band: u32) -> bool {
    x < band || y < band || x + band >= w || y + band >= h
}

/// Compare the outer border band against the central median.
pub fn estimate_edge_chips(img: &RgbImage, params: &EdgeChipParams) -> EdgeChipReport {
    let band = params.band.clamp(2, 6);
    let (w, h) = img.dimensions();
    if w <= 4 * band || h <= 4 * band {
        return EdgeChipReport::clean();
    }

    let gray = to_gray(img);
    let inner = (2 * band..h - 2 * band)
        .flat_map(|y| (2 * band..w - 2 * band).map(move |x| (x, y)))
        .map(|(x, y)| gray.get_pixel(x, y).0[0]);
    let Some(reference) = median_u8(inner) else {
        return EdgeChipReport::clean();
    };

    let mut border = 0u64;
    let mut chips = 0u64;
    for (x, y, p) in gray.enumerate_pixels() {
        if !in_border(x, y, w, h, band) {
            continue;
        }
        border += 1;
        if (p.0[0] as f32 - reference as f32).abs() > params.diff_threshold {
            chips += 1;
        }
    }

    let chip_ratio = chips as f32 / (border as f32 + 1e-6);
    let score = 10.0 * (1.0 - params.decay * chip_ratio).max(0.0);
    EdgeChipReport {
        score,
        chip_ratio,
        band,
        reference,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use image::Rgb;

    #[test]
    fn uniform_card_has_no_chips() {
        let img = RgbImage::from_pixel(100, 140, Rgb([180, 170, 150]));
        let r = estimate_edge_chips(&img, &EdgeChipParams::default());
        assert_eq!(r.chip_ratio, 0.0);
        assert_eq!(r.score, 10.0);
        assert!(!r.signal(&EdgeChipParams::default()).flagged);
    }

    #[test]
    fn whitened_border_pixels_reduce_score() {
        let mut img = RgbImage::from_pixel(100, 140, Rgb([120, 120, 120]));
        for x in 40..44 {
            img.put_pixel(x, 0, Rgb([250, 250, 250]));
        }
        let params = EdgeChipParams::default();
        let r = estimate_edge_chips(&img, &params);
        let border = (100 * 140 - 94 * 134) as f32;
        assert_abs_diff_eq!(r.chip_ratio, 4.0 / border, epsilon = 1e-6);
        let expected = 10.0 * (1.0 - 180.0 * 4.0 / border);
        assert_abs_diff_eq!(r.score, expected, epsilon = 1e-3);
    }

    #[test]
    fn tiny_image_is_clean() {
        let img = RgbImage::new(8, 8);
        assert_eq!(estimate_edge_chips(&img, &EdgeChipParams::default()).score, 10.0);
    }
}
