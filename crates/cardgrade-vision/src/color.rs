use image::RgbImage;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorParams {
    /// Equalize channel means around the overall mean.
    pub white_balance: bool,
    /// Output is `x^(1/gamma)`; 1.0 disables the tonemap.
    pub gamma: f32,
}

impl Default for ColorParams {
    fn default() -> Self {
        Self {
            white_balance: true,
            gamma: 1.05,
        }
    }
}

/// Gray-world white balance followed by a gentle gamma, via per-channel lookup tables.
pub fn normalize_colors(img: &RgbImage, params: &ColorParams) -> RgbImage {
    let n = img.width() as f64 * img.height() as f64;
    if n == 0.0 {
        return img.clone();
    }

    let mut gains = [1.0f64; 3];
    if params.white_balance {
        let mut sums = [0.0f64; 3];
        for p in img.pixels() {
            for c in 0..3 {
                sums[c] += p.0[c] as f64;
            }
        }
        let means = sums.map(|s| s / n);
        let overall = means.iter().sum::<f64>() / 3.0;
        gains = means.map(|m| overall / (m + 1e-6));
    }

    let inv_gamma = if params.gamma > 0.0 {
        1.0 / params.gamma as f64
    } else {
        1.0
    };
    let luts: [[u8; 256]; 3] = gains.map(|g| {
        let mut lut = [0u8; 256];
        for (v, slot) in lut.iter_mut().enumerate() {
            let balanced = (v as f64 * g).clamp(0.0, 255.0) / 255.0;
            *slot = (balanced.powf(inv_gamma) * 255.0 + 0.5).clamp(0.0, 255.0) as u8;
        }
        lut
    });

    let mut out = img.clone();
    for p in out.pixels_mut() {
        for c in 0..3 {
            p.0[c] = luts[c][p.0[c] as usize];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn color_cast_is_neutralized() {
        let img = RgbImage::from_fn(16, 16, |x, _| {
            if x < 8 {
                Rgb([180, 120, 90])
            } else {
                Rgb([200, 140, 110])
            }
        });
        let params = ColorParams {
            gamma: 1.0,
            ..ColorParams::default()
        };
        let out = normalize_colors(&img, &params);
        let mut means = [0.0f64; 3];
        for p in out.pixels() {
            for c in 0..3 {
                means[c] += p.0[c] as f64 / 256.0;
            }
        }
        assert!((means[0] - means[1]).abs() < 1.5, "{means:?}");
        assert!((means[1] - means[2]).abs() < 1.5, "{means:?}");
    }

    #[test]
    fn gamma_brightens_midtones_and_keeps_extremes() {
        let img = RgbImage::from_fn(3, 1, |x, _| match x {
            0 => Rgb([0, 0, 0]),
            1 => Rgb([128, 128, 128]),
            _ => Rgb([255, 255, 255]),
        });
        let params = ColorParams {
            white_balance: false,
            gamma: 1.05,
        };
        let out = normalize_colors(&img, &params);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0]);
        assert!(out.get_pixel(1, 0).0[0] > 128);
        assert_eq!(out.get_pixel(2, 0).0, [255, 255, 255]);
    }

    #[test]
    fn empty_image_passes_through() {
        let img = RgbImage::new(0, 0);
        assert_eq!(normalize_colors(&img, &ColorParams::default()).dimensions(), (0, 0));
    }
}
