use image::{imageops, GrayImage, Luma, RgbImage};
use serde::{Deserialize, Serialize};

/// Fractional region of interest: `[x0, x1) x [y0, y1)` as fractions of width/height.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    pub x0: f32,
    pub x1: f32,
    pub y0: f32,
    pub y1: f32,
}

impl Roi {
    pub const fn new(x0: f32, x1: f32, y0: f32, y1: f32) -> Self {
        Self { x0, x1, y0, y1 }
    }

    /// Pixel rectangle `(x, y, w, h)` for an image of the given size; `None` if empty.
    pub fn to_pixels(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let fx = |f: f32| ((f.clamp(0.0, 1.0) * width as f32) as u32).min(width);
        let fy = |f: f32| ((f.clamp(0.0, 1.0) * height as f32) as u32).min(height);
        let (x0, x1) = (fx(self.x0), fx(self.x1));
        let (y0, y1) = (fy(self.y0), fy(self.y1));
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0, y0, x1 - x0, y1 - y0))
    }
}

/// Grayscale conversion with BT.601 luma weights, rounded to nearest.
pub fn to_gray(rgb: &RgbImage) -> GrayImage {
    let (w, h) = rgb.dimensions();
    let mut gray = GrayImage::new(w, h);
    for (x, y, p) in rgb.enumerate_pixels() {
        let [r, g, b] = p.0;
        let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        gray.put_pixel(x, y, Luma([(luma + 0.5).min(255.0) as u8]));
    }
    gray
}

/// RGB to 8-bit HSV with hue in `0..180`, saturation and value in `0..=255`.
pub fn rgb_to_hsv(rgb: [u8; 3]) -> [u8; 3] {
    let r = rgb[0] as f32;
    let g = rgb[1] as f32;
    let b = rgb[2] as f32;
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = v - min;

    let s = if v > 0.0 { 255.0 * delta / v } else { 0.0 };

    let mut hue = if delta <= f32::EPSILON {
        0.0
    } else if v == r {
        60.0 * (g - b) / delta
    } else if v == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    if hue < 0.0 {
        hue += 360.0;
    }

    [
        ((hue / 2.0).round() as u32 % 180) as u8,
        s.round().min(255.0) as u8,
        v as u8,
    ]
}

/// Median of a stream of bytes via a 256-bin histogram; `None` when empty.
pub fn median_u8(values: impl IntoIterator<Item = u8>) -> Option<u8> {
    let mut hist = [0u64; 256];
    let mut n = 0u64;
    for v in values {
        hist[v as usize] += 1;
        n += 1;
    }
    if n == 0 {
        return None;
    }
    let half = n.div_ceil(2);
    let mut acc = 0u64;
    for (v, &count) in hist.iter().enumerate() {
        acc += count;
        if acc >= half {
            return Some(v as u8);
        }
    }
    None
}

/// Crop a fractional region; `None` when the region is empty for this image.
pub fn crop_fraction(img: &RgbImage, roi: Roi) -> Option<RgbImage> {
    let (x, y, w, h) = roi.to_pixels(img.width(), img.height())?;
    Some(imageops::crop_imm(img, x, y, w, h).to_image())
}

pub fn rotate_180(img: &RgbImage) -> RgbImage {
    imageops::rotate180(img)
}

#[inline]
fn get_rgb(src: &RgbImage, x: i32, y: i32) -> [f32; 3] {
    if x < 0 || y < 0 || x >= src.width() as i32 || y >= src.height() as i32 {
        return [0.0; 3];
    }
    let p = src.get_pixel(x as u32, y as u32).0;
    [p[0] as f32, p[1] as f32, p[2] as f32]
}

/// Bilinear RGB sample at a sub-pixel location; outside pixels read as black.
#[inline]
pub fn sample_bilinear_rgb(src: &RgbImage, x: f32, y: f32) -> [f32; 3] {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_rgb(src, x0, y0);
    let p10 = get_rgb(src, x0 + 1, y0);
    let p01 = get_rgb(src, x0, y0 + 1);
    let p11 = get_rgb(src, x0 + 1, y0 + 1);

    let mut out = [0.0f32; 3];
    for c in 0..3 {
        let a = p00[c] + fx * (p10[c] - p00[c]);
        let b = p01[c] + fx * (p11[c] - p01[c]);
        out[c] = a + fy * (b - a);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn hsv_matches_8bit_convention() {
        assert_eq!(rgb_to_hsv([255, 0, 0]), [0, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 255, 0]), [60, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 0, 255]), [120, 255, 255]);
        assert_eq!(rgb_to_hsv([128, 128, 128]), [0, 0, 128]);
    }

    #[test]
    fn median_of_small_sets() {
        assert_eq!(median_u8([3u8, 1, 2]), Some(2));
        assert_eq!(median_u8([10u8, 20, 30, 40]), Some(20));
        assert_eq!(median_u8(std::iter::empty()), None);
    }

    #[test]
    fn gray_uses_bt601_weights() {
        let img = RgbImage::from_pixel(2, 2, Rgb([255, 0, 0]));
        assert_eq!(to_gray(&img).get_pixel(0, 0).0[0], 76);
    }

    #[test]
    fn roi_crop_dimensions() {
        let img = RgbImage::new(100, 200);
        let c = crop_fraction(&img, Roi::new(0.05, 0.95, 0.88, 0.98)).unwrap();
        assert_eq!(c.dimensions(), (90, 20));
        assert!(crop_fraction(&img, Roi::new(0.5, 0.5, 0.0, 1.0)).is_none());
    }

    #[test]
    fn bilinear_interpolates_between_pixels() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([0, 0, 0]));
        img.put_pixel(1, 0, Rgb([100, 200, 50]));
        let s = sample_bilinear_rgb(&img, 0.5, 0.0);
        assert!((s[0] - 50.0).abs() < 1e-4);
        assert!((s[1] - 100.0).abs() < 1e-4);
        assert!((s[2] - 25.0).abs() < 1e-4);
    }
}
