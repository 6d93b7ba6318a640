//! Pair tensor preparation: front and back channel-concatenated.

use image::{imageops, RgbImage};

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Normalization applied to each side before concatenation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TensorSpec {
    pub size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for TensorSpec {
    fn default() -> Self {
        Self {
            size: 384,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }
}

/// `[1, 6, S, S]` in row-major CHW order, front channels first.
#[derive(Clone, Debug, PartialEq)]
pub struct PairTensor {
    pub size: u32,
    pub data: Vec<f32>,
}

impl PairTensor {
    pub const CHANNELS: usize = 6;

    pub fn shape(&self) -> [usize; 4] {
        let s = self.size as usize;
        [1, Self::CHANNELS, s, s]
    }

    pub fn expected_len(size: u32) -> usize {
        Self::CHANNELS * size as usize * size as usize
    }

    /// Value at channel `c`, row `y`, column `x`.
    pub fn at(&self, c: usize, y: u32, x: u32) -> f32 {
        let s = self.size as usize;
        self.data[c * s * s + y as usize * s + x as usize]
    }
}

/// Resize the shorter side to `size`, then center-crop a `size`×`size` square.
pub fn resize_center_crop(img: &RgbImage, size: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 || size == 0 {
        return RgbImage::new(size, size);
    }
    let scale = size as f32 / w.min(h) as f32;
    let nw = ((w as f32 * scale).round() as u32).max(size);
    let nh = ((h as f32 * scale).round() as u32).max(size);
    let resized = imageops::resize(img, nw, nh, imageops::FilterType::Triangle);
    let left = ((nw - size) as f32 / 2.0).round() as u32;
    let top = ((nh - size) as f32 / 2.0).round() as u32;
    imageops::crop_imm(&resized, left, top, size, size).to_image()
}

fn push_normalized(out: &mut Vec<f32>, img: &RgbImage, spec: &TensorSpec) {
    for c in 0..3 {
        let (m, s) = (spec.mean[c], spec.std[c]);
        out.extend(img.pixels().map(|p| (p.0[c] as f32 / 255.0 - m) / s));
    }
}

pub fn pair_tensor(front: &RgbImage, back: &RgbImage, spec: &TensorSpec) -> PairTensor {
    let f = resize_center_crop(front, spec.size);
    let b = resize_center_crop(back, spec.size);
    let mut data = Vec::with_capacity(PairTensor::expected_len(spec.size));
    push_normalized(&mut data, &f, spec);
    push_normalized(&mut data, &b, spec);
    PairTensor {
        size: spec.size,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use image::Rgb;

    #[test]
    fn crop_is_square_and_centered() {
        // left third red, middle green, right third blue
        let img = RgbImage::from_fn(300, 100, |x, _| match x / 100 {
            0 => Rgb([255, 0, 0]),
            1 => Rgb([0, 255, 0]),
            _ => Rgb([0, 0, 255]),
        });
        let out = resize_center_crop(&img, 50);
        assert_eq!(out.dimensions(), (50, 50));
        assert_eq!(out.get_pixel(25, 25).0, [0, 255, 0]);
    }

    #[test]
    fn tensor_layout_is_front_then_back() {
        let spec = TensorSpec {
            size: 8,
            ..TensorSpec::default()
        };
        let front = RgbImage::from_pixel(16, 20, Rgb([255, 255, 255]));
        let back = RgbImage::from_pixel(10, 10, Rgb([0, 0, 0]));
        let t = pair_tensor(&front, &back, &spec);
        assert_eq!(t.shape(), [1, 6, 8, 8]);
        assert_eq!(t.data.len(), PairTensor::expected_len(8));
        assert_abs_diff_eq!(t.at(0, 3, 3), (1.0 - 0.485) / 0.229, epsilon = 1e-5);
        assert_abs_diff_eq!(t.at(5, 7, 0), -0.406 / 0.225, epsilon = 1e-5);
    }
}
