use cardgrade_core::rotate_180;
use cardgrade_llm::{jpeg_data_url, LlmError};
use image::{imageops, RgbImage};

pub const GRADE_WIDTH: u32 = 640;
pub const GRADE_HEIGHT: u32 = 896;
const BAND_ROWS: u32 = 80;
const UPSIDE_DOWN_MARGIN: f32 = 10.0;

fn band_mean(img: &RgbImage, y0: u32, y1: u32) -> f32 {
    let mut sum = 0u64;
    let mut n = 0u64;
    for y in y0..y1 {
        for x in 0..img.width() {
            let p = img.get_pixel(x, y).0;
            sum += p[0] as u64 + p[1] as u64 + p[2] as u64;
            n += 3;
        }
    }
    if n == 0 {
        0.0
    } else {
        sum as f32 / n as f32
    }
}

/// Card backs and most fronts are brighter at the top than at the bottom edge.
pub fn looks_upside_down(img: &RgbImage) -> bool {
    let h = img.height();
    let rows = BAND_ROWS.min(h / 2);
    if rows == 0 {
        return false;
    }
    let top = band_mean(img, 0, rows);
    let bottom = band_mean(img, h - rows, h);
    bottom + UPSIDE_DOWN_MARGIN < top
}

/// Canonical canvas -> 640×896, upright, JPEG data URL.
pub fn grade_image(img: &RgbImage) -> RgbImage {
    let resized = imageops::resize(img, GRADE_WIDTH, GRADE_HEIGHT, imageops::FilterType::CatmullRom);
    if looks_upside_down(&resized) {
        log::debug!("llm grader: rotating upside-down image");
        rotate_180(&resized)
    } else {
        resized
    }
}

pub fn grade_data_url(img: &RgbImage, quality: u8) -> Result<String, LlmError> {
    jpeg_data_url(&grade_image(img), quality)
}

/// The upload as photographed, long side capped at `max_side`, for the gate.
pub fn gate_data_url(img: &RgbImage, max_side: u32, quality: u8) -> Result<String, LlmError> {
    let (w, h) = img.dimensions();
    let long = w.max(h);
    if long <= max_side || long == 0 {
        return jpeg_data_url(img, quality);
    }
    let s = max_side as f32 / long as f32;
    let nw = ((w as f32 * s).round() as u32).max(1);
    let nh = ((h as f32 * s).round() as u32).max(1);
    jpeg_data_url(&imageops::resize(img, nw, nh, imageops::FilterType::Triangle), quality)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn split(top: u8, bottom: u8) -> RgbImage {
        RgbImage::from_fn(64, 90, |_, y| {
            let v = if y < 45 { top } else { bottom };
            Rgb([v, v, v])
        })
    }

    #[test]
    fn dark_bottom_is_flipped() {
        assert!(looks_upside_down(&split(200, 100)));
        assert!(!looks_upside_down(&split(100, 200)));
        assert!(!looks_upside_down(&split(150, 145)));
    }

    #[test]
    fn grade_image_is_upright_and_sized() {
        let out = grade_image(&split(220, 40));
        assert_eq!(out.dimensions(), (GRADE_WIDTH, GRADE_HEIGHT));
        assert!(out.get_pixel(320, 10).0[0] < out.get_pixel(320, 880).0[0]);
    }

    #[test]
    fn data_url_is_jpeg() {
        let url = grade_data_url(&split(120, 120), 92).unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }
}
