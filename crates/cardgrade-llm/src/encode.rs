use std::io::Cursor;

use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};

use crate::LlmError;

/// Encode `img` as JPEG at `quality` (1..=100) and wrap it in a base64 data URL.
pub fn jpeg_data_url(img: &RgbImage, quality: u8) -> Result<String, LlmError> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    img.write_with_encoder(encoder)?;
    Ok(format!(
        "data:image/jpeg;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&buf)
    ))
}

/// Lossless variant for small crops where JPEG ringing hurts OCR.
pub fn png_data_url(img: &RgbImage) -> Result<String, LlmError> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)?;
    Ok(format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(buf.get_ref())
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn jpeg_url_decodes_back_to_jpeg() {
        let img = RgbImage::from_pixel(16, 24, Rgb([200, 10, 10]));
        let url = jpeg_data_url(&img, 90).unwrap();
        let payload = url.strip_prefix("data:image/jpeg;base64,").unwrap();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
        let back = image::load_from_memory(&bytes).unwrap();
        assert_eq!((back.width(), back.height()), (16, 24));
    }

    #[test]
    fn png_url_has_png_prefix() {
        let img = RgbImage::new(4, 4);
        assert!(png_data_url(&img).unwrap().starts_with("data:image/png;base64,"));
    }
}
