use image::{ImageFormat, RgbImage};

pub const MAX_UPLOAD_BYTES: usize = 12 * 1024 * 1024;

#[derive(thiserror::Error, Debug)]
pub enum UploadError {
    #[error("image is empty")]
    Empty,
    #[error("image is {size} bytes, the limit is {limit}")]
    TooLarge { size: usize, limit: usize },
    #[error("unsupported image format (expected JPEG, PNG or WebP)")]
    UnsupportedFormat,
    #[error("image could not be decoded: {0}")]
    Decode(#[from] image::ImageError),
}

/// Check size and sniffed format without decoding.
pub fn validate_upload(bytes: &[u8]) -> Result<ImageFormat, UploadError> {
    if bytes.is_empty() {
        return Err(UploadError::Empty);
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge {
            size: bytes.len(),
            limit: MAX_UPLOAD_BYTES,
        });
    }
    match image::guess_format(bytes) {
        Ok(f @ (ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP)) => Ok(f),
        _ => Err(UploadError::UnsupportedFormat),
    }
}

pub fn decode_upload(bytes: &[u8]) -> Result<RgbImage, UploadError> {
    let format = validate_upload(bytes)?;
    Ok(image::load_from_memory_with_format(bytes, format)?.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = RgbImage::from_pixel(8, 11, image::Rgb([10, 200, 30]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn png_is_accepted_and_decoded() {
        let bytes = png_bytes();
        assert_eq!(validate_upload(&bytes).unwrap(), ImageFormat::Png);
        assert_eq!(decode_upload(&bytes).unwrap().dimensions(), (8, 11));
    }

    #[test]
    fn rejects_empty_oversized_and_unknown() {
        assert!(matches!(validate_upload(&[]), Err(UploadError::Empty)));
        assert!(matches!(
            validate_upload(b"GIF89a\x01\x00\x01\x00"),
            Err(UploadError::UnsupportedFormat)
        ));
        assert!(matches!(
            validate_upload(b"definitely not an image"),
            Err(UploadError::UnsupportedFormat)
        ));
        let mut big = png_bytes();
        big.resize(MAX_UPLOAD_BYTES + 1, 0);
        assert!(matches!(validate_upload(&big), Err(UploadError::TooLarge { .. })));
    }

    #[test]
    fn truncated_png_fails_to_decode() {
        let bytes = png_bytes();
        assert!(matches!(decode_upload(&bytes[..20]), Err(UploadError::Decode(_))));
    }
}
