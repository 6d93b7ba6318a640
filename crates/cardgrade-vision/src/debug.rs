//! Optional on-disk artifacts for inspecting a grading run.

use std::path::{Path, PathBuf};

use cardgrade_core::to_gray;
use image::{Rgb, RgbImage};

use crate::detect::{in_border, EdgeChipParams};

/// Border-band pixels deviating from the central median are painted red,
/// the rest of the band is tinted green.
pub fn edge_overlay(img: &RgbImage, params: &EdgeChipParams) -> RgbImage {
    let report = crate::detect::estimate_edge_chips(img, params);
    let (w, h) = img.dimensions();
    let gray = to_gray(img);
    let mut out = img.clone();
    for (x, y, p) in out.enumerate_pixels_mut() {
        if !in_border(x, y, w, h, report.band.max(2)) {
            continue;
        }
        let [r, g, b] = p.0;
        let v = gray.get_pixel(x, y).0[0] as f32;
        let chipped = (v - report.reference as f32).abs() > params.diff_threshold;
        *p = if chipped {
            Rgb([255, 0, 0])
        } else {
            Rgb([r / 2, g / 2 + 127, b / 2])
        };
    }
    out
}

/// Write `<stem>_rectified.png` and `<stem>_edges.png` into `dir`.
///
/// Returns the paths that were written; failures are logged and skipped.
pub fn write_debug_artifacts(
    dir: &Path,
    stem: &str,
    img: &RgbImage,
    params: &EdgeChipParams,
) -> Vec<PathBuf> {
    if let Err(e) = std::fs::create_dir_all(dir) {
        log::warn!("debug: cannot create {}: {e}", dir.display());
        return Vec::new();
    }
    let mut written = Vec::new();
    let rectified = dir.join(format!("{stem}_rectified.png"));
    match img.save(&rectified) {
        Ok(()) => written.push(rectified),
        Err(e) => log::warn!("debug: failed to write {}: {e}", rectified.display()),
    }
    let edges = dir.join(format!("{stem}_edges.png"));
    match edge_overlay(img, params).save(&edges) {
        Ok(()) => written.push(edges),
        Err(e) => log::warn!("debug: failed to write {}: {e}", edges.display()),
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_marks_chips_red() {
        let mut img = RgbImage::from_pixel(60, 80, Rgb([120, 120, 120]));
        img.put_pixel(30, 0, Rgb([250, 250, 250]));
        let out = edge_overlay(&img, &EdgeChipParams::default());
        assert_eq!(out.get_pixel(30, 0).0, [255, 0, 0]);
        assert_eq!(out.get_pixel(10, 0).0, [60, 187, 60]);
        assert_eq!(out.get_pixel(30, 40).0, [120, 120, 120]);
    }

    #[test]
    fn artifacts_land_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        let img = RgbImage::from_pixel(40, 56, Rgb([200, 190, 180]));
        let written = write_debug_artifacts(dir.path(), "front", &img, &EdgeChipParams::default());
        assert_eq!(written.len(), 2);
        assert!(written.iter().all(|p| p.exists()));
    }
}
