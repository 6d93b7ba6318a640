//! Sub-contour edge refinement for a located card quad.

use cardgrade_core::{intersect_lines, is_convex, line_through, to_gray, Line};
use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use imageproc::gradients::sobel_gradients;
use nalgebra::Point2;

const SAMPLES_PER_EDGE: usize = 64;

fn gradient_at(grad: &ImageBuffer<Luma<u16>, Vec<u16>>, p: Point2<f32>) -> Option<f32> {
    let x = p.x.round();
    let y = p.y.round();
    if x < 0.0 || y < 0.0 || x >= grad.width() as f32 || y >= grad.height() as f32 {
        return None;
    }
    Some(grad.get_pixel(x as u32, y as u32).0[0] as f32)
}

/// Mean gradient magnitude along the middle 80% of segment `a -> b`.
fn edge_strength(
    grad: &ImageBuffer<Luma<u16>, Vec<u16>>,
    a: Point2<f32>,
    b: Point2<f32>,
) -> Option<f32> {
    let mut sum = 0.0f32;
    let mut n = 0usize;
    for i in 0..SAMPLES_PER_EDGE {
        let t = 0.1 + 0.8 * i as f32 / (SAMPLES_PER_EDGE - 1) as f32;
        let p = a + (b - a) * t;
        if let Some(g) = gradient_at(grad, p) {
            sum += g;
            n += 1;
        }
    }
    (n > SAMPLES_PER_EDGE / 2).then(|| sum / n as f32)
}

/// Best parallel shift of the edge `a -> b` within `radius` pixels.
fn refine_edge(
    grad: &ImageBuffer<Luma<u16>, Vec<u16>>,
    a: Point2<f32>,
    b: Point2<f32>,
    radius: u32,
) -> Option<Line> {
    let base = line_through(a, b)?;
    let normal = nalgebra::Vector2::new(base.a, base.b);
    let r = radius as i32;
    let mut best: Option<(f32, i32)> = None;
    for off in -r..=r {
        let shift = normal * off as f32;
        let Some(s) = edge_strength(grad, a + shift, b + shift) else {
            continue;
        };
        if best.is_none_or(|(bs, _)| s > bs) {
            best = Some((s, off));
        }
    }
    best.map(|(_, off)| base.shifted(off as f32))
}

/// Snap each side of `quad` (TL, TR, BR, BL) to the strongest nearby gradient
/// and rebuild the corners from the refined lines.
///
/// Returns `None` if any refined edge or intersection is unusable; callers
/// keep the original quad in that case.
pub(crate) fn refine_quad(
    img: &RgbImage,
    quad: &[Point2<f32>; 4],
    radius: u32,
) -> Option<[Point2<f32>; 4]> {
    let gray: GrayImage = to_gray(img);
    let grad = sobel_gradients(&gray);

    let [tl, tr, br, bl] = *quad;
    let top = refine_edge(&grad, tl, tr, radius)?;
    let right = refine_edge(&grad, tr, br, radius)?;
    let bottom = refine_edge(&grad, br, bl, radius)?;
    let left = refine_edge(&grad, bl, tl, radius)?;

    let refined = [
        intersect_lines(top, left)?,
        intersect_lines(top, right)?,
        intersect_lines(bottom, right)?,
        intersect_lines(bottom, left)?,
    ];

    let (w, h) = (img.width() as f32, img.height() as f32);
    let inside = refined
        .iter()
        .all(|p| p.x >= -1.0 && p.y >= -1.0 && p.x <= w + 1.0 && p.y <= h + 1.0);
    let drift_ok = refined
        .iter()
        .zip(quad.iter())
        .all(|(p, q)| (p - q).norm() <= 3.0 * radius as f32);
    (inside && drift_ok && is_convex(&refined)).then_some(refined)
}
