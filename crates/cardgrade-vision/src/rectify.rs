//! Card localization and perspective rectification.
//!
//! The search runs one or more edge passes (blur, Canny, morphological
//! close + dilate), keeps the outer contours and looks for the largest one
//! inside a plausible area band. That contour is simplified with
//! Douglas–Peucker at increasing tolerances until a convex quadrilateral
//! appears. If none does, the minimum-area rectangle of the largest contour
//! is used instead. Corners are ordered TL, TR, BR, BL and warped onto a
//! portrait canvas with the physical card aspect.

use cardgrade_core::{
    approx_polygon_dp, arc_length, is_convex, min_area_rect, order_corners, polygon_area,
    to_gray, warp_perspective_rgb, CanvasSize, Homography,
};
use image::{imageops, GrayImage, Rgb, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{close, dilate};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::refine::refine_quad;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RectifyError {
    #[error("empty image ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
    #[error("no plausible card contour (largest covers {largest_frac:.3} of the frame)")]
    NoCardContour { largest_frac: f32 },
    #[error("card quadrilateral is degenerate")]
    DegenerateQuad,
}

/// One edge-detection configuration of the contour search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgePass {
    /// Gaussian kernel size (odd); sigma follows the usual `0.3*((k-1)/2-1)+0.8` rule.
    pub blur_ksize: u32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Square structuring element size for the close and dilate steps.
    pub morph_ksize: u32,
    pub dilate_iterations: u32,
}

impl EdgePass {
    /// First pass: clean, well-lit photos.
    pub fn gentle() -> Self {
        Self {
            blur_ksize: 5,
            canny_low: 50.0,
            canny_high: 140.0,
            morph_ksize: 5,
            dilate_iterations: 1,
        }
    }

    /// Second pass: low-contrast backgrounds and soft edges.
    pub fn aggressive() -> Self {
        Self {
            blur_ksize: 7,
            canny_low: 20.0,
            canny_high: 200.0,
            morph_ksize: 7,
            dilate_iterations: 2,
        }
    }

    fn sigma(&self) -> f32 {
        let k = self.blur_ksize.max(1) as f32;
        0.3 * ((k - 1.0) * 0.5 - 1.0) + 0.8
    }

    fn morph_radius(&self) -> u8 {
        (self.morph_ksize / 2).clamp(1, u8::MAX as u32) as u8
    }
}

/// Rectifier parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifyParams {
    /// Short side of the output canvas; the long side follows 88/63.
    pub target_min_side: u32,
    /// Contours below this fraction of the frame are not cards.
    pub min_area_frac: f32,
    /// Contours above this fraction are the frame itself, not a card.
    pub max_area_frac: f32,
    /// Lower area bound for the minimum-area-rectangle fallback.
    pub fallback_min_area_frac: f32,
    /// Douglas–Peucker tolerances as fractions of the contour perimeter, tried in order.
    pub approx_tolerances: Vec<f32>,
    pub passes: Vec<EdgePass>,
    /// Detection runs on a copy downscaled so its long side is at most this.
    pub working_max_side: u32,
    /// Snap each quad edge to the strongest nearby gradient before warping.
    pub refine_edges: bool,
    /// Search radius, in pixels, for edge refinement.
    pub refine_radius: u32,
    /// Fill colour of the letterbox fallback.
    pub letterbox_fill: [u8; 3],
}

impl Default for RectifyParams {
    fn default() -> Self {
        Self {
            target_min_side: 1000,
            min_area_frac: 0.20,
            max_area_frac: 0.95,
            fallback_min_area_frac: 0.05,
            approx_tolerances: vec![0.02, 0.03, 0.04, 0.06],
            passes: vec![EdgePass::gentle(), EdgePass::aggressive()],
            working_max_side: 1200,
            refine_edges: false,
            refine_radius: 6,
            letterbox_fill: [0, 0, 0],
        }
    }
}

impl RectifyParams {
    pub fn canvas(&self) -> CanvasSize {
        CanvasSize::for_short_side(self.target_min_side)
    }
}

/// How the card quadrilateral was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuadSource {
    /// Strict polygon approximation succeeded at this perimeter tolerance.
    Polygon { tolerance: f32, pass: usize },
    /// Minimum-area rectangle of the largest plausible contour.
    MinAreaRect,
}

/// Located card corners in source-image pixels, ordered TL, TR, BR, BL.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CardQuad {
    pub corners: [Point2<f32>; 4],
    pub source: QuadSource,
    /// Fraction of the frame covered by the quad.
    pub area_frac: f32,
}

/// A successful rectification: the warped canvas and the geometry behind it.
#[derive(Clone, Debug)]
pub struct Rectification {
    pub image: RgbImage,
    pub quad: CardQuad,
    /// Maps canvas pixels into the source image.
    pub h_img_from_canvas: Homography,
    pub refined: bool,
}

/// Where a canonical canvas came from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CanvasSource {
    Rectified {
        quad: [[f32; 2]; 4],
        source: QuadSource,
        refined: bool,
    },
    Letterbox {
        reason: String,
    },
}

/// Canonical card canvas handed to every downstream stage.
#[derive(Clone, Debug)]
pub struct CardCanvas {
    pub image: RgbImage,
    pub source: CanvasSource,
}

impl CardCanvas {
    pub fn is_rectified(&self) -> bool {
        matches!(self.source, CanvasSource::Rectified { .. })
    }
}

struct Candidate {
    area: f32,
    points: Vec<Point2<f32>>,
}

fn edge_mask(gray: &GrayImage, pass: &EdgePass) -> GrayImage {
    let blurred = gaussian_blur_f32(gray, pass.sigma());
    let edges = canny(&blurred, pass.canny_low, pass.canny_high);
    let r = pass.morph_radius();
    let mut mask = close(&edges, Norm::LInf, r);
    for _ in 0..pass.dilate_iterations {
        mask = dilate(&mask, Norm::LInf, r);
    }
    mask
}

/// Outer, top-level contours sorted by decreasing area.
fn outer_contours(mask: &GrayImage) -> Vec<Candidate> {
    let mut out: Vec<Candidate> = find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter(|c| c.points.len() >= 4)
        .map(|c| {
            let points: Vec<Point2<f32>> = c
                .points
                .iter()
                .map(|p| Point2::new(p.x as f32, p.y as f32))
                .collect();
            Candidate {
                area: polygon_area(&points),
                points,
            }
        })
        .collect();
    out.sort_by(|a, b| b.area.total_cmp(&a.area));
    out
}

fn strict_quad(points: &[Point2<f32>], tolerances: &[f32]) -> Option<(f32, [Point2<f32>; 4])> {
    let perimeter = arc_length(points, true);
    tolerances.iter().find_map(|&tol| {
        let approx = approx_polygon_dp(points, tol * perimeter, true);
        if approx.len() == 4 && is_convex(&approx) {
            Some((tol, [approx[0], approx[1], approx[2], approx[3]]))
        } else {
            None
        }
    })
}

/// Filled-area over rectangle-area; ragged blobs score low.
fn rectangularity(area: f32, rect: &[Point2<f32>; 4]) -> f32 {
    let rect_area = polygon_area(rect);
    if rect_area <= f32::EPSILON {
        0.0
    } else {
        area / rect_area
    }
}

/// Locate the card quadrilateral without warping.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(img, params), fields(width = img.width(), height = img.height()))
)]
pub fn locate_card(img: &RgbImage, params: &RectifyParams) -> Result<CardQuad, RectifyError> {
    let (w, h) = img.dimensions();
    if w < 4 || h < 4 {
        return Err(RectifyError::EmptyImage {
            width: w,
            height: h,
        });
    }

    let long = w.max(h);
    let scale = if params.working_max_side > 0 && long > params.working_max_side {
        params.working_max_side as f32 / long as f32
    } else {
        1.0
    };
    let gray_full = to_gray(img);
    let gray = if scale < 1.0 {
        let sw = ((w as f32 * scale).round() as u32).max(4);
        let sh = ((h as f32 * scale).round() as u32).max(4);
        imageops::resize(&gray_full, sw, sh, imageops::FilterType::Triangle)
    } else {
        gray_full
    };
    let frame = (gray.width() * gray.height()) as f32;
    let upscale = |p: Point2<f32>| Point2::new(p.x / scale, p.y / scale);

    let in_band =
        |area: f32| area >= params.min_area_frac * frame && area <= params.max_area_frac * frame;

    let mut largest_seen = 0.0f32;
    let mut rect_fallback: Option<(f32, [Point2<f32>; 4])> = None;
    let mut loose_fallback: Option<(f32, [Point2<f32>; 4])> = None;

    for (pass_idx, pass) in params.passes.iter().enumerate() {
        let mask = edge_mask(&gray, pass);
        let contours = outer_contours(&mask);
        if let Some(first) = contours.first() {
            largest_seen = largest_seen.max(first.area / frame);
        }

        let Some(best) = contours.iter().find(|c| in_band(c.area)) else {
            if loose_fallback.is_none() {
                loose_fallback = contours
                    .iter()
                    .filter(|c| {
                        c.area >= params.fallback_min_area_frac * frame
                            && c.area <= params.max_area_frac * frame
                    })
                    .find_map(|c| {
                        let rect = min_area_rect(&c.points)?;
                        (rectangularity(c.area, &rect) >= 0.75).then_some((c.area, rect))
                    });
            }
            log::debug!("rectify pass {pass_idx}: no contour inside the area band");
            continue;
        };

        if let Some((tol, quad)) = strict_quad(&best.points, &params.approx_tolerances) {
            let corners = order_corners(quad).map(upscale);
            log::debug!("rectify pass {pass_idx}: polygon quad at tolerance {tol}");
            return Ok(CardQuad {
                corners,
                source: QuadSource::Polygon {
                    tolerance: tol,
                    pass: pass_idx,
                },
                area_frac: polygon_area(&quad) / frame,
            });
        }

        if rect_fallback.is_none() {
            rect_fallback = min_area_rect(&best.points).map(|r| (best.area, r));
        }
    }

    let fallback = rect_fallback.or(loose_fallback);
    match fallback {
        Some((_, rect)) => {
            let area_frac = polygon_area(&rect) / frame;
            log::debug!("rectify: falling back to min-area rectangle ({area_frac:.3} of frame)");
            Ok(CardQuad {
                corners: order_corners(rect).map(upscale),
                source: QuadSource::MinAreaRect,
                area_frac,
            })
        }
        None => Err(RectifyError::NoCardContour {
            largest_frac: largest_seen,
        }),
    }
}

fn edge_len(a: Point2<f32>, b: Point2<f32>) -> f32 {
    (b - a).norm()
}

/// Reorder so the long side of the quad maps onto the canvas height.
fn portrait_order(corners: [Point2<f32>; 4]) -> [Point2<f32>; 4] {
    let [tl, tr, br, bl] = corners;
    let width = 0.5 * (edge_len(tl, tr) + edge_len(bl, br));
    let height = 0.5 * (edge_len(tl, bl) + edge_len(tr, br));
    if width > height {
        [tr, br, bl, tl]
    } else {
        corners
    }
}

/// Locate the card and warp it onto the canonical canvas.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(img, params), fields(width = img.width(), height = img.height()))
)]
pub fn rectify(img: &RgbImage, params: &RectifyParams) -> Result<Rectification, RectifyError> {
    let mut quad = locate_card(img, params)?;

    let mut refined = false;
    if params.refine_edges {
        if let Some(better) = refine_quad(img, &quad.corners, params.refine_radius) {
            quad.corners = better;
            refined = true;
        }
    }

    let size = params.canvas();
    let target = portrait_order(quad.corners);
    let h = Homography::canvas_to_quad(size, &target).ok_or(RectifyError::DegenerateQuad)?;
    let image = warp_perspective_rgb(img, h, size);
    Ok(Rectification {
        image,
        quad,
        h_img_from_canvas: h,
        refined,
    })
}

/// Fit the whole frame inside the canonical canvas without cropping.
pub fn letterbox(img: &RgbImage, size: CanvasSize, fill: [u8; 3]) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(size.width, size.height, Rgb(fill));
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return canvas;
    }
    let s = (size.width as f32 / w as f32).min(size.height as f32 / h as f32);
    let nw = ((w as f32 * s).round() as u32).clamp(1, size.width);
    let nh = ((h as f32 * s).round() as u32).clamp(1, size.height);
    let resized = imageops::resize(img, nw, nh, imageops::FilterType::CatmullRom);
    let x = (size.width - nw) / 2;
    let y = (size.height - nh) / 2;
    imageops::overlay(&mut canvas, &resized, x as i64, y as i64);
    canvas
}

/// Rectify, or letterbox the whole frame when no card can be located.
pub fn rectify_or_letterbox(img: &RgbImage, params: &RectifyParams) -> CardCanvas {
    match rectify(img, params) {
        Ok(r) => CardCanvas {
            source: CanvasSource::Rectified {
                quad: r.quad.corners.map(|p| [p.x, p.y]),
                source: r.quad.source,
                refined: r.refined,
            },
            image: r.image,
        },
        Err(e) => {
            log::warn!("rectification failed, using letterbox canvas: {e}");
            CardCanvas {
                image: letterbox(img, params.canvas(), params.letterbox_fill),
                source: CanvasSource::Letterbox {
                    reason: e.to_string(),
                },
            }
        }
    }
}
