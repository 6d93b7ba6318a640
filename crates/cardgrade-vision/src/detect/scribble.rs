//! Pen / marker scribble detector.
//!
//! Looks for long, thin, curvy ink strokes in the lower part of the card,
//! away from the artwork. Strokes are measured on the filled ink mask: a
//! printed rule fills its enclosing rectangle, a hand-drawn squiggle leaves
//! most of it empty. Each stroke must also be outlined by Canny edges, so
//! soft ink-coloured shading without a crisp boundary is not counted.

use cardgrade_core::{
    arc_length, bounding_box, min_area_rect, polygon_area, rgb_to_hsv, to_gray, DetectorSignal,
    Region, Roi,
};
use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::morphology::{close, dilate};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScribbleParams {
    pub roi: Roi,
    /// Saturated "pen" hues: `lo < H < hi` on the 0..180 scale.
    pub pen_hue: (u8, u8),
    pub pen_min_saturation: u8,
    pub pen_min_value: u8,
    /// Dark, unsaturated "marker" pixels.
    pub marker_max_value: u8,
    pub marker_max_saturation: u8,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Ink-adjacent edge pixels required per pixel of stroke length.
    pub min_edge_support: f32,
    /// Closing radius bridging pinholes in the ink mask.
    pub close_radius: u8,
    pub min_contour_points: usize,
    /// Filled stroke area bounds, in pixels.
    pub min_area: f32,
    pub max_area: f32,
    /// Long/short side ratio of the minimum-area rectangle.
    pub min_elongation: f32,
    /// A stroke is curvy when its filled area covers at most this share of
    /// its minimum-area rectangle.
    pub max_rect_fill: f32,
    /// Stroke score thresholds; all three must pass to flag.
    pub min_stroke_score: f32,
    pub min_stroke_count: usize,
    pub min_ink_ratio: f32,
}

impl Default for ScribbleParams {
    fn default() -> Self {
        Self {
            roi: Roi::new(0.06, 0.94, 0.40, 0.92),
            pen_hue: (90, 140),
            pen_min_saturation: 60,
            pen_min_value: 40,
            marker_max_value: 60,
            marker_max_saturation: 80,
            canny_low: 70.0,
            canny_high: 160.0,
            min_edge_support: 0.5,
            close_radius: 1,
            min_contour_points: 30,
            min_area: 35.0,
            max_area: 6000.0,
            min_elongation: 2.2,
            max_rect_fill: 0.6,
            min_stroke_score: 1.15,
            min_stroke_count: 3,
            min_ink_ratio: 0.0025,
        }
    }
}

impl ScribbleParams {
    fn is_ink(&self, rgb: [u8; 3]) -> bool {
        let [h, s, v] = rgb_to_hsv(rgb);
        let pen = h > self.pen_hue.0
            && h < self.pen_hue.1
            && s > self.pen_min_saturation
            && v > self.pen_min_value;
        let marker = v < self.marker_max_value && s < self.marker_max_saturation;
        pen || marker
    }
}

/// Shape of one filled ink component.
#[derive(Clone, Copy, Debug)]
struct StrokeShape {
    area: f32,
    /// Centre-line length, half the outer perimeter.
    length: f32,
    elongation: f32,
    rect_fill: f32,
}

fn measure_stroke(pts: &[Point2<f32>]) -> Option<StrokeShape> {
    let area = polygon_area(pts);
    let rect = min_area_rect(pts)?;
    let a = (rect[1] - rect[0]).norm().max(1.0);
    let b = (rect[2] - rect[1]).norm().max(1.0);
    Some(StrokeShape {
        area,
        length: 0.5 * arc_length(pts, true),
        elongation: a.max(b) / a.min(b),
        rect_fill: area / (a * b),
    })
}

/// Edge pixels touching ink inside a contour's bounding box.
fn edge_pixels(
    edges: &GrayImage,
    near_ink: &GrayImage,
    (x0, y0, x1, y1): (f32, f32, f32, f32),
) -> usize {
    let (w, h) = edges.dimensions();
    let (xa, ya) = (x0.max(0.0) as u32, y0.max(0.0) as u32);
    let (xb, yb) = ((x1 as u32 + 1).min(w), (y1 as u32 + 1).min(h));
    (ya..yb)
        .flat_map(|y| (xa..xb).map(move |x| (x, y)))
        .filter(|&(x, y)| edges.get_pixel(x, y).0[0] > 0 && near_ink.get_pixel(x, y).0[0] > 0)
        .count()
}

/// Detect scribbles on a rectified card image.
///
/// Metrics: `stroke_score`, `stroke_count`, `ink_area_ratio`.
pub fn detect_scribble(img: &RgbImage, params: &ScribbleParams) -> DetectorSignal {
    let (w, h) = img.dimensions();
    let Some((rx, ry, rw, rh)) = params.roi.to_pixels(w, h) else {
        return DetectorSignal::none();
    };
    if rw < 3 || rh < 3 {
        return DetectorSignal::none();
    }
    let roi = image::imageops::crop_imm(img, rx, ry, rw, rh).to_image();

    let mut ink = GrayImage::new(rw, rh);
    for (x, y, p) in roi.enumerate_pixels() {
        if params.is_ink(p.0) {
            ink.put_pixel(x, y, Luma([255]));
        }
    }
    if params.close_radius > 0 {
        ink = close(&ink, Norm::LInf, params.close_radius);
    }
    let edges = canny(&to_gray(&roi), params.canny_low, params.canny_high);
    let near_ink = dilate(&ink, Norm::LInf, 1);

    let mut total_len = 0.0f32;
    let mut count = 0usize;
    let mut area_acc = 0.0f32;
    let mut evidence = Vec::new();

    for contour in find_contours::<i32>(&ink) {
        if contour.border_type != BorderType::Outer || contour.parent.is_some() {
            continue;
        }
        if contour.points.len() < params.min_contour_points {
            continue;
        }
        let pts: Vec<Point2<f32>> = contour
            .points
            .iter()
            .map(|p| Point2::new(p.x as f32, p.y as f32))
            .collect();

        let Some(shape) = measure_stroke(&pts) else {
            continue;
        };
        if shape.area < params.min_area || shape.area > params.max_area {
            continue;
        }
        if shape.elongation < params.min_elongation || shape.rect_fill > params.max_rect_fill {
            continue;
        }
        let Some((x0, y0, x1, y1)) = bounding_box(&pts) else {
            continue;
        };
        let support = edge_pixels(&edges, &near_ink, (x0, y0, x1, y1)) as f32;
        if support < params.min_edge_support * shape.length {
            continue;
        }

        total_len += shape.length;
        count += 1;
        area_acc += shape.area;
        evidence.push(Region::from_pixels(
            rx as f32 + x0,
            ry as f32 + y0,
            x1 - x0 + 1.0,
            y1 - y0 + 1.0,
            w,
            h,
        ));
    }

    let diag = (w as f32).hypot(h as f32);
    let stroke_score = if diag > 0.0 {
        total_len / (0.25 * diag) + 0.12 * count as f32
    } else {
        0.0
    };
    let ink_area_ratio = area_acc / (rw * rh).max(1) as f32;
    let confidence = 0.5 * stroke_score + 6.0 * ink_area_ratio;
    let flagged = stroke_score > params.min_stroke_score
        && count >= params.min_stroke_count
        && ink_area_ratio > params.min_ink_ratio;

    if flagged {
        log::info!(
            "scribble detected: {count} strokes, stroke score {stroke_score:.2}, ink ratio {ink_area_ratio:.4}"
        );
    }

    DetectorSignal::new(flagged, confidence)
        .with_evidence(evidence)
        .with_metric("stroke_score", stroke_score as f64)
        .with_metric("stroke_count", count as f64)
        .with_metric("ink_area_ratio", ink_area_ratio as f64)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::Rgb;

    pub(crate) fn blank_card() -> RgbImage {
        RgbImage::from_pixel(315, 440, Rgb([232, 226, 212]))
    }

    /// Stamp thick sinusoidal pen strokes across the lower half of the card.
    pub(crate) fn scribble_on(img: &mut RgbImage, strokes: usize, ink: [u8; 3]) {
        let radius = 3.5f32;
        for s in 0..strokes {
            let base = 210.0 + 45.0 * s as f32;
            let mut t = 50.0f32;
            while t < 265.0 {
                let cy = base + 12.0 * (t / 9.0).sin();
                let r = radius.ceil() as i32;
                for dy in -r..=r {
                    for dx in -r..=r {
                        if ((dx * dx + dy * dy) as f32) > radius * radius {
                            continue;
                        }
                        let x = t as i32 + dx;
                        let y = cy as i32 + dy;
                        if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
                            img.put_pixel(x as u32, y as u32, Rgb(ink));
                        }
                    }
                }
                t += 0.5;
            }
        }
    }

    #[test]
    fn clean_card_is_not_flagged() {
        let s = detect_scribble(&blank_card(), &ScribbleParams::default());
        assert!(!s.flagged);
        assert_eq!(s.confidence, 0.0);
        assert_eq!(s.metric("stroke_count"), Some(0.0));
    }

    #[test]
    fn blue_pen_scribbles_are_flagged() {
        let mut img = blank_card();
        scribble_on(&mut img, 4, [30, 60, 200]);
        let s = detect_scribble(&img, &ScribbleParams::default());
        assert!(s.flagged, "{s:?}");
        assert!(s.confidence > 0.88);
        assert_eq!(s.metric("stroke_count"), Some(4.0));
        assert_eq!(s.evidence.len(), 4);
        assert!(s.metric("ink_area_ratio").unwrap() > 0.0025);
    }

    #[test]
    fn filled_stroke_is_thin_and_curvy() {
        let mut img = blank_card();
        scribble_on(&mut img, 1, [30, 60, 200]);
        let s = detect_scribble(&img, &ScribbleParams::default());
        assert!(!s.flagged, "a single stroke is below the count threshold");
        assert_eq!(s.metric("stroke_count"), Some(1.0));
        let region = s.evidence[0];
        assert!(region.w > 0.6 && region.h < 0.12, "{region:?}");
    }

    #[test]
    fn printed_rule_fills_its_rectangle() {
        let pts: Vec<Point2<f32>> = [(0.0, 0.0), (239.0, 0.0), (239.0, 3.0), (0.0, 3.0)]
            .into_iter()
            .map(|(x, y)| Point2::new(x, y))
            .collect();
        let shape = measure_stroke(&pts).unwrap();
        assert!(shape.elongation > 50.0);
        assert!(shape.rect_fill > 0.99);
        assert!(shape.rect_fill > ScribbleParams::default().max_rect_fill);
    }

    #[test]
    fn straight_printed_rule_is_ignored() {
        let mut img = blank_card();
        for y in 300..304 {
            for x in 40..280 {
                img.put_pixel(x, y, Rgb([20, 20, 20]));
            }
        }
        let s = detect_scribble(&img, &ScribbleParams::default());
        assert!(!s.flagged);
        assert_eq!(s.metric("stroke_count"), Some(0.0));
    }

    #[test]
    fn edgeless_ink_is_not_a_stroke() {
        let mut img = blank_card();
        scribble_on(&mut img, 4, [30, 60, 200]);
        let params = ScribbleParams {
            canny_low: 5000.0,
            canny_high: 6000.0,
            ..ScribbleParams::default()
        };
        let s = detect_scribble(&img, &params);
        assert!(!s.flagged);
        assert_eq!(s.metric("stroke_count"), Some(0.0));
    }

    #[test]
    fn ink_mask_accepts_pen_and_marker_hues() {
        let p = ScribbleParams::default();
        assert!(p.is_ink([30, 60, 200]));
        assert!(p.is_ink([15, 15, 15]));
        assert!(!p.is_ink([232, 226, 212]));
        assert!(!p.is_ink([220, 40, 40]));
    }
}
