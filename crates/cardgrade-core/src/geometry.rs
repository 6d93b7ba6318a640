//! Planar polygon helpers used by card localization.
//!
//! Points are `nalgebra::Point2<f32>` in pixel coordinates (x right, y down).

use nalgebra::Point2;

/// Line `a*x + b*y + c = 0` with `(a, b)` normalized to unit length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Line {
    pub a: f32,
    pub b: f32,
    pub c: f32,
}

impl Line {
    /// Signed distance of `p` from the line.
    pub fn distance(&self, p: Point2<f32>) -> f32 {
        self.a * p.x + self.b * p.y + self.c
    }

    /// Same line shifted by `offset` pixels along its normal.
    pub fn shifted(&self, offset: f32) -> Self {
        Self {
            c: self.c - offset,
            ..*self
        }
    }
}

/// Absolute polygon area (shoelace).
pub fn polygon_area(pts: &[Point2<f32>]) -> f32 {
    if pts.len() < 3 {
        return 0.0;
    }
    let mut acc = 0.0f64;
    for i in 0..pts.len() {
        let p = pts[i];
        let q = pts[(i + 1) % pts.len()];
        acc += p.x as f64 * q.y as f64 - q.x as f64 * p.y as f64;
    }
    (acc.abs() * 0.5) as f32
}

/// Length of a polyline; `closed` adds the segment back to the first point.
pub fn arc_length(pts: &[Point2<f32>], closed: bool) -> f32 {
    if pts.len() < 2 {
        return 0.0;
    }
    let mut len: f32 = pts.windows(2).map(|w| (w[1] - w[0]).norm()).sum();
    if closed {
        len += (pts[0] - pts[pts.len() - 1]).norm();
    }
    len
}

fn distance_to_chord(p: Point2<f32>, a: Point2<f32>, b: Point2<f32>) -> f32 {
    let ab = b - a;
    let len = ab.norm();
    if len <= f32::EPSILON {
        return (p - a).norm();
    }
    ((p - a).perp(&ab)).abs() / len
}

/// Indices kept by Douglas–Peucker on the open polyline `pts[start..=end]`.
fn simplify_indices(pts: &[Point2<f32>], epsilon: f32, keep: &mut [bool]) {
    let n = pts.len();
    if n < 2 {
        return;
    }
    keep[0] = true;
    keep[n - 1] = true;
    let mut stack = vec![(0usize, n - 1)];
    while let Some((s, e)) = stack.pop() {
        if e <= s + 1 {
            continue;
        }
        let mut idx = s;
        let mut dmax = 0.0f32;
        for (i, &p) in pts.iter().enumerate().take(e).skip(s + 1) {
            let d = distance_to_chord(p, pts[s], pts[e]);
            if d > dmax {
                dmax = d;
                idx = i;
            }
        }
        if dmax > epsilon {
            keep[idx] = true;
            stack.push((s, idx));
            stack.push((idx, e));
        }
    }
}

/// Douglas–Peucker polygon simplification.
///
/// Closed curves are split at the vertex farthest from the first point so the
/// result does not depend on where the contour tracing started.
pub fn approx_polygon_dp(pts: &[Point2<f32>], epsilon: f32, closed: bool) -> Vec<Point2<f32>> {
    if pts.len() < 3 {
        return pts.to_vec();
    }
    if !closed {
        let mut keep = vec![false; pts.len()];
        simplify_indices(pts, epsilon, &mut keep);
        return pts
            .iter()
            .zip(keep)
            .filter_map(|(p, k)| k.then_some(*p))
            .collect();
    }

    let far = pts
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            let da = (*a - pts[0]).norm_squared();
            let db = (*b - pts[0]).norm_squared();
            da.total_cmp(&db)
        })
        .map(|(i, _)| i)
        .unwrap_or(0);
    if far == 0 {
        return vec![pts[0]];
    }

    let first = &pts[..=far];
    let mut second: Vec<Point2<f32>> = pts[far..].to_vec();
    second.push(pts[0]);

    let mut keep_a = vec![false; first.len()];
    simplify_indices(first, epsilon, &mut keep_a);
    let mut keep_b = vec![false; second.len()];
    simplify_indices(&second, epsilon, &mut keep_b);

    let mut out: Vec<Point2<f32>> = first
        .iter()
        .zip(keep_a)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect();
    // `second` starts at `far` (already emitted) and ends at pts[0] (already emitted).
    let tail = second.len() - 1;
    out.extend(
        second
            .iter()
            .zip(keep_b)
            .enumerate()
            .filter(|(i, _)| *i != 0 && *i != tail)
            .filter_map(|(_, (p, k))| k.then_some(*p)),
    );
    out
}

/// True when the closed polygon turns consistently in one direction.
pub fn is_convex(poly: &[Point2<f32>]) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0.0f32;
    for i in 0..n {
        let a = poly[i];
        let b = poly[(i + 1) % n];
        let c = poly[(i + 2) % n];
        let cross = (b - a).perp(&(c - b));
        if cross.abs() <= 1e-6 {
            continue;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    sign != 0.0
}

/// Convex hull (Andrew's monotone chain), counter-clockwise in a y-up frame.
pub fn convex_hull(pts: &[Point2<f32>]) -> Vec<Point2<f32>> {
    let mut p: Vec<Point2<f32>> = pts.to_vec();
    p.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    p.dedup();
    if p.len() < 3 {
        return p;
    }

    let cross = |o: Point2<f32>, a: Point2<f32>, b: Point2<f32>| (a - o).perp(&(b - o));
    let mut hull: Vec<Point2<f32>> = Vec::with_capacity(p.len() * 2);
    for &pt in &p {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], pt) <= 0.0 {
            hull.pop();
        }
        hull.push(pt);
    }
    let lower = hull.len() + 1;
    for &pt in p.iter().rev().skip(1) {
        while hull.len() >= lower && cross(hull[hull.len() - 2], hull[hull.len() - 1], pt) <= 0.0
        {
            hull.pop();
        }
        hull.push(pt);
    }
    hull.pop();
    hull
}

/// Minimum-area enclosing rectangle via rotating calipers over the convex hull.
///
/// Returns `None` when the points are degenerate (fewer than three distinct,
/// non-collinear points).
pub fn min_area_rect(pts: &[Point2<f32>]) -> Option<[Point2<f32>; 4]> {
    let hull = convex_hull(pts);
    if hull.len() < 3 {
        return None;
    }

    let mut best: Option<(f32, [Point2<f32>; 4])> = None;
    for i in 0..hull.len() {
        let a = hull[i];
        let b = hull[(i + 1) % hull.len()];
        let edge = b - a;
        let len = edge.norm();
        if len <= f32::EPSILON {
            continue;
        }
        let u = edge / len;
        let v = nalgebra::Vector2::new(-u.y, u.x);

        let (mut min_u, mut max_u, mut min_v, mut max_v) =
            (f32::INFINITY, f32::NEG_INFINITY, f32::INFINITY, f32::NEG_INFINITY);
        for p in &hull {
            let d = p - a;
            let pu = d.dot(&u);
            let pv = d.dot(&v);
            min_u = min_u.min(pu);
            max_u = max_u.max(pu);
            min_v = min_v.min(pv);
            max_v = max_v.max(pv);
        }
        let area = (max_u - min_u) * (max_v - min_v);
        if best.as_ref().is_none_or(|(a0, _)| area < *a0) {
            let corner = |su: f32, sv: f32| a + u * su + v * sv;
            best = Some((
                area,
                [
                    corner(min_u, min_v),
                    corner(max_u, min_v),
                    corner(max_u, max_v),
                    corner(min_u, max_v),
                ],
            ));
        }
    }
    best.filter(|(area, _)| *area > f32::EPSILON)
        .map(|(_, rect)| rect)
}

/// Order four corners as top-left, top-right, bottom-right, bottom-left.
///
/// Uses the coordinate sum (TL smallest, BR largest) and difference `y - x`
/// (TR smallest, BL largest).
pub fn order_corners(pts: [Point2<f32>; 4]) -> [Point2<f32>; 4] {
    let by = |key: &dyn Fn(&Point2<f32>) -> f32, max: bool| -> Point2<f32> {
        let it = pts.iter().copied();
        let pick = if max {
            it.max_by(|a, b| key(a).total_cmp(&key(b)))
        } else {
            it.min_by(|a, b| key(a).total_cmp(&key(b)))
        };
        pick.unwrap_or(pts[0])
    };
    let sum = |p: &Point2<f32>| p.x + p.y;
    let diff = |p: &Point2<f32>| p.y - p.x;
    [
        by(&sum, false),
        by(&diff, false),
        by(&sum, true),
        by(&diff, true),
    ]
}

/// `(min_x, min_y, max_x, max_y)` of a point set; `None` when empty.
pub fn bounding_box(pts: &[Point2<f32>]) -> Option<(f32, f32, f32, f32)> {
    let first = pts.first()?;
    Some(pts.iter().fold(
        (first.x, first.y, first.x, first.y),
        |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
    ))
}

/// Line through two points; `None` when they coincide.
pub fn line_through(p: Point2<f32>, q: Point2<f32>) -> Option<Line> {
    let d = q - p;
    let len = d.norm();
    if len <= f32::EPSILON {
        return None;
    }
    let a = -d.y / len;
    let b = d.x / len;
    Some(Line {
        a,
        b,
        c: -(a * p.x + b * p.y),
    })
}

/// Intersection of two lines; `None` when (nearly) parallel.
pub fn intersect_lines(l1: Line, l2: Line) -> Option<Point2<f32>> {
    let det = l1.a * l2.b - l2.a * l1.b;
    if det.abs() < 1e-6 {
        return None;
    }
    let x = (l1.b * l2.c - l2.b * l1.c) / det;
    let y = (l2.a * l1.c - l1.a * l2.c) / det;
    Some(Point2::new(x, y))
}
