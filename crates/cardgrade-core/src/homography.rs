use crate::{sample_bilinear_rgb, CanvasSize};
use image::{Rgb, RgbImage};
use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};

/// Projective map between two planes, `dst ~ H * src`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        [
            [self.h[(0, 0)], self.h[(0, 1)], self.h[(0, 2)]],
            [self.h[(1, 0)], self.h[(1, 1)], self.h[(1, 2)]],
            [self.h[(2, 0)], self.h[(2, 1)], self.h[(2, 2)]],
        ]
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let v = self.h * Vector3::new(p.x as f64, p.y as f64, 1.0);
        let w = v[2];
        Point2::new((v[0] / w) as f32, (v[1] / w) as f32)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }

    /// Map from a canonical canvas of `size` onto the image quad `tl, tr, br, bl`.
    pub fn canvas_to_quad(size: CanvasSize, quad: &[Point2<f32>; 4]) -> Option<Self> {
        let w = size.width as f32;
        let h = size.height as f32;
        let canvas = [
            Point2::new(0.0, 0.0),
            Point2::new(w, 0.0),
            Point2::new(w, h),
            Point2::new(0.0, h),
        ];
        homography_from_4pt(&canvas, quad)
    }
}

fn hartley_normalization(cx: f64, cy: f64, mean_dist: f64) -> Matrix3<f64> {
    let s = if mean_dist > 1e-12 {
        (2.0_f64).sqrt() / mean_dist
    } else {
        1.0
    };

    Matrix3::<f64>::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

/// Translate the four points to their centroid and scale to mean distance sqrt(2).
fn normalize_points4(pts: &[Point2<f32>; 4]) -> ([Point2<f64>; 4], Matrix3<f64>) {
    let (sx, sy) = pts
        .iter()
        .fold((0.0_f64, 0.0_f64), |(x, y), p| (x + p.x as f64, y + p.y as f64));
    let (cx, cy) = (sx / 4.0, sy / 4.0);

    let mean_dist = pts
        .iter()
        .map(|p| (p.x as f64 - cx).hypot(p.y as f64 - cy))
        .sum::<f64>()
        / 4.0;

    let t = hartley_normalization(cx, cy, mean_dist);
    let out = pts.map(|p| {
        let v = t * Vector3::new(p.x as f64, p.y as f64, 1.0);
        Point2::new(v[0], v[1])
    });
    (out, t)
}

fn denormalize(hn: Matrix3<f64>, t_src: Matrix3<f64>, t_dst: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let h = t_dst.try_inverse()? * hn * t_src;
    let s = h[(2, 2)];
    if s.abs() < 1e-12 {
        return None;
    }
    Some(h / s)
}

/// Compute H such that `dst ~ H * src` from exactly four correspondences.
///
/// Corner order must be consistent between `src` and `dst`. Returns `None`
/// for degenerate configurations (three collinear points, repeated corners).
pub fn homography_from_4pt(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Homography> {
    // Unknowns: [h11 h12 h13 h21 h22 h23 h31 h32], with h33 = 1
    let (src_n, t_src) = normalize_points4(src);
    let (dst_n, t_dst) = normalize_points4(dst);

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for k in 0..4 {
        let (x, y) = (src_n[k].x, src_n[k].y);
        let (u, v) = (dst_n[k].x, dst_n[k].y);

        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        let r1 = 2 * k + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let x = a.lu().solve(&b)?;
    if x.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let hn = Matrix3::<f64>::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    );

    denormalize(hn, t_src, t_dst).map(Homography::new)
}

/// Warp onto a canonical canvas: each canvas pixel centre is mapped through
/// `h_img_from_canvas` into the source image and sampled bilinearly.
pub fn warp_perspective_rgb(
    src: &RgbImage,
    h_img_from_canvas: Homography,
    out: CanvasSize,
) -> RgbImage {
    RgbImage::from_fn(out.width, out.height, |x, y| {
        let pc = Point2::new(x as f32 + 0.5, y as f32 + 0.5);
        let pi = h_img_from_canvas.apply(pc);
        // Source pixel (i, j) covers [i, i+1); its centre sits at i + 0.5.
        let s = sample_bilinear_rgb(src, pi.x - 0.5, pi.y - 0.5);
        Rgb(s.map(|v| (v + 0.5).clamp(0.0, 255.0) as u8))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Point2<f32>, b: Point2<f32>, tol: f32) {
        let dx = (a.x - b.x).abs();
        let dy = (a.y - b.y).abs();
        assert!(
            dx < tol && dy < tol,
            "expected ({:.6},{:.6}) ~ ({:.6},{:.6}) within {}",
            a.x,
            a.y,
            b.x,
            b.y,
            tol
        );
    }

    #[test]
    fn inverse_round_trips_points() {
        let h = Homography::new(Matrix3::new(
            1.1, 0.08, 14.0, //
            -0.04, 0.95, 7.0, //
            0.0008, 0.0003, 1.0,
        ));
        let inv = h.inverse().expect("invertible");

        for p in [
            Point2::new(0.0_f32, 0.0),
            Point2::new(63.0_f32, 88.0),
            Point2::new(400.0_f32, 250.0),
        ] {
            assert_close(inv.apply(h.apply(p)), p, 1e-3);
        }
    }

    #[test]
    fn canvas_corners_land_on_quad() {
        let quad = [
            Point2::new(112.0_f32, 60.0),
            Point2::new(380.0, 75.0),
            Point2::new(395.0, 460.0),
            Point2::new(95.0, 440.0),
        ];
        let size = CanvasSize::for_short_side(63);
        let h = Homography::canvas_to_quad(size, &quad).expect("non-degenerate");
        let (w, hh) = (size.width as f32, size.height as f32);
        assert_close(h.apply(Point2::new(0.0, 0.0)), quad[0], 1e-2);
        assert_close(h.apply(Point2::new(w, 0.0)), quad[1], 1e-2);
        assert_close(h.apply(Point2::new(w, hh)), quad[2], 1e-2);
        assert_close(h.apply(Point2::new(0.0, hh)), quad[3], 1e-2);
    }

    #[test]
    fn degenerate_quad_is_rejected() {
        let collapsed = [Point2::new(5.0_f32, 5.0); 4];
        let size = CanvasSize::for_short_side(10);
        assert!(Homography::canvas_to_quad(size, &collapsed).is_none());
    }

    #[test]
    fn identity_warp_copies_pixels() {
        let src = RgbImage::from_fn(20, 28, |x, y| Rgb([(x * 10) as u8, (y * 8) as u8, 77]));
        let size = CanvasSize {
            width: 20,
            height: 28,
        };
        let quad = [
            Point2::new(0.0, 0.0),
            Point2::new(20.0, 0.0),
            Point2::new(20.0, 28.0),
            Point2::new(0.0, 28.0),
        ];
        let h = Homography::canvas_to_quad(size, &quad).unwrap();
        let out = warp_perspective_rgb(&src, h, size);
        assert_eq!(out.dimensions(), (20, 28));
        for (x, y) in [(3, 4), (10, 14), (18, 25)] {
            assert_eq!(out.get_pixel(x, y), src.get_pixel(x, y));
        }
    }
}
