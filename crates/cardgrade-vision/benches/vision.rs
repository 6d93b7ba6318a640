use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{Rgb, RgbImage};

use cardgrade_vision::{
    normalize_colors, rectify_or_letterbox, run_detectors, ColorParams, DetectorParams,
    RectifyParams,
};

/// A light card rotated by a few degrees on a dark table.
fn synthetic_photo(width: u32, height: u32) -> RgbImage {
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    let hh = height as f32 * 0.36;
    let hw = hh * 63.0 / 88.0;
    let (s, c) = 4.0f32.to_radians().sin_cos();
    RgbImage::from_fn(width, height, |x, y| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        let u = c * dx + s * dy;
        let v = -s * dx + c * dy;
        if u.abs() <= hw && v.abs() <= hh {
            Rgb([236, 228, 212])
        } else {
            Rgb([38, 44, 52])
        }
    })
}

fn bench_rectify(c: &mut Criterion) {
    let img = synthetic_photo(1600, 1200);
    let params = RectifyParams::default();
    c.bench_function("rectify_1600x1200", |b| {
        b.iter(|| rectify_or_letterbox(black_box(&img), black_box(&params)))
    });
}

fn bench_detectors(c: &mut Criterion) {
    let img = RgbImage::from_fn(1000, 1397, |x, y| {
        let t = ((x / 25 + y / 25) % 2) as u8;
        Rgb([200 + 20 * t, 190 + 20 * t, 170 + 20 * t])
    });
    let params = DetectorParams::default();
    c.bench_function("detectors_1000x1397", |b| {
        b.iter(|| run_detectors(Some(black_box(&img)), black_box(&params)))
    });
}

fn bench_color(c: &mut Criterion) {
    let img = synthetic_photo(1000, 1397);
    let params = ColorParams::default();
    c.bench_function("normalize_colors_1000x1397", |b| {
        b.iter(|| normalize_colors(black_box(&img), black_box(&params)))
    });
}

criterion_group!(benches, bench_rectify, bench_detectors, bench_color);
criterion_main!(benches);
