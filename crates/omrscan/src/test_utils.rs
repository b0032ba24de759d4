//! Shared drawing helpers for image-based unit tests.
//!
//! Sheets are white paper (`PAPER`) with dark ink. Shapes are rasterized by
//! sampling the pixel center against the analytic shape.

use image::{GrayImage, Luma};

use crate::preprocess::{normalize, BinaryImage, NormalizeConfig, RasterImage};

pub(crate) const PAPER: u8 = 235;
pub(crate) const INK: u8 = 25;

/// Uniform paper-colored canvas.
pub(crate) fn blank_sheet(w: u32, h: u32) -> GrayImage {
    GrayImage::from_pixel(w, h, Luma([PAPER]))
}

fn paint_where(
    img: &mut GrayImage,
    center: [f32; 2],
    outer: f32,
    value: u8,
    f: impl Fn(f32) -> bool,
) {
    let (w, h) = img.dimensions();
    let x0 = (center[0] - outer - 1.0).floor().max(0.0) as u32;
    let y0 = (center[1] - outer - 1.0).floor().max(0.0) as u32;
    let x1 = ((center[0] + outer + 1.0).ceil().max(0.0) as u32).min(w);
    let y1 = ((center[1] + outer + 1.0).ceil().max(0.0) as u32).min(h);
    for y in y0..y1 {
        for x in x0..x1 {
            let dx = x as f32 - center[0];
            let dy = y as f32 - center[1];
            if f((dx * dx + dy * dy).sqrt()) {
                img.put_pixel(x, y, Luma([value]));
            }
        }
    }
}

/// Solid disk of radius `radius`.
pub(crate) fn draw_disk(img: &mut GrayImage, center: [f32; 2], radius: f32, value: u8) {
    paint_where(img, center, radius, value, |d| d <= radius);
}

/// Annulus with outer radius `radius` and stroke `thickness`.
pub(crate) fn draw_ring(
    img: &mut GrayImage,
    center: [f32; 2],
    radius: f32,
    thickness: f32,
    value: u8,
) {
    let inner = radius - thickness;
    paint_where(img, center, radius, value, |d| d <= radius && d > inner);
}

/// Printed bubble outline, optionally shaded by a concentric disk covering
/// `coverage` of its area.
pub(crate) fn draw_bubble(img: &mut GrayImage, center: [f32; 2], radius: f32, coverage: f32) {
    draw_ring(img, center, radius, 3.0, INK);
    if coverage > 0.0 {
        draw_disk(img, center, radius * coverage.clamp(0.0, 1.0).sqrt(), INK);
    }
}

/// Small sheet of `rows x options` bubbles with pitches that keep options
/// closer together than rows. Returns the image and the bubble centers in
/// row-major order.
pub(crate) fn bubble_grid(
    rows: usize,
    options: usize,
    radius: f32,
    marks: &[(usize, usize, f32)],
) -> (GrayImage, Vec<[f32; 2]>) {
    let option_pitch = radius * 3.0;
    let row_pitch = radius * 3.6;
    let margin = radius * 3.0;
    let w = (2.0 * margin + option_pitch * options as f32) as u32;
    let h = (2.0 * margin + row_pitch * rows as f32) as u32;
    let mut img = blank_sheet(w, h);
    let mut centers = Vec::with_capacity(rows * options);
    for r in 0..rows {
        for o in 0..options {
            let c = [
                margin + option_pitch * (o as f32 + 0.5),
                margin + row_pitch * (r as f32 + 0.5),
            ];
            let coverage = marks
                .iter()
                .find(|&&(mr, mo, _)| mr == r && mo == o)
                .map_or(0.0, |&(_, _, c)| c);
            draw_bubble(&mut img, c, radius, coverage);
            centers.push(c);
        }
    }
    (img, centers)
}

/// Run the normalizer with default settings.
pub(crate) fn binarize(img: GrayImage) -> BinaryImage {
    let raster = RasterImage::from_gray(img).expect("non-empty test image");
    normalize(&raster, &NormalizeConfig::default())
}
