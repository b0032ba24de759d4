//! Bubble candidate extraction from outer contours.
//!
//! Every outer border of the binary image is measured (area, perimeter,
//! bounding box) and kept when it is round enough, square enough and close
//! to the nominal bubble size. Ring outlines and filled disks share the same
//! outer border, so marked and unmarked bubbles are found alike.

use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::point::Point;

use super::{median, BubbleCandidate};
use crate::error::EngineError;
use crate::layout::LayoutConfig;
use crate::preprocess::BinaryImage;

/// Configuration for bubble candidate filtering.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Printed bubble diameter (pixels). `None` estimates it from the sheet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nominal_diameter_px: Option<f32>,
    /// Accepted area range as multiples of the nominal bubble area.
    pub area_range: [f32; 2],
    /// Regions smaller than this (pixels) are never bubbles.
    pub min_area_px: f32,
    /// Minimum `4π·area / perimeter²`.
    pub min_circularity: f32,
    /// Accepted bounding-box width/height range.
    pub aspect_ratio_range: [f32; 2],
    /// Fewer candidates than this fraction of the expected bubble count is fatal.
    pub min_detection_ratio: f32,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            nominal_diameter_px: None,
            area_range: [0.5, 2.0],
            min_area_px: 30.0,
            min_circularity: 0.7,
            aspect_ratio_range: [0.7, 1.3],
            min_detection_ratio: 0.75,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Blob {
    center: [f32; 2],
    radius: f32,
    area: f32,
    circularity: f32,
    aspect: f32,
}

/// Shoelace area and closed polyline length of a traced border.
fn polygon_area_perimeter(points: &[Point<u32>]) -> (f32, f32) {
    let n = points.len();
    let mut twice_area = 0.0f32;
    let mut perimeter = 0.0f32;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        let (ax, ay, bx, by) = (a.x as f32, a.y as f32, b.x as f32, b.y as f32);
        twice_area += ax * by - ay * bx;
        perimeter += ((bx - ax).powi(2) + (by - ay).powi(2)).sqrt();
    }
    (0.5 * twice_area.abs(), perimeter)
}

fn measure(contour: &Contour<u32>) -> Option<Blob> {
    if contour.border_type != BorderType::Outer || contour.points.len() < 3 {
        return None;
    }
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (u32::MAX, u32::MAX, 0u32, 0u32);
    for p in &contour.points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    let bw = (max_x - min_x + 1) as f32;
    let bh = (max_y - min_y + 1) as f32;

    let (poly_area, perimeter) = polygon_area_perimeter(&contour.points);
    if perimeter <= 0.0 {
        return None;
    }
    // The traced border runs through pixel centers; half the perimeter
    // restores the outer half-pixel band.
    let area = poly_area + 0.5 * perimeter + 1.0;
    let circularity =
        (4.0 * std::f32::consts::PI * poly_area / (perimeter * perimeter)).clamp(0.0, 1.0);

    Some(Blob {
        center: [
            0.5 * (min_x + max_x) as f32,
            0.5 * (min_y + max_y) as f32,
        ],
        radius: 0.25 * (bw + bh),
        area,
        circularity,
        aspect: bw / bh,
    })
}

fn passes_shape(blob: &Blob, config: &LocatorConfig) -> bool {
    blob.area >= config.min_area_px
        && blob.circularity >= config.min_circularity
        && blob.aspect >= config.aspect_ratio_range[0]
        && blob.aspect <= config.aspect_ratio_range[1]
}

/// Drop candidates whose center lies inside a larger candidate, e.g. a pen
/// mark that did not touch the printed outline.
fn suppress_nested(mut candidates: Vec<BubbleCandidate>) -> Vec<BubbleCandidate> {
    candidates.sort_by(|a, b| b.radius.total_cmp(&a.radius));
    let mut kept: Vec<BubbleCandidate> = Vec::with_capacity(candidates.len());
    for c in candidates {
        let nested = kept.iter().any(|k| {
            let dx = k.center[0] - c.center[0];
            let dy = k.center[1] - c.center[1];
            dx * dx + dy * dy < k.radius * k.radius
        });
        if !nested {
            kept.push(c);
        }
    }
    kept
}

/// Find all bubble-shaped regions, sorted top-to-bottom then left-to-right.
///
/// Does not check the count against a layout; see [`locate_bubbles`].
pub fn find_bubble_candidates(
    binary: &BinaryImage,
    config: &LocatorConfig,
) -> Vec<BubbleCandidate> {
    let contours: Vec<Contour<u32>> = find_contours(binary.as_gray());
    let shaped: Vec<Blob> = contours
        .iter()
        .filter_map(measure)
        .filter(|b| passes_shape(b, config))
        .collect();

    let nominal_diameter = match config.nominal_diameter_px {
        Some(d) => Some(d),
        None => median(&mut shaped.iter().map(|b| 2.0 * b.radius).collect::<Vec<_>>()),
    };
    let Some(nominal_diameter) = nominal_diameter else {
        tracing::debug!("no bubble-shaped regions among {} contours", contours.len());
        return Vec::new();
    };
    let nominal_area = std::f32::consts::PI * 0.25 * nominal_diameter * nominal_diameter;
    let area_lo = config.area_range[0] * nominal_area;
    let area_hi = config.area_range[1] * nominal_area;

    let sized: Vec<BubbleCandidate> = shaped
        .iter()
        .filter(|b| b.area >= area_lo && b.area <= area_hi)
        .map(|b| BubbleCandidate {
            center: b.center,
            radius: b.radius,
            circularity: b.circularity,
        })
        .collect();

    let mut candidates = suppress_nested(sized);
    candidates.sort_by(|a, b| {
        a.center[1]
            .total_cmp(&b.center[1])
            .then(a.center[0].total_cmp(&b.center[0]))
    });

    tracing::debug!(
        "{} contours, {} shape-filtered, nominal diameter {:.1}px, {} candidates",
        contours.len(),
        shaped.len(),
        nominal_diameter,
        candidates.len()
    );
    candidates
}

/// Bubble locator stage: candidates plus the minimum-count check.
pub fn locate_bubbles(
    binary: &BinaryImage,
    layout: &LayoutConfig,
    config: &LocatorConfig,
) -> Result<Vec<BubbleCandidate>, EngineError> {
    let candidates = find_bubble_candidates(binary, config);
    let expected = layout.expected_bubbles();
    let required = (config.min_detection_ratio * expected as f32).ceil() as usize;
    if candidates.len() < required {
        return Err(EngineError::InsufficientBubblesDetected {
            found: candidates.len(),
            expected,
        });
    }
    tracing::info!("{} bubble candidates (layout expects {})", candidates.len(), expected);
    Ok(candidates)
}
