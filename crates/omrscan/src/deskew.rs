//! Skew estimation and correction.
//!
//! The rotation is measured from the bubbles themselves. Every bubble-shaped
//! blob is linked to its nearest neighbours, which on a printed sheet are
//! the adjacent options and the adjacent rows. Folded modulo 90 degrees these
//! links agree on the grid orientation. Which of the two grid axes carries
//! the rows is settled by the layout: rows split into whole questions.
//!
//! Correction rotates the binary image onto an expanded canvas so no sheet
//! corner is clipped. [`DeskewTransform`] maps corrected-frame coordinates
//! back into the source image.

use image::{GrayImage, Luma};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use nalgebra::{Point2, Rotation2, Vector2};

use crate::bubble::{find_bubble_candidates, median, BubbleCandidate, LocatorConfig};
use crate::error::EngineWarning;
use crate::layout::LayoutConfig;
use crate::preprocess::BinaryImage;

/// Configuration for skew correction.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DeskewConfig {
    /// Disable to process every sheet unrotated.
    pub enabled: bool,
    /// Angles below this magnitude (degrees) are left uncorrected.
    pub tolerance_deg: f32,
    /// Estimates beyond this magnitude (degrees) are rejected as unreliable.
    pub max_angle_deg: f32,
    /// Minimum number of blobs needed for an estimate.
    pub min_blobs: usize,
    /// Nearest neighbours linked from every blob.
    pub neighbours: usize,
    /// Link-angle histogram bin width (degrees).
    pub histogram_bin_deg: f32,
    /// Links within this many degrees of the histogram peak are averaged.
    pub refine_window_deg: f32,
}

impl Default for DeskewConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tolerance_deg: 0.5,
            max_angle_deg: 45.0,
            min_blobs: 2,
            neighbours: 4,
            histogram_bin_deg: 1.0,
            refine_window_deg: 3.0,
        }
    }
}

/// Rigid rotation between the source image and the corrected canvas.
///
/// Both frames rotate about their own canvas center; `angle_deg` is the
/// measured sheet rotation (positive when rows descend to the right).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DeskewTransform {
    pub angle_deg: f32,
    pub source_size: [u32; 2],
    pub corrected_size: [u32; 2],
}

impl DeskewTransform {
    pub fn identity(width: u32, height: u32) -> Self {
        Self {
            angle_deg: 0.0,
            source_size: [width, height],
            corrected_size: [width, height],
        }
    }

    /// Transform undoing a measured rotation of `angle_deg`; the corrected
    /// canvas is grown to hold every rotated corner.
    pub fn undo_rotation(angle_deg: f32, width: u32, height: u32) -> Self {
        let (s, c) = angle_deg.to_radians().sin_cos();
        let (w, h) = (width as f32, height as f32);
        let cw = (w * c.abs() + h * s.abs()).ceil().max(1.0) as u32;
        let ch = (w * s.abs() + h * c.abs()).ceil().max(1.0) as u32;
        Self {
            angle_deg,
            source_size: [width, height],
            corrected_size: [cw, ch],
        }
    }

    pub fn is_identity(&self) -> bool {
        self.angle_deg == 0.0 && self.source_size == self.corrected_size
    }

    fn source_center(&self) -> Vector2<f32> {
        Vector2::new(
            0.5 * self.source_size[0] as f32,
            0.5 * self.source_size[1] as f32,
        )
    }

    fn corrected_center(&self) -> Vector2<f32> {
        Vector2::new(
            0.5 * self.corrected_size[0] as f32,
            0.5 * self.corrected_size[1] as f32,
        )
    }

    /// Map a corrected-frame point back into source-image pixels.
    pub fn to_source(&self, p: [f32; 2]) -> [f32; 2] {
        if self.is_identity() {
            return p;
        }
        let rot = Rotation2::new(self.angle_deg.to_radians());
        let q = rot * (Point2::new(p[0], p[1]) - self.corrected_center()) + self.source_center();
        [q.x, q.y]
    }

    /// Map a source-image point into the corrected frame.
    pub fn to_corrected(&self, p: [f32; 2]) -> [f32; 2] {
        let rot = Rotation2::new(-self.angle_deg.to_radians());
        let q = rot * (Point2::new(p[0], p[1]) - self.source_center()) + self.corrected_center();
        [q.x, q.y]
    }

    /// Source -> corrected projection for `warp_into`.
    fn projection(&self) -> Projection {
        let cs = self.source_center();
        let cc = self.corrected_center();
        Projection::translate(cc.x, cc.y)
            * Projection::rotate(-self.angle_deg.to_radians())
            * Projection::translate(-cs.x, -cs.y)
    }
}

/// What the skew corrector measured and did.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DeskewReport {
    /// Measured rotation in degrees; `None` when too few blobs were found.
    pub estimated_angle_deg: Option<f32>,
    /// Whether the image was resampled.
    pub applied: bool,
    /// Blobs that contributed to the estimate.
    pub blobs_used: usize,
    pub transform: DeskewTransform,
}

/// Output of [`correct_skew`].
#[derive(Debug, Clone)]
pub struct Deskewed {
    pub image: BinaryImage,
    pub report: DeskewReport,
    pub warning: Option<EngineWarning>,
}

fn fold_half_turn(deg: f32) -> f32 {
    if deg > 90.0 {
        deg - 180.0
    } else if deg <= -90.0 {
        deg + 180.0
    } else {
        deg
    }
}

/// Fold into `(-45, 45]`: row and column links of a grid coincide.
fn fold_quarter_turn(deg: f32) -> f32 {
    let d = deg.rem_euclid(90.0);
    if d > 45.0 {
        d - 90.0
    } else {
        d
    }
}

/// Grid orientation modulo 90 degrees, in `(-45, 45]`.
///
/// Every blob is linked to its `neighbours` nearest blobs; the folded link
/// angles are histogrammed and the links near the peak are averaged.
pub fn estimate_grid_angle_deg(
    candidates: &[BubbleCandidate],
    config: &DeskewConfig,
) -> Option<f32> {
    if candidates.len() < 2 {
        return None;
    }
    let k = config.neighbours.max(1);
    let mut angles = Vec::with_capacity(candidates.len() * k);
    let mut links: Vec<(f32, f32, f32)> = Vec::with_capacity(candidates.len());
    for (i, a) in candidates.iter().enumerate() {
        links.clear();
        links.extend(
            candidates
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, b)| {
                    let dx = b.center[0] - a.center[0];
                    let dy = b.center[1] - a.center[1];
                    (dx * dx + dy * dy, dx, dy)
                }),
        );
        links.sort_by(|l, r| l.0.total_cmp(&r.0));
        angles.extend(
            links
                .iter()
                .take(k)
                .map(|&(_, dx, dy)| fold_quarter_turn(dy.atan2(dx).to_degrees())),
        );
    }

    let bins = (90.0 / config.histogram_bin_deg.clamp(0.1, 45.0)).round().max(1.0) as usize;
    let bin_width = 90.0 / bins as f32;
    let mut hist = vec![0usize; bins];
    for &a in &angles {
        let idx = ((a + 45.0) / bin_width).floor() as usize % bins;
        hist[idx] += 1;
    }
    let smoothed = |i: usize| hist[(i + bins - 1) % bins] + hist[i] + hist[(i + 1) % bins];
    let peak = (0..bins).max_by_key(|&i| smoothed(i))?;
    let center = -45.0 + (peak as f32 + 0.5) * bin_width;

    let near: Vec<f32> = angles
        .iter()
        .map(|&a| fold_quarter_turn(a - center))
        .filter(|d| d.abs() <= config.refine_window_deg)
        .collect();
    if near.is_empty() {
        return Some(fold_quarter_turn(center));
    }
    let mean = near.iter().sum::<f32>() / near.len() as f32;
    Some(fold_quarter_turn(center + mean))
}

/// Sizes of the lines of blobs running along `direction_deg`; blobs whose
/// perpendicular offsets differ by no more than `gap` share a line.
fn line_sizes(candidates: &[BubbleCandidate], direction_deg: f32, gap: f32) -> Vec<usize> {
    let (s, c) = direction_deg.to_radians().sin_cos();
    let mut offsets: Vec<f32> = candidates
        .iter()
        .map(|b| c * b.center[1] - s * b.center[0])
        .collect();
    offsets.sort_by(f32::total_cmp);
    let mut sizes = Vec::new();
    let mut run = 0usize;
    for (i, &o) in offsets.iter().enumerate() {
        if i > 0 && o - offsets[i - 1] > gap {
            sizes.push(run);
            run = 0;
        }
        run += 1;
    }
    if run > 0 {
        sizes.push(run);
    }
    sizes
}

/// How well lines along a direction look like printed rows: the share of
/// lines holding whole questions, then the distance from the expected row count.
fn row_fit(sizes: &[usize], layout: &LayoutConfig) -> (f32, usize) {
    if sizes.is_empty() {
        return (0.0, usize::MAX);
    }
    let options = layout.options_per_question.max(1);
    let whole = sizes.iter().filter(|&&n| n % options == 0).count();
    (
        whole as f32 / sizes.len() as f32,
        sizes.len().abs_diff(layout.rows_per_column()),
    )
}

/// Pick the row direction, `grid_angle_deg` or the perpendicular axis, as
/// the one whose lines split into whole questions of the layout. Ties keep
/// the smaller rotation.
pub fn resolve_row_direction(
    candidates: &[BubbleCandidate],
    grid_angle_deg: f32,
    layout: &LayoutConfig,
) -> f32 {
    let gap = median(&mut candidates.iter().map(|c| c.radius).collect::<Vec<_>>())
        .unwrap_or(1.0)
        .max(1.0);
    let across = fold_half_turn(grid_angle_deg + 90.0);
    let along_fit = row_fit(&line_sizes(candidates, grid_angle_deg, gap), layout);
    let across_fit = row_fit(&line_sizes(candidates, across, gap), layout);
    tracing::debug!(
        "row direction {:.2} deg fit {:?}, {:.2} deg fit {:?}",
        grid_angle_deg,
        along_fit,
        across,
        across_fit
    );
    let prefer_across = across_fit.0 > along_fit.0
        || (across_fit.0 == along_fit.0 && across_fit.1 < along_fit.1);
    if prefer_across {
        across
    } else {
        grid_angle_deg
    }
}

/// Sheet rotation in degrees, in `(-90, 90]`: the direction of the printed
/// rows, positive when rows descend to the right.
pub fn estimate_skew_deg(
    candidates: &[BubbleCandidate],
    layout: &LayoutConfig,
    config: &DeskewConfig,
) -> Option<f32> {
    let grid = estimate_grid_angle_deg(candidates, config)?;
    Some(resolve_row_direction(candidates, grid, layout))
}

fn rotate_binary(binary: &BinaryImage, transform: &DeskewTransform) -> BinaryImage {
    let [w, h] = transform.corrected_size;
    let mut out = GrayImage::new(w, h);
    warp_into(
        binary.as_gray(),
        &transform.projection(),
        Interpolation::Nearest,
        Luma([0u8]),
        &mut out,
    );
    BinaryImage::from_mask(out)
}

fn unrotated(
    binary: BinaryImage,
    estimated_angle_deg: Option<f32>,
    blobs_used: usize,
    warning: Option<EngineWarning>,
) -> Deskewed {
    let (w, h) = binary.dimensions();
    Deskewed {
        image: binary,
        report: DeskewReport {
            estimated_angle_deg,
            applied: false,
            blobs_used,
            transform: DeskewTransform::identity(w, h),
        },
        warning,
    }
}

/// Skew corrector stage.
///
/// Never fails: an unreliable estimate leaves the image untouched and
/// attaches a [`EngineWarning::DeskewUnreliable`].
pub fn correct_skew(
    binary: BinaryImage,
    layout: &LayoutConfig,
    locator: &LocatorConfig,
    config: &DeskewConfig,
) -> Deskewed {
    if !config.enabled {
        return unrotated(binary, None, 0, None);
    }

    let blobs = find_bubble_candidates(&binary, locator);
    if blobs.len() < config.min_blobs.max(2) {
        let reason = format!("only {} bubble-shaped blobs to measure rotation", blobs.len());
        tracing::warn!("deskew unreliable: {}", reason);
        let n = blobs.len();
        return unrotated(
            binary,
            None,
            n,
            Some(EngineWarning::DeskewUnreliable {
                angle_deg: None,
                reason,
            }),
        );
    }

    let Some(angle) = estimate_skew_deg(&blobs, layout, config) else {
        return unrotated(binary, None, blobs.len(), None);
    };

    if angle.abs() > config.max_angle_deg {
        let reason = format!(
            "estimated rotation {angle:.2} deg exceeds the {:.1} deg limit",
            config.max_angle_deg
        );
        tracing::warn!("deskew unreliable: {}", reason);
        return unrotated(
            binary,
            Some(angle),
            blobs.len(),
            Some(EngineWarning::DeskewUnreliable {
                angle_deg: Some(angle),
                reason,
            }),
        );
    }

    if angle.abs() < config.tolerance_deg {
        tracing::debug!("skew {:.3} deg below tolerance, not resampling", angle);
        return unrotated(binary, Some(angle), blobs.len(), None);
    }

    let (w, h) = binary.dimensions();
    let transform = DeskewTransform::undo_rotation(angle, w, h);
    let image = rotate_binary(&binary, &transform);
    tracing::info!(
        "deskewed by {:.2} deg ({} blobs), canvas {}x{} -> {}x{}",
        angle,
        blobs.len(),
        w,
        h,
        transform.corrected_size[0],
        transform.corrected_size[1]
    );
    Deskewed {
        image,
        report: DeskewReport {
            estimated_angle_deg: Some(angle),
            applied: true,
            blobs_used: blobs.len(),
            transform,
        },
        warning: None,
    }
}
