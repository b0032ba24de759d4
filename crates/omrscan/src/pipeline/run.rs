use crate::answers::map_answers;
use crate::bubble::{
    classify_groups, find_bubble_candidates, group_bubbles, locate_bubbles, median,
    ClassifiedGroup,
};
use crate::config::EngineConfig;
use crate::deskew::{correct_skew, DeskewTransform};
use crate::error::EngineError;
use crate::layout::LayoutConfig;
use crate::preprocess::{normalize_with_block_radius, BinaryImage, RasterImage};

use super::result::{BubbleDebug, DebugDetail, DetectionResult};

fn bubble_debug(groups: &[ClassifiedGroup], transform: &DeskewTransform) -> Vec<BubbleDebug> {
    groups
        .iter()
        .flat_map(|g| {
            g.bubbles.iter().map(move |b| BubbleDebug {
                question: g.question,
                option: b.option,
                center: b.candidate.center,
                source_center: transform.to_source(b.candidate.center),
                radius: b.candidate.radius,
                circularity: b.candidate.circularity,
                fill_ratio: b.fill_ratio,
                selected: b.selected,
            })
        })
        .collect()
}

/// Binarize with a local-mean window scaled to the printed bubbles.
///
/// The bubble radius is the configured nominal diameter, or the median
/// outline radius found on a first pass with the size-derived window. The
/// outer border of a filled bubble survives a too-narrow window even when
/// its center does not, so the first pass still measures the radius.
fn binarize_sheet(image: &RasterImage, config: &EngineConfig) -> BinaryImage {
    let (w, h) = image.dimensions();
    let norm = &config.normalize;
    if let Some(d) = config.locator.nominal_diameter_px {
        let block_radius = norm.block_radius_for_bubbles(w, h, 0.5 * d);
        return normalize_with_block_radius(image, norm, block_radius);
    }

    let base = norm.effective_block_radius(w, h);
    let first = normalize_with_block_radius(image, norm, base);
    let mut radii: Vec<f32> = find_bubble_candidates(&first, &config.locator)
        .iter()
        .map(|c| c.radius)
        .collect();
    let Some(radius) = median(&mut radii) else {
        return first;
    };
    let block_radius = norm.block_radius_for_bubbles(w, h, radius);
    if block_radius <= base {
        return first;
    }
    tracing::debug!(
        "bubble radius {:.1}px, widening block radius {} -> {}",
        radius,
        base,
        block_radius
    );
    normalize_with_block_radius(image, norm, block_radius)
}

/// Run normalize -> deskew -> locate -> group -> classify -> map on one image.
pub(crate) fn detect_answers(
    image: &RasterImage,
    layout: &LayoutConfig,
    config: &EngineConfig,
    debug: bool,
) -> Result<DetectionResult, EngineError> {
    layout.validate()?;
    let (w, h) = image.dimensions();
    tracing::info!(
        "evaluating {}x{} sheet: {} questions x {} options in {} column(s)",
        w,
        h,
        layout.total_questions,
        layout.options_per_question,
        layout.columns
    );

    let binary = binarize_sheet(image, config);
    let deskewed = correct_skew(binary, layout, &config.locator, &config.deskew);
    let candidates = locate_bubbles(&deskewed.image, layout, &config.locator)?;
    let grid = group_bubbles(candidates, layout, &config.grouping)?;
    let classified = classify_groups(
        &deskewed.image,
        &grid.groups,
        layout.fill_threshold,
        &config.classify,
    );
    let answers = map_answers(&classified);

    let debug = debug.then(|| DebugDetail {
        deskew: deskewed.report.clone(),
        bubble_radius_px: grid.bubble_radius,
        row_grouping_distance_px: grid.row_distance,
        rows: grid.rows,
        bubbles: bubble_debug(&classified, &deskewed.report.transform),
    });

    Ok(DetectionResult {
        image_size: [w, h],
        answers,
        warnings: deskewed.warning.into_iter().collect(),
        debug,
    })
}
