//! Bubble stages: locating printed bubbles, grouping them into the
//! question/option grid and classifying their fill.

pub mod classify;
pub mod group;
pub mod locate;

pub use classify::{classify_groups, fill_ratio, ClassifiedBubble, ClassifiedGroup, ClassifyConfig};
pub use group::{group_bubbles, BubbleGrid, BubbleGroup, GroupingConfig};
pub use locate::{find_bubble_candidates, locate_bubbles, LocatorConfig};

/// A closed, roughly circular region in the corrected binary image.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BubbleCandidate {
    /// Center `[x, y]` in corrected-frame pixels.
    pub center: [f32; 2],
    /// Radius in pixels (mean of the bounding-box half extents).
    pub radius: f32,
    /// `4π·area / perimeter²`, clamped to `[0, 1]`.
    pub circularity: f32,
}

/// Median of a slice; reorders the input.
pub(crate) fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f32::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some(0.5 * (values[mid - 1] + values[mid]))
    } else {
        Some(values[mid])
    }
}
