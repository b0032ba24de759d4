use std::collections::BTreeMap;

use crate::answers::DetectedAnswer;
use crate::deskew::DeskewReport;
use crate::error::EngineWarning;

/// Answers read from a single sheet image.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DetectionResult {
    /// Source image dimensions [width, height].
    pub image_size: [u32; 2],
    /// Answer per 1-based question index.
    pub answers: BTreeMap<u32, DetectedAnswer>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<EngineWarning>,
    /// Per-bubble detail, present only when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugDetail>,
}

impl DetectionResult {
    /// Questions whose answer is not a single clean mark.
    pub fn flagged_questions(&self) -> Vec<u32> {
        self.answers
            .iter()
            .filter(|(_, a)| a.selected().is_none())
            .map(|(&q, _)| q)
            .collect()
    }
}

/// Diagnostic view of the pipeline internals.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DebugDetail {
    pub deskew: DeskewReport,
    /// Median radius of the grouped bubbles (pixels).
    pub bubble_radius_px: f32,
    /// Row-grouping distance that was applied (pixels).
    pub row_grouping_distance_px: f32,
    pub rows: usize,
    /// Every grouped bubble, ordered by question then option.
    pub bubbles: Vec<BubbleDebug>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BubbleDebug {
    pub question: u32,
    pub option: usize,
    /// Center in the deskewed frame.
    pub center: [f32; 2],
    /// Center in source-image pixels.
    pub source_center: [f32; 2],
    pub radius: f32,
    pub circularity: f32,
    pub fill_ratio: f32,
    pub selected: bool,
}
