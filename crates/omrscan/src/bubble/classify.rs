//! Fill measurement and per-question decisions.

use super::{BubbleCandidate, BubbleGroup};
use crate::answers::DetectedAnswer;
use crate::preprocess::BinaryImage;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ClassifyConfig {
    /// Radius of the sampled interior disk as a fraction of the bubble
    /// radius. Keeps the printed outline out of the measurement.
    pub interior_radius_frac: f32,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            interior_radius_frac: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClassifiedBubble {
    pub candidate: BubbleCandidate,
    /// 0-based option index within the question.
    pub option: usize,
    /// Ink fraction of the interior disk, in `[0, 1]`.
    pub fill_ratio: f32,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedGroup {
    pub question: u32,
    pub bubbles: Vec<ClassifiedBubble>,
    pub answer: DetectedAnswer,
}

/// Ink pixels over all pixels of the disk `(center, radius)`.
///
/// Pixels outside the image count toward neither.
pub fn fill_ratio(binary: &BinaryImage, center: [f32; 2], radius: f32) -> f32 {
    let (w, h) = binary.dimensions();
    let r = radius.max(0.5);
    let r2 = r * r;
    let x0 = (center[0] - r).floor().max(0.0) as u32;
    let y0 = (center[1] - r).floor().max(0.0) as u32;
    let x1 = ((center[0] + r).ceil().max(0.0) as u32).min(w.saturating_sub(1));
    let y1 = ((center[1] + r).ceil().max(0.0) as u32).min(h.saturating_sub(1));

    let mut total = 0u32;
    let mut ink = 0u32;
    for y in y0..=y1 {
        let dy = y as f32 - center[1];
        for x in x0..=x1 {
            let dx = x as f32 - center[0];
            if dx * dx + dy * dy <= r2 {
                total += 1;
                if binary.is_ink(x, y) {
                    ink += 1;
                }
            }
        }
    }
    if total == 0 {
        return 0.0;
    }
    ink as f32 / total as f32
}

/// Decision for one question from its classified bubbles.
///
/// Among several marked bubbles the highest fill wins; equal fills go to
/// the lower option.
pub fn decide(bubbles: &[ClassifiedBubble]) -> DetectedAnswer {
    let marked: Vec<&ClassifiedBubble> = bubbles.iter().filter(|b| b.selected).collect();
    match marked.as_slice() {
        [] => DetectedAnswer::Unmarked,
        [only] => DetectedAnswer::Selected {
            option: only.option,
        },
        many => {
            let mut best = many[0];
            for b in &many[1..] {
                if b.fill_ratio > best.fill_ratio {
                    best = b;
                }
            }
            DetectedAnswer::Ambiguous {
                best: best.option,
                marked: many.iter().map(|b| b.option).collect(),
            }
        }
    }
}

/// Fill classifier stage.
pub fn classify_groups(
    binary: &BinaryImage,
    groups: &[BubbleGroup],
    fill_threshold: f32,
    config: &ClassifyConfig,
) -> Vec<ClassifiedGroup> {
    groups
        .iter()
        .map(|g| {
            let bubbles: Vec<ClassifiedBubble> = g
                .bubbles
                .iter()
                .enumerate()
                .map(|(option, c)| {
                    let interior = c.radius * config.interior_radius_frac;
                    let ratio = fill_ratio(binary, c.center, interior);
                    ClassifiedBubble {
                        candidate: *c,
                        option,
                        fill_ratio: ratio,
                        selected: ratio >= fill_threshold,
                    }
                })
                .collect();
            let answer = decide(&bubbles);
            tracing::trace!("question {}: {:?}", g.question, answer);
            ClassifiedGroup {
                question: g.question,
                bubbles,
                answer,
            }
        })
        .collect()
}
