//! Row and column-block grouping of bubble candidates.
//!
//! Rows are found by a 1D sweep over y; column blocks by the widest gaps
//! between candidate x positions. Within a row, each block segment is cut
//! into consecutive runs of `options_per_question` bubbles. Questions are
//! numbered down the first block, then down the next.

use super::{median, BubbleCandidate};
use crate::error::EngineError;
use crate::layout::LayoutConfig;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GroupingConfig {
    /// Row-grouping distance as a multiple of the median bubble radius.
    /// Ignored when the layout sets `row_grouping_distance`.
    pub row_distance_factor: f32,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            row_distance_factor: 1.0,
        }
    }
}

/// Bubbles of one question, ordered by option (left to right).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BubbleGroup {
    /// 1-based question index.
    pub question: u32,
    /// 1-based printed row.
    pub row: usize,
    /// 0-based column block.
    pub block: usize,
    pub bubbles: Vec<BubbleCandidate>,
}

/// Grouper output.
#[derive(Debug, Clone)]
pub struct BubbleGrid {
    /// Groups ordered by question index.
    pub groups: Vec<BubbleGroup>,
    pub rows: usize,
    pub bubble_radius: f32,
    pub row_distance: f32,
}

fn assign_rows(mut candidates: Vec<BubbleCandidate>, distance: f32) -> Vec<Vec<BubbleCandidate>> {
    candidates.sort_by(|a, b| {
        a.center[1]
            .total_cmp(&b.center[1])
            .then(a.center[0].total_cmp(&b.center[0]))
    });
    let mut rows: Vec<Vec<BubbleCandidate>> = Vec::new();
    let mut cur: Vec<BubbleCandidate> = Vec::new();
    let mut sum_y = 0.0f32;
    for c in candidates {
        if !cur.is_empty() && (c.center[1] - sum_y / cur.len() as f32).abs() > distance {
            rows.push(std::mem::take(&mut cur));
            sum_y = 0.0;
        }
        sum_y += c.center[1];
        cur.push(c);
    }
    if !cur.is_empty() {
        rows.push(cur);
    }
    rows
}

/// x positions separating `blocks` column blocks: midpoints of the
/// `blocks - 1` widest gaps between sorted candidate x coordinates.
pub(crate) fn block_boundaries(candidates: &[BubbleCandidate], blocks: usize) -> Vec<f32> {
    if blocks <= 1 || candidates.len() < 2 {
        return Vec::new();
    }
    let mut xs: Vec<f32> = candidates.iter().map(|c| c.center[0]).collect();
    xs.sort_by(f32::total_cmp);
    let mut gaps: Vec<(f32, f32)> = xs
        .windows(2)
        .map(|w| (w[1] - w[0], 0.5 * (w[0] + w[1])))
        .collect();
    gaps.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.total_cmp(&b.1)));
    let mut bounds: Vec<f32> = gaps.iter().take(blocks - 1).map(|g| g.1).collect();
    bounds.sort_by(f32::total_cmp);
    bounds
}

/// Bubble grouper stage.
pub fn group_bubbles(
    candidates: Vec<BubbleCandidate>,
    layout: &LayoutConfig,
    config: &GroupingConfig,
) -> Result<BubbleGrid, EngineError> {
    let options = layout.options_per_question;
    let Some(bubble_radius) = median(&mut candidates.iter().map(|c| c.radius).collect::<Vec<_>>())
    else {
        return Err(EngineError::QuestionCountMismatch {
            expected: layout.total_questions,
            found: 0,
        });
    };
    let row_distance = layout
        .row_grouping_distance
        .unwrap_or(config.row_distance_factor * bubble_radius);

    let used_blocks = layout.total_questions.div_ceil(layout.rows_per_column().max(1));
    let bounds = block_boundaries(&candidates, used_blocks);
    let rows = assign_rows(candidates, row_distance);
    tracing::debug!(
        "{} rows (distance {:.1}px), block boundaries {:?}",
        rows.len(),
        row_distance,
        bounds
    );

    // Per block: (row, bubbles) runs in top-to-bottom, left-to-right order.
    let mut per_block: Vec<Vec<(usize, Vec<BubbleCandidate>)>> = vec![Vec::new(); bounds.len() + 1];
    for (r, row) in rows.iter().enumerate() {
        let mut segments: Vec<Vec<BubbleCandidate>> = vec![Vec::new(); bounds.len() + 1];
        for c in row {
            let block = bounds.partition_point(|&b| b < c.center[0]);
            segments[block].push(*c);
        }
        for (block, mut segment) in segments.into_iter().enumerate() {
            if segment.len() % options != 0 {
                return Err(EngineError::LayoutMismatch {
                    row: r + 1,
                    found: segment.len(),
                    options,
                });
            }
            segment.sort_by(|a, b| a.center[0].total_cmp(&b.center[0]));
            for chunk in segment.chunks(options) {
                per_block[block].push((r + 1, chunk.to_vec()));
            }
        }
    }

    let mut groups = Vec::with_capacity(layout.total_questions);
    for (block, runs) in per_block.into_iter().enumerate() {
        for (row, bubbles) in runs {
            groups.push(BubbleGroup {
                question: groups.len() as u32 + 1,
                row,
                block,
                bubbles,
            });
        }
    }

    if groups.len() != layout.total_questions {
        return Err(EngineError::QuestionCountMismatch {
            expected: layout.total_questions,
            found: groups.len(),
        });
    }

    tracing::info!(
        "{} questions in {} rows x {} blocks",
        groups.len(),
        rows.len(),
        bounds.len() + 1
    );
    Ok(BubbleGrid {
        groups,
        rows: rows.len(),
        bubble_radius,
        row_distance,
    })
}
