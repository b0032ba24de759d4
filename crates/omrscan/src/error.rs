//! Error and warning taxonomy for the evaluation pipeline.
//!
//! Every fatal condition aborts the run with an [`EngineError`]; partial
//! results are never returned. Non-fatal conditions are attached to the
//! result as [`EngineWarning`]s.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal pipeline errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Input bytes could not be decoded into a raster image, or the image is empty.
    #[error("image decode failed: {0}")]
    ImageDecode(String),

    /// Far fewer bubble-shaped regions were found than the layout implies.
    #[error("insufficient bubbles detected: found {found}, layout expects {expected}")]
    InsufficientBubblesDetected {
        /// Number of accepted bubble candidates.
        found: usize,
        /// `total_questions * options_per_question`.
        expected: usize,
    },

    /// A printed row holds a bubble count that is not a whole multiple of
    /// options-per-question.
    #[error("layout mismatch in row {row}: {found} bubbles is not a multiple of {options} options")]
    LayoutMismatch {
        /// 1-based row index, top to bottom.
        row: usize,
        /// Bubbles found in the offending row segment.
        found: usize,
        /// Configured options per question.
        options: usize,
    },

    /// The bubble grid produced a different number of questions than configured.
    #[error("question count mismatch: layout expects {expected}, sheet yields {found}")]
    QuestionCountMismatch { expected: usize, found: usize },

    /// Answer key size disagrees with the configured question count.
    #[error("answer key has {found} entries, layout expects {expected}")]
    AnswerKeyLayoutMismatch { expected: usize, found: usize },

    /// Answer key is malformed (non-contiguous indices, option out of range).
    #[error("invalid answer key: {0}")]
    InvalidAnswerKey(String),

    /// Layout configuration is out of its recognized ranges.
    #[error("invalid layout: {0}")]
    InvalidLayout(String),
}

/// Non-fatal conditions attached to a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineWarning {
    /// The skew estimate could not be trusted; the image was processed unrotated.
    DeskewUnreliable {
        /// Rejected angle estimate in degrees, when one was computed.
        #[serde(skip_serializing_if = "Option::is_none")]
        angle_deg: Option<f32>,
        reason: String,
    },
}

impl std::fmt::Display for EngineWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeskewUnreliable {
                angle_deg: Some(angle),
                reason,
            } => write!(f, "deskew unreliable ({angle:.2} deg): {reason}"),
            Self::DeskewUnreliable {
                angle_deg: None,
                reason,
            } => write!(f, "deskew unreliable: {reason}"),
        }
    }
}
