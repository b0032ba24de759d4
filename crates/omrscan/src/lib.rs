//! omrscan: bubble-sheet detection and scoring engine.
//!
//! Given a raster image of a filled answer sheet and its layout, the engine
//! reads which option was marked for every question and scores the result
//! against an answer key. The pipeline stages are:
//!
//! 1. **Normalize** – luma conversion, adaptive binarization, morphological cleanup.
//! 2. **Deskew** – rotation estimate from bubble neighbour links, rotation onto
//!    an expanded canvas.
//! 3. **Locate** – round, bubble-sized outer contours.
//! 4. **Group** – rows, column blocks and question/option grid.
//! 5. **Classify** – interior fill ratio, per-question decision.
//! 6. **Map / Evaluate** – `question -> answer`, then score against the key.
//!
//! # Public API
//! - [`Engine`] (or the [`evaluate`] / [`detect`] shorthands) as entry points
//! - [`LayoutConfig`] and [`AnswerKey`] per invocation
//! - [`EngineConfig`] for advanced tuning
//!
//! Stage modules are public for diagnostics and benchmarking.

mod answers;
pub mod bubble;
mod config;
pub mod deskew;
mod engine;
mod error;
mod evaluate;
mod layout;
mod pipeline;
pub mod preprocess;

#[cfg(test)]
pub(crate) mod test_utils;

pub use answers::{map_answers, DetectedAnswer};
pub use bubble::{BubbleCandidate, ClassifiedBubble};
pub use config::EngineConfig;
pub use deskew::{DeskewConfig, DeskewReport, DeskewTransform};
pub use engine::{detect, evaluate, Engine};
pub use error::{EngineError, EngineWarning};
pub use evaluate::{AmbiguityPolicy, EvaluationResult, QuestionEvaluation, Verdict};
pub use layout::{
    option_label, parse_option_label, AnswerKey, LayoutConfig, MAX_COLUMNS, MAX_OPTIONS,
    MAX_QUESTIONS, MIN_OPTIONS,
};
pub use pipeline::{BubbleDebug, DebugDetail, DetectionResult};
pub use preprocess::{BinaryImage, NormalizeConfig, RasterImage};
