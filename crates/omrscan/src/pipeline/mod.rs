//! Stage wiring for a single sheet.
//!
//! Algorithmic primitives live in `crate::preprocess`, `crate::deskew` and
//! `crate::bubble`. This layer owns call order and data flow:
//! normalize -> deskew -> locate -> group -> classify -> map answers.
//! Every stage consumes or borrows the previous stage's image and produces a
//! new owned one, so an early error drops all intermediates.

mod result;
mod run;

pub use result::{BubbleDebug, DebugDetail, DetectionResult};

pub(crate) use run::detect_answers;
