//! Scoring detected answers against an answer key.

use std::collections::BTreeMap;

use crate::answers::DetectedAnswer;
use crate::error::{EngineError, EngineWarning};
use crate::layout::{AnswerKey, LayoutConfig};
use crate::pipeline::{DebugDetail, DetectionResult};

/// How questions with several marked bubbles are scored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// Counted in their own `ambiguous` bucket; never correct.
    #[default]
    Separate,
    /// Counted as wrong.
    Wrong,
    /// Counted as unmarked.
    Unmarked,
    /// Scored by the best-filled bubble as if it were the only mark.
    AcceptBest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    Wrong,
    Unmarked,
    Ambiguous,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QuestionEvaluation {
    pub question: u32,
    /// Correct option from the key.
    pub expected: usize,
    pub detected: DetectedAnswer,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EvaluationResult {
    pub score: usize,
    pub total: usize,
    /// `100 * score / total`, rounded to two decimals.
    pub percentage: f64,
    pub correct: usize,
    pub wrong: usize,
    pub unmarked: usize,
    pub ambiguous: usize,
    pub ambiguity_policy: AmbiguityPolicy,
    pub questions: Vec<QuestionEvaluation>,
    pub detected_answers: BTreeMap<u32, DetectedAnswer>,
    pub warnings: Vec<EngineWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugDetail>,
}

fn verdict(detected: &DetectedAnswer, expected: usize, policy: AmbiguityPolicy) -> Verdict {
    match detected {
        DetectedAnswer::Unmarked => Verdict::Unmarked,
        DetectedAnswer::Selected { option } if *option == expected => Verdict::Correct,
        DetectedAnswer::Selected { .. } => Verdict::Wrong,
        DetectedAnswer::Ambiguous { best, .. } => match policy {
            AmbiguityPolicy::Separate => Verdict::Ambiguous,
            AmbiguityPolicy::Wrong => Verdict::Wrong,
            AmbiguityPolicy::Unmarked => Verdict::Unmarked,
            AmbiguityPolicy::AcceptBest if *best == expected => Verdict::Correct,
            AmbiguityPolicy::AcceptBest => Verdict::Wrong,
        },
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Evaluator stage: compare a detection against the key.
///
/// The key must already cover exactly the questions of `layout`; the
/// detection must hold an answer for each of them.
pub fn evaluate_detection(
    detection: DetectionResult,
    key: &AnswerKey,
    layout: &LayoutConfig,
    policy: AmbiguityPolicy,
) -> Result<EvaluationResult, EngineError> {
    key.validate_against(layout)?;
    if detection.answers.len() != layout.total_questions {
        return Err(EngineError::QuestionCountMismatch {
            expected: layout.total_questions,
            found: detection.answers.len(),
        });
    }

    let mut questions = Vec::with_capacity(key.len());
    let (mut correct, mut wrong, mut unmarked, mut ambiguous) = (0, 0, 0, 0);
    for (question, expected) in key.iter() {
        let detected = detection.answers.get(&question).cloned().ok_or(
            EngineError::QuestionCountMismatch {
                expected: layout.total_questions,
                found: detection.answers.len(),
            },
        )?;
        let v = verdict(&detected, expected, policy);
        match v {
            Verdict::Correct => correct += 1,
            Verdict::Wrong => wrong += 1,
            Verdict::Unmarked => unmarked += 1,
            Verdict::Ambiguous => ambiguous += 1,
        }
        questions.push(QuestionEvaluation {
            question,
            expected,
            detected,
            verdict: v,
        });
    }

    let total = key.len();
    let percentage = if total == 0 {
        0.0
    } else {
        round2(100.0 * correct as f64 / total as f64)
    };
    tracing::info!(
        "score {}/{} ({:.2}%): {} wrong, {} unmarked, {} ambiguous",
        correct,
        total,
        percentage,
        wrong,
        unmarked,
        ambiguous
    );

    Ok(EvaluationResult {
        score: correct,
        total,
        percentage,
        correct,
        wrong,
        unmarked,
        ambiguous,
        ambiguity_policy: policy,
        questions,
        detected_answers: detection.answers,
        warnings: detection.warnings,
        debug: detection.debug,
    })
}
