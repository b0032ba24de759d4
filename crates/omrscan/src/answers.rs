//! Per-question answer states and the answer mapper.

use std::collections::BTreeMap;

use crate::bubble::ClassifiedGroup;
use crate::layout::option_label;

/// What was read for one question.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DetectedAnswer {
    /// No bubble reached the fill threshold.
    Unmarked,
    /// Exactly one bubble reached the fill threshold.
    Selected { option: usize },
    /// Several bubbles reached the fill threshold; `best` has the highest fill.
    Ambiguous { best: usize, marked: Vec<usize> },
}

impl DetectedAnswer {
    /// The single selected option, if any.
    pub fn selected(&self) -> Option<usize> {
        match self {
            Self::Selected { option } => Some(*option),
            _ => None,
        }
    }

    /// Selected option, or the best-filled one for ambiguous questions.
    pub fn best_option(&self) -> Option<usize> {
        match self {
            Self::Unmarked => None,
            Self::Selected { option } => Some(*option),
            Self::Ambiguous { best, .. } => Some(*best),
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Ambiguous { .. })
    }

    /// Human-readable form, e.g. `B`, `-` or `A/C?`.
    pub fn describe(&self) -> String {
        let label = |o: usize| option_label(o).map_or_else(|| o.to_string(), String::from);
        match self {
            Self::Unmarked => "-".to_string(),
            Self::Selected { option } => label(*option),
            Self::Ambiguous { marked, .. } => {
                let parts: Vec<String> = marked.iter().map(|&o| label(o)).collect();
                format!("{}?", parts.join("/"))
            }
        }
    }
}

/// Collapse classified groups into `question -> answer`.
pub fn map_answers(groups: &[ClassifiedGroup]) -> BTreeMap<u32, DetectedAnswer> {
    groups
        .iter()
        .map(|g| (g.question, g.answer.clone()))
        .collect()
}
