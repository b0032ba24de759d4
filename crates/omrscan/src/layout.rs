//! Sheet layout and answer key.
//!
//! A [`LayoutConfig`] describes the printed grid: how many questions, how
//! many option bubbles per question and how many side-by-side column blocks.
//! Questions are numbered down the first block, then down the next one.
//!
//! An [`AnswerKey`] maps 1-based question indices to 0-based option indices
//! (`A` = 0). Keys stored by the persistence layer use option letters, e.g.
//! `{"1": "A", "2": "C"}`; both letters and numeric indices are accepted.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::EngineError;

const OPTION_LABELS: [char; 6] = ['A', 'B', 'C', 'D', 'E', 'F'];

pub const MAX_QUESTIONS: usize = 200;
pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = OPTION_LABELS.len();
pub const MAX_COLUMNS: usize = 3;

/// Printed sheet layout supplied with every invocation.
///
/// In JSON, `total_questions`, `options_per_question` and `columns` are
/// required; `fill_threshold` defaults to 0.5.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LayoutConfig {
    /// Total number of questions on the sheet (1..=200).
    pub total_questions: usize,
    /// Option bubbles per question (2..=6).
    pub options_per_question: usize,
    /// Side-by-side question blocks (1..=3).
    pub columns: usize,
    /// Fill ratio at or above which a bubble counts as marked.
    #[serde(default = "default_fill_threshold")]
    pub fill_threshold: f32,
    /// Vertical distance (pixels) that separates printed rows.
    ///
    /// `None` derives the distance from the detected bubble radius.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_grouping_distance: Option<f32>,
}

fn default_fill_threshold() -> f32 {
    0.5
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            total_questions: 50,
            options_per_question: 4,
            columns: 2,
            fill_threshold: default_fill_threshold(),
            row_grouping_distance: None,
        }
    }
}

impl LayoutConfig {
    pub fn new(total_questions: usize, options_per_question: usize, columns: usize) -> Self {
        Self {
            total_questions,
            options_per_question,
            columns,
            ..Default::default()
        }
    }

    pub fn with_fill_threshold(mut self, fill_threshold: f32) -> Self {
        self.fill_threshold = fill_threshold;
        self
    }

    pub fn with_row_grouping_distance(mut self, distance_px: f32) -> Self {
        self.row_grouping_distance = Some(distance_px);
        self
    }

    /// Number of bubbles the printed sheet carries.
    pub fn expected_bubbles(&self) -> usize {
        self.total_questions * self.options_per_question
    }

    /// Printed rows per column block.
    pub fn rows_per_column(&self) -> usize {
        self.total_questions.div_ceil(self.columns.max(1))
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(1..=MAX_QUESTIONS).contains(&self.total_questions) {
            return Err(EngineError::InvalidLayout(format!(
                "total_questions must be in 1..={MAX_QUESTIONS}, got {}",
                self.total_questions
            )));
        }
        if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&self.options_per_question) {
            return Err(EngineError::InvalidLayout(format!(
                "options_per_question must be in {MIN_OPTIONS}..={MAX_OPTIONS}, got {}",
                self.options_per_question
            )));
        }
        if !(1..=MAX_COLUMNS).contains(&self.columns) {
            return Err(EngineError::InvalidLayout(format!(
                "columns must be in 1..={MAX_COLUMNS}, got {}",
                self.columns
            )));
        }
        if !self.fill_threshold.is_finite() || !(0.0..=1.0).contains(&self.fill_threshold) {
            return Err(EngineError::InvalidLayout(format!(
                "fill_threshold must be in [0, 1], got {}",
                self.fill_threshold
            )));
        }
        if let Some(d) = self.row_grouping_distance {
            if !d.is_finite() || d <= 0.0 {
                return Err(EngineError::InvalidLayout(format!(
                    "row_grouping_distance must be finite and > 0, got {d}"
                )));
            }
        }
        Ok(())
    }

    /// Load and validate a layout from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, EngineError> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            EngineError::InvalidLayout(format!("failed to read {}: {e}", path.display()))
        })?;
        let layout: Self = serde_json::from_str(&data).map_err(|e| {
            EngineError::InvalidLayout(format!("failed to parse {}: {e}", path.display()))
        })?;
        layout.validate()?;
        Ok(layout)
    }
}

/// Printable label of a 0-based option index (`0` -> `'A'`).
pub fn option_label(option: usize) -> Option<char> {
    OPTION_LABELS.get(option).copied()
}

/// Parse a printable option label (`"A"`, `"b"`) or a numeric index (`"2"`).
pub fn parse_option_label(label: &str) -> Option<usize> {
    let label = label.trim();
    let mut chars = label.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => {
            let upper = c.to_ascii_uppercase();
            OPTION_LABELS.iter().position(|&l| l == upper)
        }
        _ => label.parse::<usize>().ok(),
    }
}

/// Correct option per question.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct AnswerKey {
    answers: BTreeMap<u32, usize>,
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum KeyEntry {
    Index(usize),
    Label(String),
}

impl AnswerKey {
    pub fn new(answers: BTreeMap<u32, usize>) -> Self {
        Self { answers }
    }

    /// Build from `(question, label)` pairs such as `(1, "B")`.
    pub fn from_labels<'a, I>(entries: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = (u32, &'a str)>,
    {
        let mut answers = BTreeMap::new();
        for (question, label) in entries {
            let option = parse_option_label(label).ok_or_else(|| {
                EngineError::InvalidAnswerKey(format!(
                    "question {question}: unrecognized option '{label}'"
                ))
            })?;
            answers.insert(question, option);
        }
        Ok(Self { answers })
    }

    /// Parse a JSON object keyed by question number.
    pub fn from_json_str(data: &str) -> Result<Self, EngineError> {
        let raw: BTreeMap<String, KeyEntry> = serde_json::from_str(data)
            .map_err(|e| EngineError::InvalidAnswerKey(format!("malformed JSON: {e}")))?;
        let mut answers = BTreeMap::new();
        for (question, entry) in raw {
            let q: u32 = question.trim().parse().map_err(|_| {
                EngineError::InvalidAnswerKey(format!("'{question}' is not a question number"))
            })?;
            let option = match entry {
                KeyEntry::Index(i) => i,
                KeyEntry::Label(label) => parse_option_label(&label).ok_or_else(|| {
                    EngineError::InvalidAnswerKey(format!(
                        "question {q}: unrecognized option '{label}'"
                    ))
                })?,
            };
            answers.insert(q, option);
        }
        Ok(Self { answers })
    }

    pub fn from_json_file(path: &Path) -> Result<Self, EngineError> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            EngineError::InvalidAnswerKey(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&data)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn get(&self, question: u32) -> Option<usize> {
        self.answers.get(&question).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, usize)> + '_ {
        self.answers.iter().map(|(&q, &o)| (q, o))
    }

    /// Check the key against a layout: size, contiguous `1..=N`, options in range.
    pub fn validate_against(&self, layout: &LayoutConfig) -> Result<(), EngineError> {
        if self.answers.len() != layout.total_questions {
            return Err(EngineError::AnswerKeyLayoutMismatch {
                expected: layout.total_questions,
                found: self.answers.len(),
            });
        }
        for (expected_q, (&q, &option)) in (1u32..).zip(self.answers.iter()) {
            if q != expected_q {
                return Err(EngineError::InvalidAnswerKey(format!(
                    "question indices must be contiguous from 1; expected {expected_q}, found {q}"
                )));
            }
            if option >= layout.options_per_question {
                return Err(EngineError::InvalidAnswerKey(format!(
                    "question {q}: option {option} out of range for {} options",
                    layout.options_per_question
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_is_valid() {
        assert!(LayoutConfig::default().validate().is_ok());
    }

    #[test]
    fn layout_rejects_out_of_range_fields() {
        for layout in [
            LayoutConfig::new(0, 4, 1),
            LayoutConfig::new(201, 4, 1),
            LayoutConfig::new(10, 1, 1),
            LayoutConfig::new(10, 7, 1),
            LayoutConfig::new(10, 4, 0),
            LayoutConfig::new(10, 4, 4),
            LayoutConfig::new(10, 4, 2).with_fill_threshold(1.5),
            LayoutConfig::new(10, 4, 2).with_row_grouping_distance(-3.0),
        ] {
            assert!(
                matches!(layout.validate(), Err(EngineError::InvalidLayout(_))),
                "expected rejection for {layout:?}"
            );
        }
    }

    #[test]
    fn layout_file_requires_grid_fields() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("layout.json");

        std::fs::write(&path, "{}").unwrap();
        assert!(matches!(
            LayoutConfig::from_json_file(&path),
            Err(EngineError::InvalidLayout(_))
        ));

        std::fs::write(&path, r#"{"total_questions": 20, "options_per_question": 5}"#).unwrap();
        assert!(matches!(
            LayoutConfig::from_json_file(&path),
            Err(EngineError::InvalidLayout(_))
        ));

        let grid = r#"{"total_questions": 20, "options_per_question": 5, "columns": 1}"#;
        std::fs::write(&path, grid).unwrap();
        let layout = LayoutConfig::from_json_file(&path).unwrap();
        assert_eq!(layout, LayoutConfig::new(20, 5, 1));
        assert_eq!(layout.fill_threshold, 0.5);
        assert_eq!(layout.row_grouping_distance, None);
    }

    #[test]
    fn rows_per_column_rounds_up() {
        assert_eq!(LayoutConfig::new(50, 4, 2).rows_per_column(), 25);
        assert_eq!(LayoutConfig::new(7, 4, 3).rows_per_column(), 3);
    }

    #[test]
    fn option_labels_round_trip_through_parser() {
        assert_eq!(option_label(0), Some('A'));
        assert_eq!(option_label(5), Some('F'));
        assert_eq!(option_label(6), None);
        assert_eq!(parse_option_label("c"), Some(2));
        assert_eq!(parse_option_label(" D "), Some(3));
        assert_eq!(parse_option_label("3"), Some(3));
        assert_eq!(parse_option_label("Z"), None);
    }

    #[test]
    fn answer_key_parses_labelled_json() {
        let key = AnswerKey::from_json_str(r#"{"1": "A", "2": "c", "3": 1}"#).unwrap();
        assert_eq!(key.len(), 3);
        assert_eq!(key.get(1), Some(0));
        assert_eq!(key.get(2), Some(2));
        assert_eq!(key.get(3), Some(1));
    }

    #[test]
    fn answer_key_rejects_bad_labels() {
        let err = AnswerKey::from_json_str(r#"{"1": "Q"}"#).unwrap_err();
        assert!(matches!(err, EngineError::InvalidAnswerKey(_)));
        let err = AnswerKey::from_json_str(r#"{"one": "A"}"#).unwrap_err();
        assert!(matches!(err, EngineError::InvalidAnswerKey(_)));
    }

    #[test]
    fn answer_key_validation_checks_size_and_contiguity() {
        let layout = LayoutConfig::new(3, 4, 1);
        let short = AnswerKey::from_labels([(1, "A"), (2, "B")]).unwrap();
        assert_eq!(
            short.validate_against(&layout),
            Err(EngineError::AnswerKeyLayoutMismatch {
                expected: 3,
                found: 2
            })
        );

        let gapped = AnswerKey::from_labels([(1, "A"), (2, "B"), (4, "C")]).unwrap();
        assert!(matches!(
            gapped.validate_against(&layout),
            Err(EngineError::InvalidAnswerKey(_))
        ));

        let out_of_range = AnswerKey::from_labels([(1, "A"), (2, "B"), (3, "F")]).unwrap();
        assert!(matches!(
            out_of_range.validate_against(&layout),
            Err(EngineError::InvalidAnswerKey(_))
        ));

        let good = AnswerKey::from_labels([(1, "A"), (2, "B"), (3, "D")]).unwrap();
        assert!(good.validate_against(&layout).is_ok());
    }
}
