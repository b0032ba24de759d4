//! High-level evaluation API.
//!
//! [`Engine`] wraps an [`EngineConfig`] and runs the full pipeline on one
//! sheet image per call. It holds no per-image state, so a single engine can
//! serve concurrent calls from many threads.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::evaluate::{evaluate_detection, EvaluationResult};
use crate::layout::{AnswerKey, LayoutConfig};
use crate::pipeline::{detect_answers, DetectionResult};
use crate::preprocess::RasterImage;

/// Primary evaluation interface.
///
/// # Examples
///
/// ```no_run
/// use omrscan::{AnswerKey, Engine, LayoutConfig, RasterImage};
///
/// let bytes = std::fs::read("sheet.png").unwrap();
/// let image = RasterImage::from_bytes(&bytes).unwrap();
/// let layout = LayoutConfig::new(50, 4, 2);
/// let key = AnswerKey::from_json_str(r#"{"1": "A", "2": "C"}"#).unwrap();
/// let result = Engine::new().evaluate(&image, &layout, &key, false);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    /// Engine with default tuning.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    /// Read the marked answers without scoring them.
    pub fn detect(
        &self,
        image: &RasterImage,
        layout: &LayoutConfig,
        debug: bool,
    ) -> Result<DetectionResult, EngineError> {
        detect_answers(image, layout, &self.config, debug)
    }

    /// Read the marked answers and score them against `key`.
    ///
    /// Layout and key are validated before any image processing.
    pub fn evaluate(
        &self,
        image: &RasterImage,
        layout: &LayoutConfig,
        key: &AnswerKey,
        debug: bool,
    ) -> Result<EvaluationResult, EngineError> {
        layout.validate()?;
        key.validate_against(layout)?;
        let detection = detect_answers(image, layout, &self.config, debug)?;
        evaluate_detection(detection, key, layout, self.config.ambiguity_policy)
    }

    /// [`Engine::evaluate`] on encoded image bytes (PNG, JPEG, ...).
    pub fn evaluate_bytes(
        &self,
        bytes: &[u8],
        layout: &LayoutConfig,
        key: &AnswerKey,
        debug: bool,
    ) -> Result<EvaluationResult, EngineError> {
        layout.validate()?;
        key.validate_against(layout)?;
        let image = RasterImage::from_bytes(bytes)?;
        self.evaluate(&image, layout, key, debug)
    }
}

/// Evaluate one sheet with default tuning.
pub fn evaluate(
    image: &RasterImage,
    layout: &LayoutConfig,
    key: &AnswerKey,
    debug: bool,
) -> Result<EvaluationResult, EngineError> {
    Engine::new().evaluate(image, layout, key, debug)
}

/// Detect answers on one sheet with default tuning.
pub fn detect(
    image: &RasterImage,
    layout: &LayoutConfig,
    debug: bool,
) -> Result<DetectionResult, EngineError> {
    Engine::new().detect(image, layout, debug)
}
