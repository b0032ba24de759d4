use std::path::Path;

use crate::bubble::{ClassifyConfig, GroupingConfig, LocatorConfig};
use crate::deskew::DeskewConfig;
use crate::error::EngineError;
use crate::evaluate::AmbiguityPolicy;
use crate::preprocess::NormalizeConfig;

/// Tuning for every pipeline stage.
///
/// All sections default independently, so a JSON file only needs the
/// fields it changes, e.g. `{"deskew": {"max_angle_deg": 30.0}}`.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub normalize: NormalizeConfig,
    pub deskew: DeskewConfig,
    pub locator: LocatorConfig,
    pub grouping: GroupingConfig,
    pub classify: ClassifyConfig,
    pub ambiguity_policy: AmbiguityPolicy,
}

impl EngineConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, EngineError> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            EngineError::InvalidLayout(format!("failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&data).map_err(|e| {
            EngineError::InvalidLayout(format!("failed to parse {}: {e}", path.display()))
        })
    }
}
