//! One configuration document for the whole engine.
//!
//! Every section and every field is optional in JSON; missing values take the defaults.
//!
//! ```
//! use vocal_pitch::config::EngineConfig;
//!
//! let config = EngineConfig::from_json(r#"{ "detector": { "clarityThreshold": 0.75 } }"#).unwrap();
//! assert_eq!(config.detector.clarity_threshold, 0.75);
//! assert_eq!(config.detector.frame_size, 2048);
//! ```

use serde::{Deserialize, Serialize};

use crate::detector::hybrid::HybridConfig;
use crate::error::{DetectorError, EvaluationError};
use crate::evaluation::{EvaluatorConfig, RunnerConfig};
use crate::onset::OnsetConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub detector: HybridConfig,
    pub onset: OnsetConfig,
    pub evaluator: EvaluatorConfig,
    pub runner: RunnerConfig,
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, EvaluationError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, EvaluationError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every section, and that all sections agree on the sample rate.
    pub fn validate(&self) -> Result<(), DetectorError> {
        self.detector.validate()?;
        self.onset.validate()?;
        self.runner.validate()?;
        if self.evaluator.tolerance_cents <= 0.0 || self.evaluator.gross_error_threshold <= 0.0 {
            return Err(DetectorError::InvalidConfig(
                "evaluation tolerances must be positive".into(),
            ));
        }
        let rate = self.runner.sample_rate;
        if self.detector.sample_rate != rate || self.onset.sample_rate != rate {
            return Err(DetectorError::InvalidConfig(format!(
                "sample rates disagree: detector {}, onset {}, runner {}",
                self.detector.sample_rate, self.onset.sample_rate, rate
            )));
        }
        Ok(())
    }
}
