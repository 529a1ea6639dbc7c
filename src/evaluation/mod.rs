//! Measuring detectors: accuracy metrics, text reports and the runner that drives
//! detectors over synthetic fixtures and recordings.

use serde::{Deserialize, Serialize};

use crate::detector::Detection;

pub mod metrics;
pub mod report;
pub mod runner;

pub use metrics::{
    Comparison, EvaluatorConfig, FrameEvaluation, LatencyReport, Metrics, PitchEvaluator, Winner,
};
pub use runner::{EvaluationRunner, RunnerConfig};

/// One detector output placed on the buffer's timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameDetection {
    /// Seconds from the start of the buffer to the frame centre.
    pub time: f64,
    pub frequency: Option<f64>,
    pub confidence: f64,
}

impl FrameDetection {
    pub fn new(detection: &Detection, time: f64) -> Self {
        FrameDetection {
            time,
            frequency: detection.frequency,
            confidence: detection.confidence,
        }
    }
}
