//! Error types. Both enums describe caller contract violations; degenerate audio
//! (silence, unvoiced frames, empty statistics) is never an error.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectorError {
    #[error("detector used before initialize()")]
    NotInitialized,
    #[error("frame has {actual} samples but the detector was initialized for {expected}")]
    FrameSizeMismatch { expected: usize, actual: usize },
    #[error("invalid detector configuration: {0}")]
    InvalidConfig(String),
    #[error("detector was not ready after {0:?}")]
    ReadyTimeout(Duration),
    #[error("detector failed to initialize: {0}")]
    InitializationFailed(String),
}

#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("{detections} detections cannot be evaluated against {ground_truth} ground-truth frames")]
    LengthMismatch {
        detections: usize,
        ground_truth: usize,
    },
    #[error("no detector registered as \"{0}\"")]
    UnknownDetector(String),
    #[error("detector runs at {detector} Hz but the runner is configured for {runner} Hz")]
    SampleRateMismatch { detector: usize, runner: usize },
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
