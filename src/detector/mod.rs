use serde::{Deserialize, Serialize};

use crate::detector::internals::Pitch;
use crate::error::DetectorError;
use crate::float::Float;

pub mod hybrid;
pub mod internals;
pub mod mcleod;
pub mod readiness;
pub mod trace;
pub mod tracking;
pub mod yin;

/// A single-shot estimator: one frame in, at most one [Pitch] out, no memory between calls.
pub trait PitchEstimator<T>
where
    T: Float,
{
    fn get_pitch(
        &mut self,
        signal: &[T],
        sample_rate: usize,
        power_threshold: T,
        clarity_threshold: T,
    ) -> Option<Pitch<T>>;
}

/// The lifecycle every detector exposes to callers and to the evaluation runner.
///
/// `detect` must only be called between a successful `initialize` and `dispose`,
/// with frames of the size reported by `describe`. A detector instance carries rolling
/// state across frames and is driven by exactly one caller.
pub trait PitchDetector<T>
where
    T: Float,
{
    fn initialize(&mut self) -> Result<(), DetectorError>;

    fn detect(&mut self, frame: &[T]) -> Result<Detection, DetectorError>;

    /// Forget rolling state (smoothing history, pitch tracking) without releasing resources.
    fn reset(&mut self);

    /// Release estimator resources. Idempotent; a disposed detector must be initialized again.
    fn dispose(&mut self);

    fn describe(&self) -> DetectorInfo;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "MPM")]
    Mpm,
    #[serde(rename = "YIN")]
    Yin,
}

/// The outcome of one `detect` call. `frequency` is `None` for unvoiced frames;
/// it is never zero or NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub frequency: Option<f64>,
    pub confidence: f64,
    /// Milliseconds since the detector was initialized.
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_frequency: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<Algorithm>,
}

impl Detection {
    pub fn unvoiced(timestamp: u64) -> Self {
        Detection {
            frequency: None,
            confidence: 0.0,
            timestamp,
            raw_frequency: None,
            algorithm: None,
        }
    }

    pub fn is_voiced(&self) -> bool {
        self.frequency.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorInfo {
    pub name: String,
    pub sample_rate: usize,
    pub frame_size: usize,
    pub min_frequency: f64,
    pub max_frequency: f64,
    pub is_ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarity_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_size: Option<usize>,
}
