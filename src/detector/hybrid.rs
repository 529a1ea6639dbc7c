//! The hybrid detector: McLeod first, YIN as a fallback, then octave-jump correction and
//! median smoothing across frames.
//!
//! Per frame:
//!
//!   1. Frames whose RMS is below `threshold` are silence. Rolling state is cleared.
//!   2. The McLeod estimate is accepted when its clarity reaches `clarity_threshold`.
//!   3. Otherwise YIN is tried; a YIN estimate is reported with a fixed clarity of
//!      [YIN_CLARITY].
//!   4. Candidates outside `[min_frequency, max_frequency]` are dropped (state cleared).
//!   5. The candidate goes through the [OctaveTracker] and then the [MedianSmoother].
//!
//! ```
//! use vocal_pitch::detector::hybrid::{HybridConfig, HybridPitchDetector};
//! use vocal_pitch::detector::PitchDetector;
//!
//! let config = HybridConfig::default();
//! let frame: Vec<f64> = (0..config.frame_size)
//!     .map(|i| 0.8 * (2.0 * std::f64::consts::PI * 440.0 * i as f64 / 44100.0).sin())
//!     .collect();
//!
//! let mut detector = HybridPitchDetector::new(config);
//! detector.initialize().unwrap();
//! let detection = detector.detect(&frame).unwrap();
//! assert!((detection.frequency.unwrap() - 440.0).abs() < 2.0);
//! ```

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::detector::mcleod::{McLeodDetector, DEFAULT_KEY_MAXIMUM_CUTOFF};
use crate::detector::trace::{emit, TraceEvent, TraceHook};
use crate::detector::tracking::{MedianSmoother, OctaveDecision, OctaveTracker};
use crate::detector::yin::YINDetector;
use crate::detector::{Algorithm, Detection, DetectorInfo, PitchDetector, PitchEstimator};
use crate::error::DetectorError;
use crate::float::Float;
use crate::utils::buffer::rms;

/// Confidence reported for YIN estimates. This is a placeholder, not a measured
/// periodicity score: YIN only answers the hybrid detector when McLeod was not clear
/// enough, and the evaluation metrics are calibrated against this exact value.
pub const YIN_CLARITY: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HybridConfig {
    pub sample_rate: usize,
    pub frame_size: usize,
    /// Minimum frame RMS for a frame to be analysed at all.
    pub threshold: f64,
    pub clarity_threshold: f64,
    pub min_frequency: f64,
    pub max_frequency: f64,
    /// Capacity of the median window.
    pub history_size: usize,
    /// Stable frames required before octave jumps are folded back.
    pub min_stable_frames: usize,
    /// YIN absolute threshold on the normalized difference function. For a noisy tone
    /// `d'` at the period sits near `1 - clarity`, so this must exceed
    /// `1 - clarity_threshold` for YIN to answer frames McLeod turned down.
    pub yin_threshold: f64,
    pub key_maximum_cutoff: f64,
    /// Consecutive octave corrections after which the jump is accepted as a real leap.
    /// Unset by default: octave jumps are folded for as long as they persist.
    pub max_consecutive_corrections: Option<usize>,
}

impl Default for HybridConfig {
    fn default() -> Self {
        HybridConfig {
            sample_rate: 44100,
            frame_size: 2048,
            threshold: 0.005,
            clarity_threshold: 0.8,
            min_frequency: 60.0,
            max_frequency: 1200.0,
            history_size: 5,
            min_stable_frames: 3,
            yin_threshold: 0.3,
            key_maximum_cutoff: DEFAULT_KEY_MAXIMUM_CUTOFF,
            max_consecutive_corrections: None,
        }
    }
}

impl HybridConfig {
    pub fn validate(&self) -> Result<(), DetectorError> {
        let invalid = |reason: String| Err(DetectorError::InvalidConfig(reason));
        if self.sample_rate == 0 || self.frame_size < 4 {
            return invalid(format!(
                "sample rate {} and frame size {} must be positive",
                self.sample_rate, self.frame_size
            ));
        }
        if !(self.min_frequency > 0.0 && self.min_frequency < self.max_frequency) {
            return invalid(format!(
                "frequency range [{}, {}] is empty",
                self.min_frequency, self.max_frequency
            ));
        }
        if self.max_frequency >= self.sample_rate as f64 / 2.0 {
            return invalid(format!(
                "max frequency {} is above Nyquist for {} Hz",
                self.max_frequency, self.sample_rate
            ));
        }
        // The NSDF lobe around the longest period closes a quarter period after it, and
        // only closed lobes in the first half of the frame are searched.
        let longest_period = self.sample_rate as f64 / self.min_frequency;
        if 1.25 * longest_period >= (self.frame_size / 2) as f64 {
            return invalid(format!(
                "a {}-sample frame is too short for {} Hz",
                self.frame_size, self.min_frequency
            ));
        }
        if self.history_size < 3 {
            return invalid(format!("history size {} is below 3", self.history_size));
        }
        let unit = |v: f64| (0.0..=1.0).contains(&v);
        if !unit(self.clarity_threshold) || !unit(self.yin_threshold) || !unit(self.key_maximum_cutoff)
        {
            return invalid("clarity, YIN and key-maximum thresholds must lie in [0, 1]".into());
        }
        Ok(())
    }
}

struct Estimators<T>
where
    T: Float,
{
    mcleod: McLeodDetector<T>,
    yin: YINDetector<T>,
}

pub struct HybridPitchDetector<T>
where
    T: Float,
{
    config: HybridConfig,
    estimators: Option<Estimators<T>>,
    tracker: OctaveTracker,
    smoother: MedianSmoother,
    last_algorithm: Option<Algorithm>,
    last_clarity: f64,
    started: Option<Instant>,
    trace: Option<TraceHook>,
}

impl<T> Default for HybridPitchDetector<T>
where
    T: Float,
{
    fn default() -> Self {
        Self::new(HybridConfig::default())
    }
}

impl<T> HybridPitchDetector<T>
where
    T: Float,
{
    pub fn new(config: HybridConfig) -> Self {
        let tracker = OctaveTracker::new(
            config.min_stable_frames,
            config.max_consecutive_corrections,
            config.min_frequency,
            config.max_frequency,
        );
        let smoother = MedianSmoother::new(config.history_size);
        HybridPitchDetector {
            config,
            estimators: None,
            tracker,
            smoother,
            last_algorithm: None,
            last_clarity: 0.0,
            started: None,
            trace: None,
        }
    }

    pub fn config(&self) -> &HybridConfig {
        &self.config
    }

    pub fn set_trace_hook(&mut self, hook: TraceHook) {
        self.trace = Some(hook);
    }

    pub fn clear_trace_hook(&mut self) {
        self.trace = None;
    }

    /// Which estimator produced the last voiced frame, if the current note has one.
    pub fn last_algorithm(&self) -> Option<Algorithm> {
        self.last_algorithm
    }

    pub fn last_clarity(&self) -> f64 {
        self.last_clarity
    }

    pub fn stable_pitch(&self) -> Option<f64> {
        self.tracker.stable_pitch()
    }

    fn elapsed_ms(&self) -> u64 {
        self.started
            .map(|started| started.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }

    fn clear_rolling_state(&mut self) {
        self.tracker.reset();
        self.smoother.clear();
        self.last_algorithm = None;
        self.last_clarity = 0.0;
    }

    /// Run the estimators on one frame; `(frequency, clarity, algorithm)` of the accepted candidate.
    fn estimate(&mut self, frame: &[T]) -> Result<Option<(f64, f64, Algorithm)>, DetectorError> {
        let sample_rate = self.config.sample_rate;
        let estimators = self
            .estimators
            .as_mut()
            .ok_or(DetectorError::NotInitialized)?;

        if let Some(pitch) = estimators
            .mcleod
            .get_pitch(frame, sample_rate, T::zero(), T::zero())
        {
            let clarity = pitch.clarity.into_f64();
            if clarity >= self.config.clarity_threshold {
                return Ok(Some((pitch.frequency.into_f64(), clarity, Algorithm::Mpm)));
            }
        }

        let yin_clarity = T::from_f64_lossy(1.0 - self.config.yin_threshold);
        Ok(estimators
            .yin
            .get_pitch(frame, sample_rate, T::zero(), yin_clarity)
            .map(|pitch| (pitch.frequency.into_f64(), YIN_CLARITY, Algorithm::Yin)))
    }

    fn unvoiced(&mut self, timestamp: u64, event: TraceEvent) -> Detection {
        self.clear_rolling_state();
        emit(&mut self.trace, event);
        Detection::unvoiced(timestamp)
    }
}

impl<T> PitchDetector<T> for HybridPitchDetector<T>
where
    T: Float,
{
    fn initialize(&mut self) -> Result<(), DetectorError> {
        self.config.validate()?;
        let size = self.config.frame_size;
        self.estimators = Some(Estimators {
            mcleod: McLeodDetector::with_cutoff(size, size, self.config.key_maximum_cutoff),
            yin: YINDetector::new(size),
        });
        self.clear_rolling_state();
        self.started = Some(Instant::now());
        log::debug!(
            "hybrid detector ready: {} Hz, {}-sample frames, range [{}, {}] Hz",
            self.config.sample_rate,
            size,
            self.config.min_frequency,
            self.config.max_frequency
        );
        Ok(())
    }

    fn detect(&mut self, frame: &[T]) -> Result<Detection, DetectorError> {
        if self.estimators.is_none() {
            return Err(DetectorError::NotInitialized);
        }
        if frame.len() != self.config.frame_size {
            return Err(DetectorError::FrameSizeMismatch {
                expected: self.config.frame_size,
                actual: frame.len(),
            });
        }
        let timestamp = self.elapsed_ms();

        let energy = rms(frame);
        if energy < self.config.threshold {
            return Ok(self.unvoiced(timestamp, TraceEvent::Silence { rms: energy }));
        }

        let (raw, clarity, algorithm) = match self.estimate(frame)? {
            Some(candidate) if candidate.0.is_finite() && candidate.0 > 0.0 => candidate,
            _ => return Ok(self.unvoiced(timestamp, TraceEvent::Unvoiced)),
        };

        if raw < self.config.min_frequency || raw > self.config.max_frequency {
            return Ok(self.unvoiced(timestamp, TraceEvent::OutOfRange { frequency: raw }));
        }

        let (corrected, decision) = self.tracker.correct(raw);
        match decision {
            OctaveDecision::Corrected { from } => emit(
                &mut self.trace,
                TraceEvent::OctaveCorrected {
                    from,
                    to: corrected,
                },
            ),
            OctaveDecision::NewNote => emit(
                &mut self.trace,
                TraceEvent::NewNote {
                    frequency: corrected,
                },
            ),
            _ => {}
        }

        let smoothed = self.smoother.push(corrected);
        self.last_algorithm = Some(algorithm);
        self.last_clarity = clarity;
        emit(
            &mut self.trace,
            TraceEvent::Detected {
                raw: corrected,
                smoothed,
                clarity,
                algorithm,
            },
        );

        Ok(Detection {
            frequency: Some(smoothed),
            confidence: clarity,
            timestamp,
            raw_frequency: Some(corrected),
            algorithm: Some(algorithm),
        })
    }

    fn reset(&mut self) {
        self.clear_rolling_state();
    }

    fn dispose(&mut self) {
        self.estimators = None;
        self.started = None;
        self.clear_rolling_state();
    }

    fn describe(&self) -> DetectorInfo {
        DetectorInfo {
            name: "hybrid-mpm-yin".into(),
            sample_rate: self.config.sample_rate,
            frame_size: self.config.frame_size,
            min_frequency: self.config.min_frequency,
            max_frequency: self.config.max_frequency,
            is_ready: self.estimators.is_some(),
            clarity_threshold: Some(self.config.clarity_threshold),
            history_size: Some(self.config.history_size),
        }
    }
}
