//! Frame-to-frame error correction for a stream of raw estimates: octave-jump correction
//! against a slowly tracked reference pitch, then a median over a short history.
//!
//! The ratio bands below are empirical. Downstream accuracy figures are tuned against
//! exactly these values, so they are constants rather than configuration.

use std::collections::VecDeque;

use crate::utils::stats::{median, semitones_between};

const STABLE_BAND: (f64, f64) = (0.97, 1.03);
const OCTAVE_UP_BAND: (f64, f64) = (1.8, 2.2);
const OCTAVE_DOWN_BAND: (f64, f64) = (0.45, 0.55);
const DOUBLE_OCTAVE_UP_BAND: (f64, f64) = (3.6, 4.4);
const STABLE_PITCH_SMOOTHING: f64 = 0.9;
const NEW_NOTE_SEMITONES: f64 = 2.0;

const OUTLIER_BAND: (f64, f64) = (0.7, 1.4);
const MIN_SMOOTHING_SAMPLES: usize = 3;

fn within(ratio: f64, band: (f64, f64)) -> bool {
    ratio >= band.0 && ratio <= band.1
}

/// What the tracker decided about one candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OctaveDecision {
    /// First estimate, or a jump of more than two semitones: the reference restarts here.
    NewNote,
    /// Within 3% of the reference.
    Stable,
    /// A small glide; passed through, reference follows.
    Drift,
    /// An octave-like jump folded back; carries the uncorrected value.
    Corrected { from: f64 },
    /// An octave-like jump left alone (not enough stable history, or out of range).
    Uncorrected,
}

#[derive(Debug, Clone)]
pub struct OctaveTracker {
    stable_pitch: Option<f64>,
    stable_frames: usize,
    consecutive_corrections: usize,
    min_stable_frames: usize,
    max_consecutive_corrections: Option<usize>,
    range: (f64, f64),
}

impl OctaveTracker {
    /// With `max_consecutive_corrections` unset, octave jumps are folded for as long as
    /// they persist.
    pub fn new(
        min_stable_frames: usize,
        max_consecutive_corrections: Option<usize>,
        min_frequency: f64,
        max_frequency: f64,
    ) -> Self {
        OctaveTracker {
            stable_pitch: None,
            stable_frames: 0,
            consecutive_corrections: 0,
            min_stable_frames,
            max_consecutive_corrections,
            range: (min_frequency, max_frequency),
        }
    }

    pub fn stable_pitch(&self) -> Option<f64> {
        self.stable_pitch
    }

    pub fn stable_frames(&self) -> usize {
        self.stable_frames
    }

    pub fn reset(&mut self) {
        self.stable_pitch = None;
        self.stable_frames = 0;
        self.consecutive_corrections = 0;
    }

    /// Feed one in-range candidate; returns the frequency to pass on and why.
    pub fn correct(&mut self, candidate: f64) -> (f64, OctaveDecision) {
        let stable = match self.stable_pitch {
            Some(stable) => stable,
            None => return self.start_note(candidate),
        };

        let ratio = candidate / stable;
        if within(ratio, STABLE_BAND) {
            self.stable_pitch = Some(
                STABLE_PITCH_SMOOTHING * stable + (1.0 - STABLE_PITCH_SMOOTHING) * candidate,
            );
            self.stable_frames += 1;
            self.consecutive_corrections = 0;
            return (candidate, OctaveDecision::Stable);
        }

        let folded = if within(ratio, OCTAVE_UP_BAND) {
            Some(candidate / 2.0)
        } else if within(ratio, OCTAVE_DOWN_BAND) {
            Some(candidate * 2.0)
        } else if within(ratio, DOUBLE_OCTAVE_UP_BAND) {
            Some(candidate / 4.0)
        } else {
            None
        };

        match folded {
            Some(corrected) => {
                let in_range = corrected >= self.range.0 && corrected <= self.range.1;
                if self.stable_frames < self.min_stable_frames || !in_range {
                    return (candidate, OctaveDecision::Uncorrected);
                }
                self.consecutive_corrections += 1;
                let outlasted = self
                    .max_consecutive_corrections
                    .map_or(false, |max| self.consecutive_corrections > max);
                if outlasted {
                    // The jump has outlasted any plausible glitch: the singer really moved.
                    return self.start_note(candidate);
                }
                (corrected, OctaveDecision::Corrected { from: candidate })
            }
            None if semitones_between(candidate, stable).abs() > NEW_NOTE_SEMITONES => {
                self.start_note(candidate)
            }
            None => {
                self.stable_pitch = Some(candidate);
                self.consecutive_corrections = 0;
                (candidate, OctaveDecision::Drift)
            }
        }
    }

    fn start_note(&mut self, candidate: f64) -> (f64, OctaveDecision) {
        self.stable_pitch = Some(candidate);
        self.stable_frames = 1;
        self.consecutive_corrections = 0;
        (candidate, OctaveDecision::NewNote)
    }
}

/// Median over the last `capacity` frequencies, ignoring entries far from the preliminary median.
#[derive(Debug, Clone)]
pub struct MedianSmoother {
    history: VecDeque<f64>,
    capacity: usize,
}

impl MedianSmoother {
    pub fn new(capacity: usize) -> Self {
        MedianSmoother {
            history: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn push(&mut self, frequency: f64) -> f64 {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(frequency);

        if self.history.len() < MIN_SMOOTHING_SAMPLES {
            return frequency;
        }
        filtered_median(self.history.make_contiguous()).unwrap_or(frequency)
    }
}

/// Median of `window` after dropping entries whose ratio to the preliminary median
/// falls outside `(0.7, 1.4)`; the filter only applies if at least three entries survive.
pub fn filtered_median(window: &[f64]) -> Option<f64> {
    let preliminary = median(window)?;
    let filtered: Vec<f64> = window
        .iter()
        .copied()
        .filter(|f| {
            let ratio = f / preliminary;
            ratio > OUTLIER_BAND.0 && ratio < OUTLIER_BAND.1
        })
        .collect();
    if filtered.len() >= MIN_SMOOTHING_SAMPLES {
        median(&filtered)
    } else {
        Some(preliminary)
    }
}
