//! Note segmentation from a combined energy and spectral-flux onset function.
//!
//! The spectrum is deliberately coarse: a few dozen Hann-windowed DFT bins computed by
//! direct summation against precomputed basis tables, log-compressed before the flux is
//! taken. That is plenty to see a new note arrive and keeps the detector independent of
//! the pitch estimators.
//!
//! ```
//! use vocal_pitch::onset::OnsetDetector;
//! use vocal_pitch::signal::{ScaleKind, TestSignalGenerator};
//!
//! let scale = TestSignalGenerator::new(44100).scale(261.63, ScaleKind::Major, 0.4, 0.8);
//! let notes = OnsetDetector::default().detect_notes(&scale.buffer);
//! assert_eq!(notes.len(), 8);
//! ```

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::DetectorError;
use crate::utils::buffer::rms;

/// Half-width of the window the adaptive threshold averages over, in seconds.
const LOCAL_MEAN_RADIUS: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OnsetConfig {
    pub sample_rate: usize,
    pub frame_size: usize,
    pub hop_size: usize,
    /// Number of DFT bins, at multiples of `sample_rate / frame_size` starting from the first.
    pub spectral_bins: usize,
    pub energy_weight: f64,
    pub flux_weight: f64,
    /// Floor of the adaptive onset threshold, on the normalized onset function. Half of
    /// it is the normalized energy below which a frame counts as silent.
    pub energy_threshold: f64,
    pub onset_threshold_multiplier: f64,
    pub min_silence_duration: f64,
    pub min_note_duration: f64,
    /// `γ` in `ln(1 + γ·|X|)`; zero disables compression.
    pub flux_compression: f64,
    /// Smallest divisor used to normalize the flux envelope. Steady notes produce flux
    /// well below it, so their frame-to-frame ripple is not stretched into onsets.
    pub flux_floor: f64,
}

impl Default for OnsetConfig {
    fn default() -> Self {
        OnsetConfig {
            sample_rate: 44100,
            frame_size: 2048,
            hop_size: 512,
            spectral_bins: 64,
            energy_weight: 0.4,
            flux_weight: 0.6,
            energy_threshold: 0.1,
            onset_threshold_multiplier: 1.3,
            min_silence_duration: 0.1,
            min_note_duration: 0.1,
            flux_compression: 100.0,
            flux_floor: 1.0,
        }
    }
}

impl OnsetConfig {
    pub fn validate(&self) -> Result<(), DetectorError> {
        if self.sample_rate == 0 || self.frame_size == 0 || self.hop_size == 0 {
            return Err(DetectorError::InvalidConfig(format!(
                "onset sample rate {}, frame size {} and hop size {} must be positive",
                self.sample_rate, self.frame_size, self.hop_size
            )));
        }
        if self.spectral_bins == 0 || self.spectral_bins >= self.frame_size / 2 {
            return Err(DetectorError::InvalidConfig(format!(
                "{} spectral bins do not fit a {}-sample frame",
                self.spectral_bins, self.frame_size
            )));
        }
        if self.energy_weight < 0.0
            || self.flux_weight < 0.0
            || self.flux_compression < 0.0
            || self.flux_floor < 0.0
        {
            return Err(DetectorError::InvalidConfig(
                "onset weights, compression and flux floor must not be negative".into(),
            ));
        }
        Ok(())
    }

    fn frames_for(&self, seconds: f64) -> usize {
        (seconds * self.sample_rate as f64 / self.hop_size as f64).ceil() as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub start_time: f64,
    pub end_time: f64,
    pub start_sample: usize,
    /// Exclusive.
    pub end_sample: usize,
}

impl Note {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteValidation {
    pub detected_count: usize,
    pub expected_count: usize,
    pub is_correct: bool,
    /// `detected_count - expected_count`.
    pub difference: i64,
}

/// Per-frame envelopes. Energy is normalized by its maximum, flux by its maximum or
/// `flux_floor`, whichever is larger.
#[derive(Debug, Clone, PartialEq)]
pub struct OnsetEnvelope {
    pub energy: Vec<f64>,
    pub flux: Vec<f64>,
    pub strength: Vec<f64>,
}

pub struct OnsetDetector {
    config: OnsetConfig,
    /// Windowed cosine and sine tables, one pair per bin.
    basis: Vec<(Vec<f64>, Vec<f64>)>,
}

impl Default for OnsetDetector {
    fn default() -> Self {
        Self::build(OnsetConfig::default())
    }
}

/// Divide by the maximum, or by `floor` when the maximum is smaller.
fn normalize(envelope: &mut [f64], floor: f64) {
    let max = envelope.iter().copied().fold(0.0, f64::max);
    let denominator = if max > floor { max } else { floor };
    envelope.iter_mut().for_each(|v| *v /= denominator);
}

impl OnsetDetector {
    pub fn new(config: OnsetConfig) -> Result<Self, DetectorError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: OnsetConfig) -> Self {
        let size = config.frame_size;
        let window: Vec<f64> = (0..size)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / (size.max(2) - 1) as f64).cos())
            .collect();
        let basis = (0..config.spectral_bins)
            .map(|k| {
                let omega = 2.0 * PI * (k + 1) as f64 / size as f64;
                let cos = window
                    .iter()
                    .enumerate()
                    .map(|(i, w)| w * (omega * i as f64).cos())
                    .collect();
                let sin = window
                    .iter()
                    .enumerate()
                    .map(|(i, w)| w * (omega * i as f64).sin())
                    .collect();
                (cos, sin)
            })
            .collect();
        OnsetDetector { config, basis }
    }

    pub fn config(&self) -> &OnsetConfig {
        &self.config
    }

    fn frame_count(&self, len: usize) -> usize {
        if len < self.config.frame_size {
            0
        } else {
            (len - self.config.frame_size) / self.config.hop_size + 1
        }
    }

    fn spectrum(&self, frame: &[f64], magnitudes: &mut Vec<f64>) {
        let gamma = self.config.flux_compression;
        let scale = frame.len() as f64;
        magnitudes.clear();
        magnitudes.extend(self.basis.iter().map(|(cos, sin)| {
            let (re, im) = frame
                .iter()
                .zip(cos.iter().zip(sin))
                .fold((0.0, 0.0), |(re, im), (x, (c, s))| (re + x * c, im + x * s));
            let magnitude = (re * re + im * im).sqrt() / scale;
            if gamma > 0.0 {
                (gamma * magnitude).ln_1p()
            } else {
                magnitude
            }
        }));
    }

    /// Energy, spectral flux and their weighted sum for every whole frame of `buffer`.
    pub fn onset_envelope(&self, buffer: &[f64]) -> OnsetEnvelope {
        let frames = self.frame_count(buffer.len());
        let mut energy = Vec::with_capacity(frames);
        let mut flux = Vec::with_capacity(frames);
        let mut previous = Vec::with_capacity(self.basis.len());
        let mut current = Vec::with_capacity(self.basis.len());

        for index in 0..frames {
            let start = index * self.config.hop_size;
            let frame = &buffer[start..start + self.config.frame_size];
            energy.push(rms(frame));

            self.spectrum(frame, &mut current);
            if index == 0 {
                flux.push(0.0);
            } else {
                flux.push(
                    current
                        .iter()
                        .zip(&previous)
                        .map(|(now, before): (&f64, &f64)| (now - before).max(0.0))
                        .sum(),
                );
            }
            std::mem::swap(&mut previous, &mut current);
        }

        normalize(&mut energy, f64::MIN_POSITIVE);
        normalize(&mut flux, self.config.flux_floor.max(f64::MIN_POSITIVE));
        let strength = energy
            .iter()
            .zip(&flux)
            .map(|(e, f)| self.config.energy_weight * e + self.config.flux_weight * f)
            .collect();

        OnsetEnvelope {
            energy,
            flux,
            strength,
        }
    }

    /// Frame indices of onsets, ascending, after merging near neighbours.
    pub fn onset_frames(&self, envelope: &OnsetEnvelope) -> Vec<usize> {
        let strength = &envelope.strength;
        let frames = strength.len();
        let radius =
            (LOCAL_MEAN_RADIUS * self.config.sample_rate as f64 / self.config.hop_size as f64).round()
                as usize;

        let mut candidates = Vec::new();
        if frames > 0 && envelope.energy[0] >= self.config.energy_threshold {
            // Sound from the very first frame: nothing rises, but a note starts here.
            candidates.push(0);
        }
        for index in 0..frames {
            let lo = index.saturating_sub(radius);
            let hi = (index + radius + 1).min(frames);
            let local_mean = strength[lo..hi].iter().sum::<f64>() / (hi - lo) as f64;
            let threshold = self
                .config
                .energy_threshold
                .max(local_mean * self.config.onset_threshold_multiplier);

            let value = strength[index];
            let left = index.checked_sub(1).map_or(f64::NEG_INFINITY, |i| strength[i]);
            let right = strength.get(index + 1).copied().unwrap_or(f64::NEG_INFINITY);
            if value > left && value >= right && value > threshold && candidates.last() != Some(&index) {
                candidates.push(index);
            }
        }

        let min_gap = self.config.frames_for(self.config.min_silence_duration);
        let mut onsets: Vec<usize> = Vec::with_capacity(candidates.len());
        for index in candidates {
            match onsets.last_mut() {
                Some(last) if index - *last < min_gap => {
                    if strength[index] > strength[*last] {
                        *last = index;
                    }
                }
                _ => onsets.push(index),
            }
        }
        onsets
    }

    /// Segment `buffer` into notes, ordered and non-overlapping.
    pub fn detect_notes(&self, buffer: &[f64]) -> Vec<Note> {
        if buffer.len() < self.config.frame_size {
            return Vec::new();
        }
        let envelope = self.onset_envelope(buffer);
        let onsets = self.onset_frames(&envelope);
        let frames = envelope.energy.len();
        let silence_level = self.config.energy_threshold / 2.0;
        let silence_frames = self.config.frames_for(self.config.min_silence_duration).max(1);
        let hop = self.config.hop_size;
        let sr = self.config.sample_rate as f64;

        let notes: Vec<Note> = onsets
            .iter()
            .enumerate()
            .filter_map(|(n, &onset)| {
                let limit = onsets.get(n + 1).copied().unwrap_or(frames);
                let mut run_start = None;
                let mut silent_from = None;
                for index in onset + 1..limit {
                    if envelope.energy[index] < silence_level {
                        let start = *run_start.get_or_insert(index);
                        if index + 1 - start >= silence_frames {
                            silent_from = Some(start);
                            break;
                        }
                    } else {
                        run_start = None;
                    }
                }

                let start_sample = onset * hop;
                let end_sample = match (silent_from, onsets.get(n + 1)) {
                    (Some(frame), _) => frame * hop,
                    (None, Some(&next)) => next * hop,
                    (None, None) => buffer.len(),
                }
                .min(buffer.len());

                let note = Note {
                    start_time: start_sample as f64 / sr,
                    end_time: end_sample as f64 / sr,
                    start_sample,
                    end_sample,
                };
                (end_sample > start_sample && note.duration() >= self.config.min_note_duration)
                    .then_some(note)
            })
            .collect();

        log::debug!(
            "{} onsets, {} notes in {:.2} s",
            onsets.len(),
            notes.len(),
            buffer.len() as f64 / sr
        );
        notes
    }

    pub fn extract_note_audio<'a>(&self, buffer: &'a [f64], note: &Note) -> &'a [f64] {
        let end = note.end_sample.min(buffer.len());
        let start = note.start_sample.min(end);
        &buffer[start..end]
    }

    pub fn validate(&self, notes: &[Note], expected_count: usize) -> NoteValidation {
        NoteValidation {
            detected_count: notes.len(),
            expected_count,
            is_correct: notes.len() == expected_count,
            difference: notes.len() as i64 - expected_count as i64,
        }
    }
}
