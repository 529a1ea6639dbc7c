//! Synthetic test signals with exact ground truth.
//!
//! Every generator is deterministic; only [noise::add_noise] draws random numbers.
//! Ground truth is sampled on a fixed [GROUND_TRUTH_STEP] grid.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

pub mod frames;
pub mod noise;

pub use frames::{generate_frames, FrameSequence, FramedSample};
pub use noise::{add_noise, add_noise_with_rng};

/// Spacing of generated ground-truth points, in seconds.
pub const GROUND_TRUTH_STEP: f64 = 0.01;
/// Length of the linear attack and release applied to each scale note.
pub const NOTE_RAMP: f64 = 0.01;
/// Ground truth is withheld this close to a note boundary.
pub const NOTE_EDGE_GUARD: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundTruthPoint {
    /// Seconds from the start of the buffer.
    pub time: f64,
    pub frequency: f64,
}

/// A sung (or synthesized) note with a known target pitch, used for latency measurements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteTarget {
    pub start_time: f64,
    pub end_time: f64,
    pub frequency: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestSignal {
    pub buffer: Vec<f64>,
    pub ground_truth: Vec<GroundTruthPoint>,
    pub notes: Vec<NoteTarget>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TestKind {
    PureTone,
    Voice,
    Scale,
    Sweep,
    Noisy,
}

impl TestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestKind::PureTone => "pureTone",
            TestKind::Voice => "voice",
            TestKind::Scale => "scale",
            TestKind::Sweep => "sweep",
            TestKind::Noisy => "noisy",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    pub name: String,
    pub kind: TestKind,
    pub signal: TestSignal,
    pub snr_db: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScaleKind {
    Major,
    Minor,
    Chromatic,
    Pentatonic,
    Blues,
}

impl ScaleKind {
    /// Semitone offsets from the root, always spanning 0 to 12.
    pub fn intervals(&self) -> &'static [u32] {
        match self {
            ScaleKind::Major => &[0, 2, 4, 5, 7, 9, 11, 12],
            ScaleKind::Minor => &[0, 2, 3, 5, 7, 8, 10, 12],
            ScaleKind::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
            ScaleKind::Pentatonic => &[0, 2, 4, 7, 9, 12],
            ScaleKind::Blues => &[0, 3, 5, 6, 7, 10, 12],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScaleKind::Major => "major",
            ScaleKind::Minor => "minor",
            ScaleKind::Chromatic => "chromatic",
            ScaleKind::Pentatonic => "pentatonic",
            ScaleKind::Blues => "blues",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SweepCurve {
    Linear,
    /// Equal ratios in equal times; perceptually linear.
    Logarithmic,
}

/// The harmonic weights of the canonical "voice" fixtures, fundamental first.
pub const VOICE_HARMONICS: [f64; 5] = [1.0, 0.5, 0.3, 0.2, 0.1];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestSignalGenerator {
    sample_rate: usize,
}

impl Default for TestSignalGenerator {
    fn default() -> Self {
        TestSignalGenerator::new(44100)
    }
}

fn sample_count(duration: f64, sample_rate: usize) -> usize {
    (duration * sample_rate as f64).round().max(0.0) as usize
}

/// Grid times in `[0, duration)`.
fn grid(duration: f64) -> impl Iterator<Item = f64> {
    (0..)
        .map(|k| k as f64 * GROUND_TRUTH_STEP)
        .take_while(move |&t| t < duration)
}

impl TestSignalGenerator {
    pub fn new(sample_rate: usize) -> Self {
        TestSignalGenerator { sample_rate }
    }

    pub fn sample_rate(&self) -> usize {
        self.sample_rate
    }

    pub fn pure_tone(&self, frequency: f64, duration: f64, amplitude: f64) -> TestSignal {
        self.harmonic_stack(frequency, duration, amplitude, &[1.0])
    }

    /// A crude vowel: the fundamental plus harmonics with `weights`, normalized to sum to one.
    pub fn voice(&self, fundamental: f64, duration: f64, amplitude: f64, weights: &[f64]) -> TestSignal {
        self.harmonic_stack(fundamental, duration, amplitude, weights)
    }

    fn harmonic_stack(
        &self,
        fundamental: f64,
        duration: f64,
        amplitude: f64,
        weights: &[f64],
    ) -> TestSignal {
        let total: f64 = weights.iter().sum();
        let norm = if total > 0.0 { total } else { 1.0 };
        let dt = 1.0 / self.sample_rate as f64;

        let buffer = (0..sample_count(duration, self.sample_rate))
            .map(|i| {
                let t = i as f64 * dt;
                let sum: f64 = weights
                    .iter()
                    .enumerate()
                    .map(|(h, w)| w * (2.0 * PI * fundamental * (h + 1) as f64 * t).sin())
                    .sum();
                amplitude * sum / norm
            })
            .collect();

        TestSignal {
            buffer,
            ground_truth: grid(duration)
                .map(|time| GroundTruthPoint {
                    time,
                    frequency: fundamental,
                })
                .collect(),
            notes: vec![NoteTarget {
                start_time: 0.0,
                end_time: duration,
                frequency: fundamental,
            }],
        }
    }

    /// The notes of `kind` starting at `root`, each `note_duration` long with linear ramps.
    pub fn scale(&self, root: f64, kind: ScaleKind, note_duration: f64, amplitude: f64) -> TestSignal {
        let note_len = sample_count(note_duration, self.sample_rate);
        let ramp = sample_count(NOTE_RAMP, self.sample_rate).max(1);
        let sr = self.sample_rate as f64;

        let mut buffer = Vec::with_capacity(note_len * kind.intervals().len());
        let mut ground_truth = Vec::new();
        let mut notes = Vec::with_capacity(kind.intervals().len());

        for (n, &semitones) in kind.intervals().iter().enumerate() {
            let frequency = root * 2f64.powf(semitones as f64 / 12.0);
            let start_sample = n * note_len;
            buffer.extend((0..note_len).map(|i| {
                let gain = if i < ramp {
                    i as f64 / ramp as f64
                } else if i + ramp >= note_len {
                    (note_len - 1 - i) as f64 / ramp as f64
                } else {
                    1.0
                };
                amplitude * gain * (2.0 * PI * frequency * i as f64 / sr).sin()
            }));

            let start_time = start_sample as f64 / sr;
            let end_time = (start_sample + note_len) as f64 / sr;
            notes.push(NoteTarget {
                start_time,
                end_time,
                frequency,
            });
            ground_truth.extend(
                grid(end_time)
                    .filter(|&t| {
                        t - start_time >= NOTE_EDGE_GUARD - 1e-9
                            && end_time - t >= NOTE_EDGE_GUARD - 1e-9
                    })
                    .map(|time| GroundTruthPoint { time, frequency }),
            );
        }

        TestSignal {
            buffer,
            ground_truth,
            notes,
        }
    }

    /// A glissando from `start` to `end` Hz. The phase is accumulated sample by sample so
    /// the waveform stays continuous while the frequency moves.
    pub fn sweep(
        &self,
        start: f64,
        end: f64,
        duration: f64,
        curve: SweepCurve,
        amplitude: f64,
    ) -> TestSignal {
        let sr = self.sample_rate as f64;
        let mut phase: f64 = 0.0;
        let buffer = (0..sample_count(duration, self.sample_rate))
            .map(|i| {
                let sample = amplitude * phase.sin();
                phase += 2.0 * PI * sweep_frequency(start, end, duration, curve, i as f64 / sr) / sr;
                if phase > 2.0 * PI {
                    phase -= 2.0 * PI;
                }
                sample
            })
            .collect();

        TestSignal {
            buffer,
            ground_truth: grid(duration)
                .map(|time| GroundTruthPoint {
                    time,
                    frequency: sweep_frequency(start, end, duration, curve, time),
                })
                .collect(),
            notes: Vec::new(),
        }
    }

    /// The canonical evaluation corpus.
    pub fn test_suite(&self) -> Vec<TestCase> {
        let mut cases = Vec::new();

        for &frequency in &[130.81, 220.0, 440.0, 880.0] {
            cases.push(TestCase {
                name: format!("pure_{}hz", frequency),
                kind: TestKind::PureTone,
                signal: self.pure_tone(frequency, 1.0, 0.8),
                snr_db: None,
            });
        }

        for &frequency in &[196.0, 261.63, 392.0] {
            cases.push(TestCase {
                name: format!("voice_{}hz", frequency),
                kind: TestKind::Voice,
                signal: self.voice(frequency, 1.0, 0.8, &VOICE_HARMONICS),
                snr_db: None,
            });
        }

        for &kind in &[ScaleKind::Major, ScaleKind::Minor, ScaleKind::Pentatonic] {
            cases.push(TestCase {
                name: format!("scale_{}_c4", kind.name()),
                kind: TestKind::Scale,
                signal: self.scale(261.63, kind, 0.4, 0.8),
                snr_db: None,
            });
        }

        cases.push(TestCase {
            name: "sweep_220_440_log".into(),
            kind: TestKind::Sweep,
            signal: self.sweep(220.0, 440.0, 2.0, SweepCurve::Logarithmic, 0.8),
            snr_db: None,
        });
        cases.push(TestCase {
            name: "sweep_440_220_linear".into(),
            kind: TestKind::Sweep,
            signal: self.sweep(440.0, 220.0, 2.0, SweepCurve::Linear, 0.8),
            snr_db: None,
        });

        let reference = self.pure_tone(440.0, 1.0, 0.8);
        for &snr_db in &[20.0, 10.0, 5.0] {
            cases.push(TestCase {
                name: format!("noisy_440hz_{}db", snr_db),
                kind: TestKind::Noisy,
                signal: TestSignal {
                    buffer: add_noise(&reference.buffer, snr_db),
                    ground_truth: reference.ground_truth.clone(),
                    notes: reference.notes.clone(),
                },
                snr_db: Some(snr_db),
            });
        }

        cases
    }
}

fn sweep_frequency(start: f64, end: f64, duration: f64, curve: SweepCurve, time: f64) -> f64 {
    let progress = if duration > 0.0 {
        (time / duration).clamp(0.0, 1.0)
    } else {
        1.0
    };
    match curve {
        SweepCurve::Linear => start + (end - start) * progress,
        SweepCurve::Logarithmic => start * (end / start).powf(progress),
    }
}
