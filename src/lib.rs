//! # Vocal Pitch
//! *vocal_pitch* estimates the fundamental frequency of a singing voice frame by frame,
//! and measures how well it (or any other detector) does on synthetic and recorded material.
//!
//! # Detectors
//! A *detector* implements the [PitchDetector][detector::PitchDetector] lifecycle:
//! `initialize`, `detect` once per frame, `reset`, `dispose`, `describe`.
//!
//!   * [HybridPitchDetector][detector::hybrid] runs the McLeod estimator and falls back to
//!     YIN, then corrects octave jumps and median-smooths the result.
//!   * [McLeodDetector][detector::mcleod] and [YINDetector][detector::yin] are the raw,
//!     stateless estimators behind it.
//!
//! # Evaluation
//!   * [signal] synthesizes tones, harmonic stacks, scales, sweeps and noisy variants with
//!     exact ground truth.
//!   * [onset] cuts a recording into notes.
//!   * [evaluation] computes RPA, GPE, octave-error and voicing metrics, and its
//!     [EvaluationRunner][evaluation::EvaluationRunner] compares registered detectors.
//!
//! # Examples
//! ```
//! use vocal_pitch::detector::hybrid::{HybridConfig, HybridPitchDetector};
//! use vocal_pitch::evaluation::EvaluationRunner;
//!
//! fn main() {
//!     let mut runner = EvaluationRunner::default();
//!     runner
//!         .register_detector("hybrid", Box::new(HybridPitchDetector::new(HybridConfig::default())))
//!         .unwrap();
//!
//!     let tone = runner.generator().pure_tone(440.0, 0.5, 0.8);
//!     let detections = runner.run_detector("hybrid", &tone.buffer).unwrap();
//!     let last = detections.last().unwrap();
//!
//!     println!("Frequency: {:?}, Confidence: {}", last.frequency, last.confidence);
//! }
//! ```

pub use detector::internals::Pitch;
pub use error::{DetectorError, EvaluationError};

pub mod config;
pub mod detector;
pub mod error;
pub mod evaluation;
pub mod float;
pub mod onset;
pub mod signal;
pub mod utils;
