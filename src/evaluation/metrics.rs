//! Accuracy metrics for a detector's frame-by-frame output against ground truth.
//!
//! [PitchEvaluator] holds only its two tolerances; every method is a pure function of its
//! arguments, so evaluating the same input twice gives identical results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EvaluationError;
use crate::evaluation::FrameDetection;
use crate::signal::NoteTarget;
use crate::utils::stats::{cents_between, mean, median, min_max, ratio, std_dev};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EvaluatorConfig {
    /// A voiced frame is correct within this many cents of the expected pitch.
    pub tolerance_cents: f64,
    /// A voiced frame further than this many cents off is a gross error.
    pub gross_error_threshold: f64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        EvaluatorConfig {
            tolerance_cents: 50.0,
            gross_error_threshold: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameEvaluation {
    pub expected_voiced: bool,
    pub detected_voiced: bool,
    pub voicing_correct: bool,
    pub is_correct: bool,
    pub is_gross_error: bool,
    pub is_octave_error: bool,
    /// Signed error; `None` unless both frames are voiced.
    pub cents_error: Option<f64>,
    pub confidence: f64,
}

/// Aggregate accuracy of one detector run. Ratios are `None` when their denominator is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub total_frames: usize,
    /// Frames the ground truth marks as voiced.
    pub voiced_frames: usize,
    pub detected_voiced_frames: usize,
    pub correct_frames: usize,
    pub gross_error_frames: usize,
    pub octave_error_frames: usize,
    /// Raw pitch accuracy: correct / voiced.
    pub rpa: Option<f64>,
    /// Gross pitch error: gross errors / voiced.
    pub gpe: Option<f64>,
    pub octave_error_rate: Option<f64>,
    /// Voicing decisions that agree with the ground truth, over all frames.
    pub voicing_accuracy: Option<f64>,
    /// Voiced frames the detector also found voiced.
    pub voicing_recall: Option<f64>,
    pub mean_cents_error: Option<f64>,
    pub std_cents_error: Option<f64>,
    pub median_cents_error: Option<f64>,
    pub mean_abs_cents_error: Option<f64>,
    pub mean_confidence_correct: Option<f64>,
    pub mean_confidence_incorrect: Option<f64>,
    /// Correct voiced frames carry higher mean confidence than incorrect ones.
    pub confidence_discriminates: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyReport {
    pub total_notes: usize,
    pub detected_notes: usize,
    pub detection_rate: Option<f64>,
    pub mean_latency_ms: Option<f64>,
    pub median_latency_ms: Option<f64>,
    pub min_latency_ms: Option<f64>,
    pub max_latency_ms: Option<f64>,
    /// Per note, in order; `None` when the note was never detected in tune.
    pub note_latencies_ms: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    #[serde(rename = "detector1")]
    First,
    #[serde(rename = "detector2")]
    Second,
    #[serde(rename = "tie")]
    Tie,
}

impl Winner {
    pub fn swapped(self) -> Winner {
        match self {
            Winner::First => Winner::Second,
            Winner::Second => Winner::First,
            Winner::Tie => Winner::Tie,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub metrics1: Metrics,
    pub metrics2: Metrics,
    /// `metrics1 - metrics2` per compared metric; `None` if either side is undefined.
    pub differences: BTreeMap<String, Option<f64>>,
    pub winners: BTreeMap<String, Winner>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Polarity {
    HigherIsBetter,
    LowerIsBetter,
}

const COMPARED_METRICS: [(&str, Polarity); 5] = [
    ("rpa", Polarity::HigherIsBetter),
    ("gpe", Polarity::LowerIsBetter),
    ("octaveErrorRate", Polarity::LowerIsBetter),
    ("voicingAccuracy", Polarity::HigherIsBetter),
    ("meanAbsCentsError", Polarity::LowerIsBetter),
];

fn metric_value(metrics: &Metrics, name: &str) -> Option<f64> {
    match name {
        "rpa" => metrics.rpa,
        "gpe" => metrics.gpe,
        "octaveErrorRate" => metrics.octave_error_rate,
        "voicingAccuracy" => metrics.voicing_accuracy,
        "meanAbsCentsError" => metrics.mean_abs_cents_error,
        _ => None,
    }
}

fn voiced(frequency: Option<f64>) -> Option<f64> {
    frequency.filter(|f| f.is_finite() && *f > 0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PitchEvaluator {
    config: EvaluatorConfig,
}

impl PitchEvaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        PitchEvaluator { config }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// `1200 * log2(detected / expected)`; infinite unless both are strictly positive.
    pub fn cents_difference(&self, detected: f64, expected: f64) -> f64 {
        cents_between(detected, expected)
    }

    pub fn evaluate_frame(
        &self,
        detected: Option<f64>,
        expected: Option<f64>,
        confidence: f64,
    ) -> FrameEvaluation {
        let detected = voiced(detected);
        let expected = voiced(expected);
        let mut frame = FrameEvaluation {
            expected_voiced: expected.is_some(),
            detected_voiced: detected.is_some(),
            voicing_correct: expected.is_some() == detected.is_some(),
            is_correct: false,
            is_gross_error: false,
            is_octave_error: false,
            cents_error: None,
            confidence,
        };

        match (detected, expected) {
            (_, None) => frame.is_correct = detected.is_none(),
            (None, Some(_)) => frame.is_gross_error = true,
            (Some(detected), Some(expected)) => {
                let cents = self.cents_difference(detected, expected);
                let tolerance = self.config.tolerance_cents;
                frame.cents_error = Some(cents).filter(|c| c.is_finite());
                frame.is_correct = cents.abs() <= tolerance;
                frame.is_gross_error = cents.abs() > self.config.gross_error_threshold;
                frame.is_octave_error = self
                    .cents_difference(detected, expected * 2.0)
                    .abs()
                    <= tolerance
                    || self.cents_difference(detected, expected / 2.0).abs() <= tolerance;
            }
        }
        frame
    }

    /// Aggregate metrics. `detections[i]` is judged against `ground_truth[i]`.
    pub fn evaluate(
        &self,
        detections: &[FrameDetection],
        ground_truth: &[Option<f64>],
    ) -> Result<Metrics, EvaluationError> {
        if detections.len() != ground_truth.len() {
            return Err(EvaluationError::LengthMismatch {
                detections: detections.len(),
                ground_truth: ground_truth.len(),
            });
        }

        let frames: Vec<FrameEvaluation> = detections
            .iter()
            .zip(ground_truth)
            .map(|(d, &expected)| self.evaluate_frame(d.frequency, expected, d.confidence))
            .collect();
        let voiced_frames: Vec<&FrameEvaluation> =
            frames.iter().filter(|f| f.expected_voiced).collect();

        let count = |pred: fn(&FrameEvaluation) -> bool| voiced_frames.iter().filter(|f| pred(f)).count();
        let correct = count(|f| f.is_correct);
        let gross = count(|f| f.is_gross_error);
        let octave = count(|f| f.is_octave_error);
        let recalled = count(|f| f.detected_voiced);
        let voicing_correct = frames.iter().filter(|f| f.voicing_correct).count();

        let cents: Vec<f64> = voiced_frames.iter().filter_map(|f| f.cents_error).collect();
        let abs_cents: Vec<f64> = cents.iter().map(|c| c.abs()).collect();

        let confidence_of = |want: bool| -> Vec<f64> {
            voiced_frames
                .iter()
                .filter(|f| f.is_correct == want)
                .map(|f| f.confidence)
                .collect()
        };
        let mean_confidence_correct = mean(&confidence_of(true));
        let mean_confidence_incorrect = mean(&confidence_of(false));

        Ok(Metrics {
            total_frames: frames.len(),
            voiced_frames: voiced_frames.len(),
            detected_voiced_frames: frames.iter().filter(|f| f.detected_voiced).count(),
            correct_frames: correct,
            gross_error_frames: gross,
            octave_error_frames: octave,
            rpa: ratio(correct, voiced_frames.len()),
            gpe: ratio(gross, voiced_frames.len()),
            octave_error_rate: ratio(octave, voiced_frames.len()),
            voicing_accuracy: ratio(voicing_correct, frames.len()),
            voicing_recall: ratio(recalled, voiced_frames.len()),
            mean_cents_error: mean(&cents),
            std_cents_error: std_dev(&cents),
            median_cents_error: median(&cents),
            mean_abs_cents_error: mean(&abs_cents),
            mean_confidence_correct,
            mean_confidence_incorrect,
            confidence_discriminates: match (mean_confidence_correct, mean_confidence_incorrect) {
                (Some(correct), Some(incorrect)) => correct > incorrect,
                _ => false,
            },
        })
    }

    /// How long after each note starts the detector first reports it in tune.
    pub fn evaluate_latency(&self, detections: &[FrameDetection], notes: &[NoteTarget]) -> LatencyReport {
        let note_latencies_ms: Vec<Option<f64>> = notes
            .iter()
            .map(|note| {
                detections
                    .iter()
                    .filter(|d| d.time >= note.start_time && d.time < note.end_time)
                    .find(|d| {
                        voiced(d.frequency).map_or(false, |f| {
                            self.cents_difference(f, note.frequency).abs() <= self.config.tolerance_cents
                        })
                    })
                    .map(|d| (d.time - note.start_time) * 1000.0)
            })
            .collect();

        let latencies: Vec<f64> = note_latencies_ms.iter().flatten().copied().collect();
        let range = min_max(&latencies);
        LatencyReport {
            total_notes: notes.len(),
            detected_notes: latencies.len(),
            detection_rate: ratio(latencies.len(), notes.len()),
            mean_latency_ms: mean(&latencies),
            median_latency_ms: median(&latencies),
            min_latency_ms: range.map(|(lo, _)| lo),
            max_latency_ms: range.map(|(_, hi)| hi),
            note_latencies_ms,
        }
    }

    pub fn compare(
        &self,
        detections1: &[FrameDetection],
        detections2: &[FrameDetection],
        ground_truth: &[Option<f64>],
    ) -> Result<Comparison, EvaluationError> {
        let metrics1 = self.evaluate(detections1, ground_truth)?;
        let metrics2 = self.evaluate(detections2, ground_truth)?;
        Ok(self.compare_metrics(metrics1, metrics2))
    }

    /// Per-metric differences and winners for two already-computed metric sets.
    pub fn compare_metrics(&self, metrics1: Metrics, metrics2: Metrics) -> Comparison {
        let mut differences = BTreeMap::new();
        let mut winners = BTreeMap::new();
        for &(name, polarity) in COMPARED_METRICS.iter() {
            let difference = match (metric_value(&metrics1, name), metric_value(&metrics2, name)) {
                (Some(a), Some(b)) => Some(a - b),
                _ => None,
            };
            let winner = match difference {
                Some(d) if d > 0.0 && polarity == Polarity::HigherIsBetter => Winner::First,
                Some(d) if d > 0.0 => Winner::Second,
                Some(d) if d < 0.0 && polarity == Polarity::HigherIsBetter => Winner::Second,
                Some(d) if d < 0.0 => Winner::First,
                _ => Winner::Tie,
            };
            differences.insert(name.to_string(), difference);
            winners.insert(name.to_string(), winner);
        }
        Comparison {
            metrics1,
            metrics2,
            differences,
            winners,
        }
    }
}
