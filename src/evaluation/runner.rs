//! Drives registered detectors over buffers and turns their output into reports.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::detector::PitchDetector;
use crate::error::{DetectorError, EvaluationError};
use crate::evaluation::metrics::{Comparison, LatencyReport, Metrics, PitchEvaluator, Winner};
use crate::evaluation::FrameDetection;
use crate::onset::{NoteValidation, OnsetDetector};
use crate::signal::{generate_frames, GroundTruthPoint, TestKind, TestSignalGenerator};
use crate::utils::stats::{cents_between, mean, ratio, std_dev};

/// Two detectors agree on a frame when both are voiced and within this many cents.
pub const AGREEMENT_TOLERANCE_CENTS: f64 = 50.0;

const TALLIED_METRICS: [&str; 3] = ["rpa", "gpe", "octaveErrorRate"];

pub type BoxedDetector = Box<dyn PitchDetector<f64>>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RunnerConfig {
    pub sample_rate: usize,
    pub hop_size: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        RunnerConfig {
            sample_rate: 44100,
            hop_size: 512,
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<(), DetectorError> {
        if self.sample_rate == 0 || self.hop_size == 0 {
            return Err(DetectorError::InvalidConfig(format!(
                "runner sample rate {} and hop size {} must be positive",
                self.sample_rate, self.hop_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub name: String,
    pub kind: TestKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snr_db: Option<f64>,
    pub metrics: Metrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencyReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KindSummary {
    pub tests: usize,
    pub mean_rpa: Option<f64>,
    pub mean_gpe: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteReport {
    pub detector: String,
    pub tests: Vec<TestResult>,
    /// Keyed by the serialized test kind (`pureTone`, `scale`, ...).
    pub by_kind: BTreeMap<String, KindSummary>,
    pub overall: KindSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteReport {
    pub index: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub frame_count: usize,
    pub mean_frequency: Option<f64>,
    /// Spread of the voiced frames around their mean, in cents.
    pub std_cents: Option<f64>,
    pub voiced_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingReport {
    pub detector: String,
    pub validation: NoteValidation,
    pub notes: Vec<NoteReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementReport {
    pub frames: usize,
    pub jointly_voiced_frames: usize,
    pub agreeing_frames: usize,
    pub agreement: Option<f64>,
    pub tolerance_cents: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum DetectorComparison {
    /// No ground truth: how often the two detectors agree with each other.
    Agreement(AgreementReport),
    GroundTruth(Comparison),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinTally {
    pub detector1: usize,
    pub detector2: usize,
    pub ties: usize,
}

impl WinTally {
    fn record(&mut self, winner: Winner) {
        match winner {
            Winner::First => self.detector1 += 1,
            Winner::Second => self.detector2 += 1,
            Winner::Tie => self.ties += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ABTestResult {
    pub name: String,
    pub kind: TestKind,
    pub comparison: Comparison,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ABReport {
    pub detector1: String,
    pub detector2: String,
    pub tests: Vec<ABTestResult>,
    pub tallies: BTreeMap<String, WinTally>,
    /// Decided by RPA wins alone.
    pub overall_winner: Winner,
}

struct Run {
    detections: Vec<FrameDetection>,
    expected: Vec<Option<f64>>,
}

fn drive(
    detector: &mut dyn PitchDetector<f64>,
    buffer: &[f64],
    ground_truth: &[GroundTruthPoint],
    sample_rate: usize,
    hop_size: usize,
) -> Result<Run, DetectorError> {
    let frame_size = detector.describe().frame_size;
    let frames = generate_frames(buffer, ground_truth, frame_size, hop_size, sample_rate);
    let mut run = Run {
        detections: Vec::with_capacity(frames.len()),
        expected: Vec::with_capacity(frames.len()),
    };
    for sample in frames.iter() {
        let detection = detector.detect(sample.frame)?;
        run.detections.push(FrameDetection::new(&detection, sample.time));
        run.expected.push(sample.expected_frequency);
    }
    Ok(run)
}

fn summarize(tests: &[&TestResult]) -> KindSummary {
    let rpa: Vec<f64> = tests.iter().filter_map(|t| t.metrics.rpa).collect();
    let gpe: Vec<f64> = tests.iter().filter_map(|t| t.metrics.gpe).collect();
    KindSummary {
        tests: tests.len(),
        mean_rpa: mean(&rpa),
        mean_gpe: mean(&gpe),
    }
}

fn nearest_in_time(detections: &[FrameDetection], time: f64) -> Option<&FrameDetection> {
    let after = detections.partition_point(|d| d.time < time);
    [after.checked_sub(1), Some(after)]
        .iter()
        .flatten()
        .filter_map(|&i| detections.get(i))
        .min_by(|a, b| (a.time - time).abs().total_cmp(&(b.time - time).abs()))
}

fn agreement(first: &[FrameDetection], second: &[FrameDetection]) -> AgreementReport {
    let mut jointly_voiced = 0;
    let mut agreeing = 0;
    for a in first {
        let pair = nearest_in_time(second, a.time).and_then(|b| a.frequency.zip(b.frequency));
        if let Some((fa, fb)) = pair {
            jointly_voiced += 1;
            if cents_between(fa, fb).abs() <= AGREEMENT_TOLERANCE_CENTS {
                agreeing += 1;
            }
        }
    }
    AgreementReport {
        frames: first.len(),
        jointly_voiced_frames: jointly_voiced,
        agreeing_frames: agreeing,
        agreement: ratio(agreeing, jointly_voiced),
        tolerance_cents: AGREEMENT_TOLERANCE_CENTS,
    }
}

/// A registry of named detectors plus everything needed to evaluate them.
///
/// Detectors are driven one at a time, each from the start of its rolling state
/// (`reset()` is called before every buffer).
pub struct EvaluationRunner {
    config: RunnerConfig,
    evaluator: PitchEvaluator,
    onset: OnsetDetector,
    generator: TestSignalGenerator,
    detectors: BTreeMap<String, BoxedDetector>,
}

impl Default for EvaluationRunner {
    fn default() -> Self {
        Self::from_parts(
            RunnerConfig::default(),
            PitchEvaluator::default(),
            OnsetDetector::default(),
        )
    }
}

impl EvaluationRunner {
    pub fn new(config: &EngineConfig) -> Result<Self, DetectorError> {
        config.validate()?;
        Ok(Self::from_parts(
            config.runner,
            PitchEvaluator::new(config.evaluator),
            OnsetDetector::new(config.onset.clone())?,
        ))
    }

    fn from_parts(config: RunnerConfig, evaluator: PitchEvaluator, onset: OnsetDetector) -> Self {
        EvaluationRunner {
            generator: TestSignalGenerator::new(config.sample_rate),
            config,
            evaluator,
            onset,
            detectors: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &PitchEvaluator {
        &self.evaluator
    }

    pub fn generator(&self) -> &TestSignalGenerator {
        &self.generator
    }

    /// Add (or replace) a detector. Detectors that are not ready yet are initialized here;
    /// a detector that is turned away is disposed first.
    pub fn register_detector(
        &mut self,
        name: impl Into<String>,
        mut detector: BoxedDetector,
    ) -> Result<(), EvaluationError> {
        let name = name.into();
        if !detector.describe().is_ready {
            detector.initialize()?;
        }
        let info = detector.describe();
        if info.sample_rate != self.config.sample_rate {
            detector.dispose();
            return Err(EvaluationError::SampleRateMismatch {
                detector: info.sample_rate,
                runner: self.config.sample_rate,
            });
        }
        log::debug!(
            "registered {} as \"{}\" ({}-sample frames)",
            info.name,
            name,
            info.frame_size
        );
        if let Some(mut previous) = self.detectors.insert(name, detector) {
            previous.dispose();
        }
        Ok(())
    }

    /// Remove a detector from the registry, disposing it.
    pub fn remove_detector(&mut self, name: &str) -> Option<BoxedDetector> {
        self.detectors.remove(name).map(|mut detector| {
            detector.dispose();
            detector
        })
    }

    pub fn detector_names(&self) -> impl Iterator<Item = &str> {
        self.detectors.keys().map(String::as_str)
    }

    fn run(
        &mut self,
        name: &str,
        buffer: &[f64],
        ground_truth: &[GroundTruthPoint],
    ) -> Result<Run, EvaluationError> {
        let RunnerConfig {
            sample_rate,
            hop_size,
        } = self.config;
        let detector = self
            .detectors
            .get_mut(name)
            .ok_or_else(|| EvaluationError::UnknownDetector(name.to_string()))?;
        if !detector.describe().is_ready {
            detector.initialize()?;
        }
        detector.reset();
        Ok(drive(
            &mut **detector,
            buffer,
            ground_truth,
            sample_rate,
            hop_size,
        )?)
    }

    /// Frame `buffer` and collect one [FrameDetection] per frame.
    pub fn run_detector(&mut self, name: &str, buffer: &[f64]) -> Result<Vec<FrameDetection>, EvaluationError> {
        Ok(self.run(name, buffer, &[])?.detections)
    }

    /// Evaluate one detector on the canonical synthetic suite.
    pub fn run_synthetic_tests(&mut self, name: &str) -> Result<SuiteReport, EvaluationError> {
        let suite = self.generator.test_suite();
        let mut tests = Vec::with_capacity(suite.len());

        for case in suite {
            let run = self.run(name, &case.signal.buffer, &case.signal.ground_truth)?;
            let metrics = self.evaluator.evaluate(&run.detections, &run.expected)?;
            let latency = (!case.signal.notes.is_empty())
                .then(|| self.evaluator.evaluate_latency(&run.detections, &case.signal.notes));
            log::debug!("{} on {}: rpa {:?}, gpe {:?}", name, case.name, metrics.rpa, metrics.gpe);
            tests.push(TestResult {
                name: case.name,
                kind: case.kind,
                snr_db: case.snr_db,
                metrics,
                latency,
            });
        }

        let mut grouped: BTreeMap<String, Vec<&TestResult>> = BTreeMap::new();
        for test in &tests {
            grouped.entry(test.kind.as_str().to_string()).or_default().push(test);
        }
        let by_kind = grouped
            .into_iter()
            .map(|(kind, group)| (kind, summarize(&group)))
            .collect();
        let overall = summarize(&tests.iter().collect::<Vec<_>>());

        Ok(SuiteReport {
            detector: name.to_string(),
            tests,
            by_kind,
            overall,
        })
    }

    /// Segment a recording into notes and describe how steadily each was detected.
    pub fn evaluate_user_recording(
        &mut self,
        name: &str,
        buffer: &[f64],
        expected_note_count: usize,
    ) -> Result<RecordingReport, EvaluationError> {
        let notes = self.onset.detect_notes(buffer);
        let validation = self.onset.validate(&notes, expected_note_count);
        if !validation.is_correct {
            log::warn!(
                "expected {} notes, segmented {}",
                expected_note_count,
                validation.detected_count
            );
        }
        let detections = self.run(name, buffer, &[])?.detections;

        let notes = notes
            .iter()
            .enumerate()
            .map(|(index, note)| {
                let frames: Vec<&FrameDetection> = detections
                    .iter()
                    .filter(|d| d.time >= note.start_time && d.time < note.end_time)
                    .collect();
                let voiced: Vec<f64> = frames.iter().filter_map(|d| d.frequency).collect();
                let mean_frequency = mean(&voiced);
                let std_cents = mean_frequency.and_then(|centre| {
                    let cents: Vec<f64> = voiced.iter().map(|&f| cents_between(f, centre)).collect();
                    std_dev(&cents)
                });
                NoteReport {
                    index,
                    start_time: note.start_time,
                    end_time: note.end_time,
                    frame_count: frames.len(),
                    mean_frequency,
                    std_cents,
                    voiced_ratio: ratio(voiced.len(), frames.len()),
                }
            })
            .collect();

        Ok(RecordingReport {
            detector: name.to_string(),
            validation,
            notes,
        })
    }

    fn compare_on_truth(
        &mut self,
        first: &str,
        second: &str,
        buffer: &[f64],
        ground_truth: &[GroundTruthPoint],
    ) -> Result<Comparison, EvaluationError> {
        // Each run is scored on its own frame alignment, so frame sizes may differ.
        let run1 = self.run(first, buffer, ground_truth)?;
        let run2 = self.run(second, buffer, ground_truth)?;
        let metrics1 = self.evaluator.evaluate(&run1.detections, &run1.expected)?;
        let metrics2 = self.evaluator.evaluate(&run2.detections, &run2.expected)?;
        Ok(self.evaluator.compare_metrics(metrics1, metrics2))
    }

    pub fn compare_detectors(
        &mut self,
        first: &str,
        second: &str,
        buffer: &[f64],
        ground_truth: Option<&[GroundTruthPoint]>,
    ) -> Result<DetectorComparison, EvaluationError> {
        match ground_truth {
            Some(truth) => Ok(DetectorComparison::GroundTruth(
                self.compare_on_truth(first, second, buffer, truth)?,
            )),
            None => {
                let run1 = self.run(first, buffer, &[])?;
                let run2 = self.run(second, buffer, &[])?;
                Ok(DetectorComparison::Agreement(agreement(
                    &run1.detections,
                    &run2.detections,
                )))
            }
        }
    }

    /// Compare two detectors on every synthetic test and tally the per-metric winners.
    pub fn run_ab_comparison(&mut self, first: &str, second: &str) -> Result<ABReport, EvaluationError> {
        let mut tallies: BTreeMap<String, WinTally> = TALLIED_METRICS
            .iter()
            .map(|name| (name.to_string(), WinTally::default()))
            .collect();
        let mut tests = Vec::new();

        for case in self.generator.test_suite() {
            let comparison =
                self.compare_on_truth(first, second, &case.signal.buffer, &case.signal.ground_truth)?;
            for (metric, tally) in tallies.iter_mut() {
                tally.record(comparison.winners.get(metric).copied().unwrap_or(Winner::Tie));
            }
            tests.push(ABTestResult {
                name: case.name,
                kind: case.kind,
                comparison,
            });
        }

        let rpa = tallies.get("rpa").copied().unwrap_or_default();
        let overall_winner = match rpa.detector1.cmp(&rpa.detector2) {
            std::cmp::Ordering::Greater => Winner::First,
            std::cmp::Ordering::Less => Winner::Second,
            std::cmp::Ordering::Equal => Winner::Tie,
        };
        log::debug!(
            "{} vs {}: rpa wins {}-{} ({} ties)",
            first,
            second,
            rpa.detector1,
            rpa.detector2,
            rpa.ties
        );

        Ok(ABReport {
            detector1: first.to_string(),
            detector2: second.to_string(),
            tests,
            tallies,
            overall_winner,
        })
    }

    /// Pretty-printed JSON with the camelCase field names of the result types.
    pub fn export_json<R: Serialize + ?Sized>(result: &R) -> Result<String, EvaluationError> {
        Ok(serde_json::to_string_pretty(result)?)
    }

    /// Dispose every registered detector; they stay registered and re-initialize on demand.
    pub fn dispose_all(&mut self) {
        self.detectors.values_mut().for_each(|detector| detector.dispose());
    }
}
