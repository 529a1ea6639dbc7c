use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use vocal_pitch::config::EngineConfig;
use vocal_pitch::detector::hybrid::{HybridConfig, HybridPitchDetector};
use vocal_pitch::detector::readiness::{readiness, ReadySignal, Readiness};
use vocal_pitch::detector::{Detection, DetectorInfo, PitchDetector};
use vocal_pitch::evaluation::report::generate_report;
use vocal_pitch::evaluation::runner::DetectorComparison;
use vocal_pitch::evaluation::{EvaluationRunner, Winner};
use vocal_pitch::signal::ScaleKind;
use vocal_pitch::utils::stats::cents_between;
use vocal_pitch::{DetectorError, EvaluationError};

fn hybrid() -> Box<HybridPitchDetector<f64>> {
    Box::new(HybridPitchDetector::new(HybridConfig::default()))
}

fn runner_with(names: &[&str]) -> EvaluationRunner {
    let mut runner = EvaluationRunner::default();
    for name in names {
        runner.register_detector(*name, hybrid()).unwrap();
    }
    runner
}

#[test]
fn hybrid_passes_the_synthetic_suite() {
    let mut runner = runner_with(&["hybrid"]);
    let report = runner.run_synthetic_tests("hybrid").unwrap();

    assert_eq!(report.detector, "hybrid");
    assert_eq!(report.overall.tests, report.tests.len());
    for test in report.tests.iter().filter(|t| t.name.starts_with("pure_")) {
        let rpa = test.metrics.rpa.unwrap();
        assert!(rpa >= 0.9, "{}: rpa {}", test.name, rpa);
        assert_eq!(test.metrics.octave_error_frames, 0, "{}", test.name);
        let latency = test.latency.as_ref().unwrap();
        assert_eq!(latency.detected_notes, 1);
    }
    let pure = &report.by_kind["pureTone"];
    assert_eq!(pure.tests, 4);
    assert!(pure.mean_rpa.unwrap() >= 0.9);
    assert!(report.by_kind.contains_key("noisy"));
    assert!(report.to_string().contains("pure_440hz"));

    let json = EvaluationRunner::export_json(&report).unwrap();
    assert!(json.contains("\"octaveErrorRate\""));
    assert!(json.contains("\"byKind\""));
}

#[test]
fn user_recording_is_split_into_notes() {
    let mut runner = runner_with(&["hybrid"]);
    let scale = runner.generator().scale(261.63, ScaleKind::Major, 0.4, 0.8);
    let report = runner.evaluate_user_recording("hybrid", &scale.buffer, 8).unwrap();

    assert!(report.validation.is_correct, "{:?}", report.validation);
    assert_eq!(report.notes.len(), 8);
    for (note, target) in report.notes.iter().zip(&scale.notes) {
        let mean = note.mean_frequency.unwrap();
        assert!(
            cents_between(mean, target.frequency).abs() < 100.0,
            "note {}: {} Hz for {} Hz",
            note.index,
            mean,
            target.frequency
        );
        assert!(note.voiced_ratio.unwrap() > 0.8, "{:?}", note);
        assert!(note.frame_count > 0);
    }
    assert!(report.to_string().contains("8 detected, 8 expected (+0)"));
}

#[test]
fn wrong_note_count_is_reported_not_raised() {
    let mut runner = runner_with(&["hybrid"]);
    let tone = runner.generator().pure_tone(330.0, 1.0, 0.8);
    let report = runner.evaluate_user_recording("hybrid", &tone.buffer, 3).unwrap();
    assert!(!report.validation.is_correct);
    assert_eq!(report.validation.difference, -2);
}

fn short_frame_hybrid() -> Box<HybridPitchDetector<f64>> {
    Box::new(HybridPitchDetector::new(HybridConfig {
        frame_size: 1024,
        min_frequency: 120.0,
        ..HybridConfig::default()
    }))
}

#[test]
fn detectors_agree_without_ground_truth() {
    let mut runner = runner_with(&["long"]);
    runner.register_detector("short", short_frame_hybrid()).unwrap();
    let tone = runner.generator().pure_tone(440.0, 1.0, 0.8);

    match runner.compare_detectors("long", "short", &tone.buffer, None).unwrap() {
        DetectorComparison::Agreement(report) => {
            assert!(report.jointly_voiced_frames > 0);
            assert!(report.agreement.unwrap() > 0.9, "{:?}", report);
        }
        other => panic!("expected an agreement report, got {:?}", other),
    }
}

#[test]
fn detectors_are_scored_against_ground_truth() {
    let mut runner = runner_with(&["long"]);
    runner.register_detector("short", short_frame_hybrid()).unwrap();
    let tone = runner.generator().pure_tone(330.0, 1.0, 0.8);

    let comparison = runner
        .compare_detectors("long", "short", &tone.buffer, Some(&tone.ground_truth))
        .unwrap();
    let json = EvaluationRunner::export_json(&comparison).unwrap();
    assert!(json.contains("\"mode\": \"groundTruth\""));
    match comparison {
        DetectorComparison::GroundTruth(comparison) => {
            assert!(comparison.metrics1.rpa.unwrap() > 0.9);
            assert!(comparison.metrics2.rpa.unwrap() > 0.9);
            assert!(comparison.winners.contains_key("rpa"));
            // The shorter frame sees more frames of the same buffer.
            assert!(comparison.metrics2.total_frames > comparison.metrics1.total_frames);
        }
        other => panic!("expected a ground-truth comparison, got {:?}", other),
    }
}

#[test]
fn identical_detectors_tie_everywhere() {
    let mut runner = runner_with(&["a", "b"]);
    let report = runner.run_ab_comparison("a", "b").unwrap();

    assert_eq!(report.overall_winner, Winner::Tie);
    for (metric, tally) in &report.tallies {
        assert_eq!(tally.detector1, 0, "{}", metric);
        assert_eq!(tally.detector2, 0, "{}", metric);
        assert_eq!(tally.ties, report.tests.len(), "{}", metric);
    }
    assert!(report.to_string().ends_with("overall winner: tie\n"));
}

#[test]
fn unknown_detector_is_an_error() {
    let mut runner = runner_with(&["hybrid"]);
    assert!(matches!(
        runner.run_synthetic_tests("nope"),
        Err(EvaluationError::UnknownDetector(name)) if name == "nope"
    ));
    let buffer = vec![0.0; 4096];
    assert!(matches!(
        runner.compare_detectors("hybrid", "nope", &buffer, None),
        Err(EvaluationError::UnknownDetector(_))
    ));
}

#[test]
fn sample_rate_must_match_the_runner() {
    let mut runner = EvaluationRunner::default();
    let detector = HybridPitchDetector::<f64>::new(HybridConfig {
        sample_rate: 48000,
        ..HybridConfig::default()
    });
    assert!(matches!(
        runner.register_detector("fast", Box::new(detector)),
        Err(EvaluationError::SampleRateMismatch {
            detector: 48000,
            runner: 44100
        })
    ));
    assert_eq!(runner.detector_names().count(), 0);
}

/// Hands out a flag that is raised when the detector is disposed.
struct WatchedDetector {
    inner: HybridPitchDetector<f64>,
    disposed: Arc<AtomicBool>,
}

impl PitchDetector<f64> for WatchedDetector {
    fn initialize(&mut self) -> Result<(), DetectorError> {
        self.inner.initialize()
    }

    fn detect(&mut self, frame: &[f64]) -> Result<Detection, DetectorError> {
        self.inner.detect(frame)
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn dispose(&mut self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.inner.dispose();
    }

    fn describe(&self) -> DetectorInfo {
        self.inner.describe()
    }
}

#[test]
fn rejected_detector_is_disposed() {
    let disposed = Arc::new(AtomicBool::new(false));
    let detector = WatchedDetector {
        inner: HybridPitchDetector::new(HybridConfig {
            sample_rate: 48000,
            ..HybridConfig::default()
        }),
        disposed: Arc::clone(&disposed),
    };

    let mut runner = EvaluationRunner::default();
    assert!(matches!(
        runner.register_detector("fast", Box::new(detector)),
        Err(EvaluationError::SampleRateMismatch { .. })
    ));
    assert!(disposed.load(Ordering::SeqCst));
}

#[test]
fn disposed_detectors_come_back_on_demand() {
    let mut runner = runner_with(&["hybrid"]);
    runner.dispose_all();
    let tone = runner.generator().pure_tone(220.0, 0.5, 0.8);
    let detections = runner.run_detector("hybrid", &tone.buffer).unwrap();
    assert!(detections.iter().any(|d| d.frequency.is_some()));

    let removed = runner.remove_detector("hybrid").unwrap();
    assert!(!removed.describe().is_ready);
    assert!(runner.remove_detector("hybrid").is_none());
}

#[test]
fn runner_built_from_a_config_document() {
    let config = EngineConfig::from_json(r#"{ "runner": { "hopSize": 1024 } }"#).unwrap();
    let mut runner = EvaluationRunner::new(&config).unwrap();
    runner.register_detector("hybrid", hybrid()).unwrap();
    let tone = runner.generator().pure_tone(440.0, 1.0, 0.8);
    let detections = runner.run_detector("hybrid", &tone.buffer).unwrap();
    assert_eq!(detections.len(), (44100 - 2048) / 1024 + 1);

    let metrics = runner
        .evaluator()
        .evaluate(&detections, &vec![Some(440.0); detections.len()])
        .unwrap();
    assert!(generate_report(&metrics, "hybrid").starts_with("=== hybrid ==="));
}

/// A detector whose model arrives from a loader thread.
struct StreamingDetector {
    ready: Readiness,
    inner: HybridPitchDetector<f64>,
}

impl StreamingDetector {
    fn new() -> (ReadySignal, Self) {
        let (signal, ready) = readiness();
        let detector = StreamingDetector {
            ready,
            inner: HybridPitchDetector::new(HybridConfig::default()),
        };
        (signal, detector)
    }
}

impl PitchDetector<f64> for StreamingDetector {
    fn initialize(&mut self) -> Result<(), DetectorError> {
        self.ready.wait(Duration::from_secs(5))?;
        self.inner.initialize()
    }

    fn detect(&mut self, frame: &[f64]) -> Result<Detection, DetectorError> {
        self.inner.detect(frame)
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn dispose(&mut self) {
        self.inner.dispose();
    }

    fn describe(&self) -> DetectorInfo {
        DetectorInfo {
            name: "streaming".into(),
            ..self.inner.describe()
        }
    }
}

#[test]
fn registration_waits_for_a_loader_thread() {
    let (signal, detector) = StreamingDetector::new();
    let loader = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        signal.succeed();
    });

    let mut runner = EvaluationRunner::default();
    runner.register_detector("streaming", Box::new(detector)).unwrap();
    loader.join().unwrap();

    let tone = runner.generator().pure_tone(440.0, 0.5, 0.8);
    let detections = runner.run_detector("streaming", &tone.buffer).unwrap();
    assert!(detections.last().unwrap().frequency.is_some());
}

#[test]
fn failed_loader_fails_registration() {
    let (signal, detector) = StreamingDetector::new();
    thread::spawn(move || signal.fail("model checksum mismatch"))
        .join()
        .unwrap();

    let mut runner = EvaluationRunner::default();
    match runner.register_detector("streaming", Box::new(detector)) {
        Err(EvaluationError::Detector(DetectorError::InitializationFailed(reason))) => {
            assert_eq!(reason, "model checksum mismatch")
        }
        other => panic!("unexpected registration outcome {:?}", other.map(|_| ())),
    }
    assert_eq!(runner.detector_names().count(), 0);
}
