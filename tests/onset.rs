use std::path::PathBuf;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use vocal_pitch::onset::{Note, OnsetDetector};
use vocal_pitch::signal::{ScaleKind, TestSignal, TestSignalGenerator};

const SAMPLE_RATE: usize = 44100;
const NOTE_DURATION: f64 = 0.4;

fn scale(kind: ScaleKind, amplitude: f64) -> TestSignal {
    TestSignalGenerator::new(SAMPLE_RATE).scale(261.63, kind, NOTE_DURATION, amplitude)
}

fn assert_segmented(signal: &TestSignal, notes: &[Note]) {
    assert_eq!(notes.len(), signal.notes.len(), "{:?}", notes);
    for (note, target) in notes.iter().zip(&signal.notes) {
        assert!(note.duration() >= 0.1, "{:?}", note);
        assert!(
            (note.start_time - target.start_time).abs() < 0.1,
            "note at {} for a target at {}",
            note.start_time,
            target.start_time
        );
    }
    for pair in notes.windows(2) {
        assert!(pair[0].start_sample < pair[1].start_sample);
        assert!(pair[0].end_sample <= pair[1].start_sample, "{:?}", pair);
    }
}

#[test]
fn major_scale_is_eight_notes() {
    let signal = scale(ScaleKind::Major, 0.8);
    let detector = OnsetDetector::default();
    let notes = detector.detect_notes(&signal.buffer);
    assert_segmented(&signal, &notes);
    assert!(detector.validate(&notes, 8).is_correct);
}

#[test]
fn minor_scale_is_eight_notes() {
    let signal = scale(ScaleKind::Minor, 0.8);
    assert_segmented(&signal, &OnsetDetector::default().detect_notes(&signal.buffer));
}

#[test]
fn pentatonic_scale_is_six_notes() {
    let signal = scale(ScaleKind::Pentatonic, 0.8);
    assert_segmented(&signal, &OnsetDetector::default().detect_notes(&signal.buffer));
}

#[test]
fn chromatic_scale_is_thirteen_notes() {
    let signal = scale(ScaleKind::Chromatic, 0.8);
    assert_segmented(&signal, &OnsetDetector::default().detect_notes(&signal.buffer));
}

#[test]
fn blues_scale_is_seven_notes() {
    let signal = scale(ScaleKind::Blues, 0.8);
    assert_eq!(signal.notes.len(), 7);
    let notes = OnsetDetector::default().detect_notes(&signal.buffer);
    assert_segmented(&signal, &notes);
    assert!(OnsetDetector::default().validate(&notes, 7).is_correct);
}

#[test]
fn quiet_scale_is_still_eight_notes() {
    let signal = scale(ScaleKind::Major, 0.05);
    assert_segmented(&signal, &OnsetDetector::default().detect_notes(&signal.buffer));
}

#[test]
fn note_audio_matches_note_bounds() {
    let signal = scale(ScaleKind::Major, 0.8);
    let detector = OnsetDetector::default();
    let notes = detector.detect_notes(&signal.buffer);
    let total: usize = notes
        .iter()
        .map(|note| {
            let audio = detector.extract_note_audio(&signal.buffer, note);
            assert_eq!(audio.len(), note.end_sample - note.start_sample);
            audio.len()
        })
        .sum();
    assert!(total <= signal.buffer.len());
    assert_eq!(notes.last().unwrap().end_sample, signal.buffer.len());
}

fn wav_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("vocal-pitch-{}-{}.wav", name, std::process::id()))
}

#[test]
fn recorded_scale_survives_a_wav_round_trip() {
    let signal = scale(ScaleKind::Major, 0.8);
    let path = wav_path("major");
    let spec = WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE as u32,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(&path, spec).unwrap();
    for &sample in &signal.buffer {
        writer.write_sample((sample * 32767.0).round() as i16).unwrap();
    }
    writer.finalize().unwrap();

    let mut reader = WavReader::open(&path).unwrap();
    assert_eq!(reader.spec().sample_rate as usize, SAMPLE_RATE);
    let recording: Vec<f64> = reader
        .samples::<i16>()
        .map(|s| s.unwrap() as f64 / 32768.0)
        .collect();
    std::fs::remove_file(&path).ok();

    assert_eq!(recording.len(), signal.buffer.len());
    let notes = OnsetDetector::default().detect_notes(&recording);
    assert_segmented(&signal, &notes);
}
