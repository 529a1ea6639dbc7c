use vocal_pitch::detector::hybrid::{HybridConfig, HybridPitchDetector};
use vocal_pitch::detector::mcleod::McLeodDetector;
use vocal_pitch::detector::yin::YINDetector;
use vocal_pitch::detector::{Algorithm, PitchDetector, PitchEstimator};
use vocal_pitch::float::Float;
use vocal_pitch::signal::frames::nearest_frequency;
use vocal_pitch::signal::{SweepCurve, TestSignalGenerator, VOICE_HARMONICS};
use vocal_pitch::utils::buffer::new_real_buffer;
use vocal_pitch::utils::stats::cents_between;

#[test]
fn mcleod_sin_signal() {
    pure_frequency("McLeod", "sin", 440.0);
}

#[test]
fn yin_sin_signal() {
    pure_frequency("YIN", "sin", 440.0);
}

#[test]
fn mcleod_square_signal() {
    pure_frequency("McLeod", "square", 440.0);
}

#[test]
fn yin_square_signal() {
    pure_frequency("YIN", "square", 440.0);
}

#[test]
fn mcleod_triangle_signal() {
    pure_frequency("McLeod", "triangle", 440.0);
}

#[test]
fn yin_triangle_signal() {
    pure_frequency("YIN", "triangle", 440.0);
}

#[test]
fn mcleod_low_voice() {
    pure_frequency("McLeod", "sin", 130.81);
}

#[test]
fn hybrid_sin_signal() {
    hybrid_frequency("sin", 440.0);
}

#[test]
fn hybrid_square_signal() {
    hybrid_frequency("square", 261.63);
}

#[test]
fn hybrid_triangle_signal() {
    hybrid_frequency("triangle", 659.25);
}

#[test]
fn hybrid_voice_signal() {
    const SAMPLE_RATE: usize = 44100;
    let voice = TestSignalGenerator::new(SAMPLE_RATE).voice(196.0, 1.0, 0.8, &VOICE_HARMONICS);
    let mut detector = HybridPitchDetector::new(HybridConfig::default());
    detector.initialize().unwrap();

    for (i, frame) in voice.buffer.windows(2048).step_by(512).enumerate() {
        let detection = detector.detect(frame).unwrap();
        if i < 3 {
            continue;
        }
        let frequency = detection.frequency.unwrap();
        assert!(
            cents_between(frequency, 196.0).abs() < 50.0,
            "frame {}: {} Hz",
            i,
            frequency
        );
    }
}

#[test]
fn hybrid_corrects_an_octave_glitch() {
    const SAMPLE_RATE: usize = 44100;
    const WINDOW: usize = 2048;
    let mut detector = HybridPitchDetector::new(HybridConfig::default());
    detector.initialize().unwrap();

    let low = sin_wave::<f64>(220.0, WINDOW, SAMPLE_RATE);
    for _ in 0..5 {
        detector.detect(&low).unwrap();
    }
    let high = sin_wave::<f64>(440.0, WINDOW, SAMPLE_RATE);
    let detection = detector.detect(&high).unwrap();

    let raw = detection.raw_frequency.unwrap();
    assert!(cents_between(raw, 220.0).abs() < 10.0, "raw {}", raw);
    assert!(cents_between(detection.frequency.unwrap(), 220.0).abs() < 10.0);
    assert_eq!(detection.algorithm, Some(Algorithm::Mpm));
}

#[test]
fn hybrid_follows_a_glissando() {
    const SAMPLE_RATE: usize = 44100;
    const WINDOW: usize = 2048;
    const HOP: usize = 512;
    let sweep =
        TestSignalGenerator::new(SAMPLE_RATE).sweep(220.0, 440.0, 2.0, SweepCurve::Logarithmic, 0.8);
    let mut detector = HybridPitchDetector::new(HybridConfig::default());
    detector.initialize().unwrap();

    let mut frames = 0;
    let mut in_tune = 0;
    for (i, frame) in sweep.buffer.windows(WINDOW).step_by(HOP).enumerate() {
        let detection = detector.detect(frame).unwrap();
        let centre = (i * HOP + WINDOW / 2) as f64 / SAMPLE_RATE as f64;
        let expected = nearest_frequency(&sweep.ground_truth, centre).unwrap();
        frames += 1;
        if let Some(frequency) = detection.frequency {
            if cents_between(frequency, expected).abs() < 50.0 {
                in_tune += 1;
            }
        }
    }
    assert!(in_tune as f64 / frames as f64 > 0.9, "{}/{}", in_tune, frames);
}

#[test]
fn hybrid_f32_frames() {
    let config = HybridConfig {
        sample_rate: 48000,
        ..HybridConfig::default()
    };
    let signal = sin_wave::<f32>(330.0, 48000, 48000);
    let mut detector = HybridPitchDetector::<f32>::new(config);
    detector.initialize().unwrap();
    let mut last = None;
    for frame in signal.windows(2048).step_by(1024) {
        last = detector.detect(frame).unwrap().frequency;
    }
    assert!(cents_between(last.unwrap(), 330.0).abs() < 10.0);
}

fn sin_wave<T: Float>(freq: f64, size: usize, sample_rate: usize) -> Vec<T> {
    let mut signal = new_real_buffer(size);
    let two_pi = 2.0 * std::f64::consts::PI;
    let dx = two_pi * freq / sample_rate as f64;
    for (i, sample) in signal.iter_mut().enumerate() {
        *sample = T::from_f64_lossy((i as f64 * dx).sin());
    }
    signal
}

fn square_wave<T: Float>(freq: f64, size: usize, sample_rate: usize) -> Vec<T> {
    let mut signal = new_real_buffer(size);
    let period = sample_rate as f64 / freq;

    for (i, sample) in signal.iter_mut().enumerate() {
        let x = i as f64 / period;
        let frac = x - x.floor();
        let y = match frac >= 0.5 {
            true => -1.0,
            false => 1.0,
        };
        *sample = T::from_f64_lossy(y);
    }
    signal
}

fn triangle_wave<T: Float>(freq: f64, size: usize, sample_rate: usize) -> Vec<T> {
    let mut signal = new_real_buffer(size);
    let period = sample_rate as f64 / freq;

    for (i, sample) in signal.iter_mut().enumerate() {
        let x = i as f64 / period;
        let frac = x - x.floor();
        let y = match frac {
            f if f < 0.25 => 4. * f,
            f if f < 0.75 => 1. - 4. * (f - 0.25),
            f => -1. + 4. * (f - 0.75),
        };
        *sample = T::from_f64_lossy(y);
    }
    signal
}

fn estimator_factory(name: &str, window: usize) -> Box<dyn PitchEstimator<f64>> {
    match name {
        "McLeod" => Box::new(McLeodDetector::<f64>::new(window, window)),
        "YIN" => Box::new(YINDetector::<f64>::new(window)),
        _ => panic!("Unknown estimator {}", name),
    }
}

fn signal_factory<T: Float>(name: &str, freq: f64, size: usize, sample_rate: usize) -> Vec<T> {
    match name {
        "sin" => sin_wave(freq, size, sample_rate),
        "square" => square_wave(freq, size, sample_rate),
        "triangle" => triangle_wave(freq, size, sample_rate),
        _ => panic!("Unknown wave function {}", name),
    }
}

fn pure_frequency(estimator_name: &str, wave_name: &str, freq_in: f64) {
    const SAMPLE_RATE: usize = 48000;
    const DURATION: f64 = 1.0;
    const SAMPLE_SIZE: usize = (SAMPLE_RATE as f64 * DURATION) as usize;
    const WINDOW: usize = 1024;
    const DELTA_T: usize = WINDOW / 4;
    const POWER_THRESHOLD: f64 = 5.0;
    const CLARITY_THRESHOLD: f64 = 0.6;

    let signal = signal_factory::<f64>(wave_name, freq_in, SAMPLE_SIZE, SAMPLE_RATE);
    let mut estimator = estimator_factory(estimator_name, WINDOW);

    for chunk in signal.windows(WINDOW).step_by(DELTA_T) {
        let pitch = estimator.get_pitch(chunk, SAMPLE_RATE, POWER_THRESHOLD, CLARITY_THRESHOLD);

        match pitch {
            Some(pitch) => {
                let frequency = pitch.frequency;
                let idx = SAMPLE_RATE as f64 / frequency;
                let epsilon = (SAMPLE_RATE as f64 / (idx - 1.0)) - frequency;
                assert!(
                    (frequency - freq_in).abs() < 2. * epsilon,
                    "{} on {}: {} Hz, clarity {}",
                    estimator_name,
                    wave_name,
                    frequency,
                    pitch.clarity
                );
            }
            None => panic!("{} found no pitch in a {} wave", estimator_name, wave_name),
        }
    }
}

/// Drive a hybrid detector over a whole waveform; after warm-up every frame must be in tune.
fn hybrid_frequency(wave_name: &str, freq_in: f64) {
    const SAMPLE_RATE: usize = 44100;
    const WINDOW: usize = 2048;
    const HOP: usize = 512;
    const WARM_UP: usize = 3;

    let signal: Vec<f64> = signal_factory::<f64>(wave_name, freq_in, SAMPLE_RATE, SAMPLE_RATE)
        .iter()
        .map(|s| 0.8 * s)
        .collect();
    let mut detector = HybridPitchDetector::new(HybridConfig::default());
    detector.initialize().unwrap();

    for (i, frame) in signal.windows(WINDOW).step_by(HOP).enumerate() {
        let detection = detector.detect(frame).unwrap();
        assert!(detection.confidence >= 0.0 && detection.confidence <= 1.0);
        if i < WARM_UP {
            continue;
        }
        let frequency = detection
            .frequency
            .unwrap_or_else(|| panic!("frame {} of the {} wave is unvoiced", i, wave_name));
        assert!(
            cents_between(frequency, freq_in).abs() < 50.0,
            "frame {}: {} Hz for {} Hz",
            i,
            frequency,
            freq_in
        );
    }
}
