use std::f64::consts::PI;

use rand::Rng;

use crate::utils::buffer::mean_power;

/// One standard normal draw via the Box-Muller transform.
fn gaussian<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // `gen` is in [0, 1); shifting away from zero keeps the logarithm finite.
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Add white Gaussian noise so that the result has the given signal-to-noise ratio.
pub fn add_noise(buffer: &[f64], snr_db: f64) -> Vec<f64> {
    add_noise_with_rng(buffer, snr_db, &mut rand::thread_rng())
}

/// [add_noise] with a caller-supplied generator, for reproducible fixtures.
pub fn add_noise_with_rng<R: Rng + ?Sized>(buffer: &[f64], snr_db: f64, rng: &mut R) -> Vec<f64> {
    let signal_power = mean_power(buffer);
    let noise_power = signal_power / 10f64.powf(snr_db / 10.0);
    let noise_amplitude = noise_power.sqrt();
    buffer
        .iter()
        .map(|sample| sample + noise_amplitude * gaussian(rng))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::TestSignalGenerator;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn measured_snr(clean: &[f64], noisy: &[f64]) -> f64 {
        let noise: Vec<f64> = noisy.iter().zip(clean).map(|(n, c)| n - c).collect();
        10.0 * (mean_power(clean) / mean_power(&noise)).log10()
    }

    #[test]
    fn snr_is_close_to_requested() {
        let clean = TestSignalGenerator::new(44100).pure_tone(440.0, 1.0, 0.8).buffer;
        for _ in 0..5 {
            let noisy = add_noise(&clean, 20.0);
            let snr = measured_snr(&clean, &noisy);
            assert!((snr - 20.0).abs() < 0.3, "measured {} dB", snr);
        }
    }

    #[test]
    fn seeded_noise_is_reproducible() {
        let clean = vec![0.5; 1000];
        let a = add_noise_with_rng(&clean, 10.0, &mut StdRng::seed_from_u64(7));
        let b = add_noise_with_rng(&clean, 10.0, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert!((measured_snr(&clean, &a) - 10.0).abs() < 1.0);
    }

    #[test]
    fn silent_buffer_stays_silent() {
        let noisy = add_noise(&[0.0; 64], 10.0);
        assert!(noisy.iter().all(|&s| s == 0.0));
    }
}
