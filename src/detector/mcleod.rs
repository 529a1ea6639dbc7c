//! The McLeod Pitch Method (MPM), from *A Smarter Way to Find Pitch* (McLeod & Wyvill, 2005).
//!
//! The signal is compared with itself through the *normalized square difference function*
//! (NSDF), which equals one at lag zero and approaches one again at every multiple of the
//! period. Among the positive lobes of the NSDF, the first whose maximum reaches a fixed
//! fraction of the highest maximum (the *key maximum*) is taken as the period; its height
//! is reported as the `clarity` of the estimate.
//!
//! The NSDF is computed with a zero-padded FFT, so lags up to the frame length are exact.
//! Only lags below half the frame are searched: a frame must cover at least two periods of
//! the lowest frequency of interest.

use crate::detector::internals::pitch_from_key_maximum;
use crate::detector::internals::DetectorInternals;
use crate::detector::internals::Pitch;
use crate::detector::PitchEstimator;
use crate::float::Float;
use crate::utils::buffer::square_sum;
use crate::utils::peak::PeakCorrection;

/// Fraction of the highest NSDF peak a peak must reach to be the key maximum.
pub const DEFAULT_KEY_MAXIMUM_CUTOFF: f64 = 0.9;

pub struct McLeodDetector<T>
where
    T: Float,
{
    internals: DetectorInternals<T>,
    cutoff: T,
}

impl<T> McLeodDetector<T>
where
    T: Float,
{
    pub fn new(size: usize, padding: usize) -> Self {
        Self::with_cutoff(size, padding, DEFAULT_KEY_MAXIMUM_CUTOFF)
    }

    pub fn with_cutoff(size: usize, padding: usize, cutoff: f64) -> Self {
        let internals = DetectorInternals::new(size, padding);
        McLeodDetector {
            internals,
            cutoff: T::from_f64_lossy(cutoff),
        }
    }

    pub fn size(&self) -> usize {
        self.internals.size
    }
}

impl<T> PitchEstimator<T> for McLeodDetector<T>
where
    T: Float,
{
    fn get_pitch(
        &mut self,
        signal: &[T],
        sample_rate: usize,
        power_threshold: T,
        clarity_threshold: T,
    ) -> Option<Pitch<T>> {
        assert_eq!(signal.len(), self.internals.size);

        if square_sum(signal) <= power_threshold {
            return None;
        }

        let mut result_ref = self.internals.buffers.get_real_buffer();
        let result = &mut result_ref[..];
        self.internals.normalized_square_difference(signal, result);

        let search = signal.len() / 2;
        pitch_from_key_maximum(
            &result[..search],
            sample_rate,
            self.cutoff,
            PeakCorrection::Quadratic,
        )
        .filter(|pitch| pitch.clarity >= clarity_threshold)
    }
}
