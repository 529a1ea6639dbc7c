//! The YIN pitch detection algorithm is based on the algorithm from the paper
//! *[YIN, a fundamental frequency estimator for speech and music](http://recherche.ircam.fr/equipes/pcm/cheveign/ps/2002_JASA_YIN_proof.pdf)*.
//!
//! Let $S=(s_0,s_1,\ldots,s_N)$ be a discrete signal. The *mean square difference function* at time $t$
//! is defined by
//! $$ d(t) = \sum_{i=0}^{N-t} (s_i-s_{i+t})^2. $$
//! Its value depends on volume, so YIN works on the *cumulative mean normalized difference function*,
//! $$ d\'(t) = \begin{cases}1&\text{if }t=0\\\\ d(t) / \left[ \tfrac{1}{t}\sum_{i=1}^t d(i) \right] & \text{otherwise}\end{cases}, $$
//! and picks the first dip of $d\'(t)$ below an absolute threshold.
//!
//! In the hybrid detector YIN is the fallback for frames where the McLeod estimate is not
//! clear enough. It reports a clarity of `1 - d'(t)` at the chosen dip, but callers are free
//! to ignore it.

use crate::detector::internals::Pitch;
use crate::detector::internals::{yin_normalize_square_error, DetectorInternals};
use crate::detector::PitchEstimator;
use crate::float::Float;
use crate::utils::buffer::square_sum;
use crate::utils::peak::{choose_peak, correct_peak, detect_peaks, PeakCorrection};

pub struct YINDetector<T>
where
    T: Float,
{
    internals: DetectorInternals<T>,
}

impl<T> YINDetector<T>
where
    T: Float,
{
    pub fn new(size: usize) -> Self {
        let internals = DetectorInternals::<T>::new(size, 0);
        YINDetector { internals }
    }

    pub fn size(&self) -> usize {
        self.internals.size
    }
}

/// `clarity_threshold` maps to the YIN absolute threshold as `1 - clarity_threshold`:
/// a clarity threshold of `0.85` searches for the first dip below `0.15`.
impl<T> PitchEstimator<T> for YINDetector<T>
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
        let threshold = T::one() - clarity_threshold;
        let window_size = signal.len() / 2;

        assert_eq!(signal.len(), self.internals.size);

        if square_sum(signal) <= power_threshold {
            return None;
        }

        let mut result_ref = self.internals.buffers.get_real_buffer();
        let result = &mut result_ref[..window_size];

        // STEP 2: the difference function, d_t.
        self.internals
            .windowed_square_error(signal, window_size, result);

        // STEP 3: the cumulative mean normalized difference function, d_t'.
        yin_normalize_square_error(result);

        // STEP 4: the absolute threshold. Dips below `threshold` become positive lobes
        // once the function is inverted, so the peak helpers can be reused.
        result.iter_mut().for_each(|val| *val = threshold - *val);
        let result: &[T] = result;

        // STEP 5: the deepest point of the first dip, refined by quadratic interpolation.
        let sample_rate = T::from_f64_lossy(sample_rate as f64);
        choose_peak(detect_peaks(result), T::zero())
            .map(|peak| correct_peak(peak, result, PeakCorrection::Quadratic))
            .filter(|peak| peak.0 > T::zero())
            .map(|(period, depth)| Pitch {
                frequency: sample_rate / period,
                clarity: T::one() - threshold + depth,
            })
    }
}
