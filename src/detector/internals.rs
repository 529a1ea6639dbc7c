use std::sync::Arc;

use object_pool::{Pool, Reusable};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::float::Float;
use crate::utils::buffer::{copy_complex_to_real, copy_real_to_complex, new_complex_buffer, square_sum};
use crate::utils::buffer::{modulus_squared, BufferPool};
use crate::utils::peak::{choose_key_maximum, correct_peak, detect_peaks, PeakCorrection};

/// A single estimate: `frequency` in Hz and a periodicity strength in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pitch<T>
where
    T: Float,
{
    pub frequency: T,
    pub clarity: T,
}

/// Data structure to hold the buffers and FFT plans needed for pitch computation.
/// Everything is sized once, when the estimator is created, so that repeated calls
/// at audio rate neither re-plan transforms nor allocate.
pub struct DetectorInternals<T>
where
    T: Float,
{
    pub size: usize,
    pub padding: usize,
    pub buffers: BufferPool<T>,
    fft: Arc<dyn Fft<T>>,
    inv_fft: Arc<dyn Fft<T>>,
    scratch: Pool<Vec<Complex<T>>>,
    scratch_len: usize,
}

impl<T> DetectorInternals<T>
where
    T: Float,
{
    pub fn new(size: usize, padding: usize) -> Self {
        let buffers = BufferPool::new(size + padding);
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size + padding);
        let inv_fft = planner.plan_fft_inverse(size + padding);
        let scratch_len = fft
            .get_inplace_scratch_len()
            .max(inv_fft.get_inplace_scratch_len());

        DetectorInternals {
            size,
            padding,
            buffers,
            fft,
            inv_fft,
            scratch: Pool::new(0, move || new_complex_buffer(scratch_len)),
            scratch_len,
        }
    }

    fn scratch(&self) -> Reusable<'_, Vec<Complex<T>>> {
        let len = self.scratch_len;
        self.scratch.pull(move || new_complex_buffer(len))
    }

    /// Compute the (linear, when `padding >= size`) autocorrelation of `signal`
    /// into `result`, normalized so that `result[0]` is the signal energy.
    pub fn autocorrelation(&self, signal: &[T], result: &mut [T]) {
        let mut signal_ref = self.buffers.get_complex_buffer();
        let signal_complex = &mut signal_ref[..];
        let mut scratch = self.scratch();

        copy_real_to_complex(signal, signal_complex);
        self.fft.process_with_scratch(signal_complex, &mut scratch);
        modulus_squared(signal_complex);
        self.inv_fft.process_with_scratch(signal_complex, &mut scratch);
        // rustfft leaves both transforms unnormalized.
        let normalization = T::one() / T::from_f64_lossy((self.size + self.padding) as f64);
        signal_complex.iter_mut().for_each(|c| c.re = c.re * normalization);
        copy_complex_to_real(signal_complex, result);
    }

    /// The McLeod *normalized square difference function* of `signal`,
    ///
    /// > n(t) = 2 r(t) / m(t),  m(t) = sum_{i=0}^{N-1-t} (x_i^2 + x_{i+t}^2)
    ///
    /// evaluated for `0 <= t < signal.len()`. `result[0]` is one for any non-silent signal.
    pub fn normalized_square_difference(&self, signal: &[T], result: &mut [T]) {
        let two = T::from_f64_lossy(2.0);
        let mut scratch_ref = self.buffers.get_real_buffer();
        let scratch = &mut scratch_ref[..signal.len()];

        self.autocorrelation(signal, result);
        m_of_tau(signal, scratch);
        result
            .iter_mut()
            .zip(scratch.iter())
            .for_each(|(r, &m)| *r = if m > T::zero() { two * *r / m } else { T::zero() });
        result[signal.len()..]
            .iter_mut()
            .for_each(|r| *r = T::zero());
    }

    /// Compute the windowed autocorrelation of `signal` and put the result in `result`.
    /// For a signal _x=(x_0,x_1,...)_, the windowed autocorrelation with window size _w_ is
    /// the function
    ///
    /// > r(t) = sum_{i=0}^{w-1} x_i*x_{i+t}
    ///
    /// `window_size` must be at most half of the length of `signal`, and the FFT
    /// length (`size + padding`) must equal `signal.len()`.
    pub fn windowed_autocorrelation(&self, signal: &[T], window_size: usize, result: &mut [T]) {
        assert!(
            self.buffers.buffer_size == signal.len(),
            "Windowed autocorrelation runs on unpadded buffers."
        );

        let (mut scratch_ref1, mut scratch_ref2) = (
            self.buffers.get_complex_buffer(),
            self.buffers.get_complex_buffer(),
        );
        let signal_complex = &mut scratch_ref1[..];
        let truncated_signal_complex = &mut scratch_ref2[..];
        let mut scratch = self.scratch();

        // The windowed autocorrelation is the cross correlation between the original
        // signal and the signal truncated to lie in `0..window_size`.
        copy_real_to_complex(signal, signal_complex);
        copy_real_to_complex(&signal[..window_size], truncated_signal_complex);
        self.fft.process_with_scratch(signal_complex, &mut scratch);
        self.fft
            .process_with_scratch(truncated_signal_complex, &mut scratch);
        let normalization_const = T::one() / T::from_f64_lossy(signal.len() as f64);
        signal_complex
            .iter_mut()
            .zip(truncated_signal_complex.iter())
            .for_each(|(a, b)| {
                *a = *a * normalization_const * b.conj();
            });
        self.inv_fft.process_with_scratch(signal_complex, &mut scratch);

        // The result is valid only for `0..window_size`
        copy_complex_to_real(&signal_complex[..window_size], result);
    }

    /// Compute the windowed square error, _d(t)_, of `signal`. For a window size of _w_ and a signal
    /// _x=(x_0,x_1,...)_, this is defined by
    ///
    ///  > d(t) = sum_{i=0}^{w-1} (x_i - x_{i+t})^2
    ///
    /// computed as `pow_0^w + pow_t^{t+w} - 2 r(t)` on top of the windowed autocorrelation.
    pub fn windowed_square_error(&self, signal: &[T], window_size: usize, result: &mut [T]) {
        assert!(
            2 * window_size <= signal.len(),
            "The window size cannot be more than half the signal length"
        );

        let two = T::from_f64_lossy(2.0);

        self.windowed_autocorrelation(signal, window_size, result);
        let mut windowed_power = square_sum(&signal[..window_size]);
        let power = windowed_power;

        result
            .iter_mut()
            .take(window_size)
            .enumerate()
            .for_each(|(i, a)| {
                *a = power + windowed_power - two * *a;
                // Slide pow_t^{t+w} to pow_{t+1}^{t+1+w} by its boundary terms.
                windowed_power = windowed_power - signal[i] * signal[i]
                    + signal[i + window_size] * signal[i + window_size];
            })
    }
}

/// `m(t) = sum_{i=0}^{N-1-t} (x_i^2 + x_{i+t}^2)`, built incrementally from `m(0) = 2 sum x_i^2`
/// by dropping the two samples that leave the overlap at each lag.
fn m_of_tau<T: Float>(signal: &[T], result: &mut [T]) {
    assert!(result.len() >= signal.len());
    let n = signal.len();
    if n == 0 {
        return;
    }

    let mut m = T::from_f64_lossy(2.0) * square_sum(signal);
    result[0] = m;
    for tau in 1..n {
        let head = signal[tau - 1];
        let tail = signal[n - tau];
        m = m - head * head - tail * tail;
        result[tau] = m;
    }
}

/// Turn the peaks of `input` into a [Pitch] using McLeod's key-maximum rule.
/// `input` is expected to be normalized so that `input[0] == 1`.
pub fn pitch_from_key_maximum<T>(
    input: &[T],
    sample_rate: usize,
    cutoff: T,
    correction: PeakCorrection,
) -> Option<Pitch<T>>
where
    T: Float,
{
    let sample_rate = T::from_f64_lossy(sample_rate as f64);
    choose_key_maximum(detect_peaks(input), cutoff)
        .map(|peak| correct_peak(peak, input, correction))
        .filter(|peak| peak.0 > T::zero())
        .map(|peak| Pitch {
            frequency: sample_rate / peak.0,
            clarity: clamp_unit(peak.1),
        })
}

/// Calculate the "cumulative mean normalized difference function" as
/// specified in the YIN paper. If _d(t)_ is the square error function,
/// compute _d'(0) = 1_ and for _t > 0_
///
///  > d'(t) = d(t) / [ (1/t) * sum_{i=1}^t d(i) ]
pub fn yin_normalize_square_error<T: Float>(square_error: &mut [T]) {
    let mut sum = T::zero();
    square_error[0] = T::one();
    square_error
        .iter_mut()
        .enumerate()
        .skip(1)
        .for_each(|(i, a)| {
            sum = sum + *a;
            *a = if sum > T::zero() {
                *a * T::from_f64_lossy(i as f64) / sum
            } else {
                T::one()
            };
        });
}

fn clamp_unit<T: Float>(value: T) -> T {
    if value < T::zero() {
        T::zero()
    } else if value > T::one() {
        T::one()
    } else {
        value
    }
}
