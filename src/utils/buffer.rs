use object_pool::{Pool, Reusable};
use rustfft::num_complex::Complex;
use rustfft::num_traits::Zero;

use crate::float::Float;

pub fn new_real_buffer<T: Float>(size: usize) -> Vec<T> {
    vec![T::zero(); size]
}

pub fn new_complex_buffer<T: Float>(size: usize) -> Vec<Complex<T>> {
    vec![Complex::zero(); size]
}

/// Load `input` into the real part of `output`, zero-padding whatever is left.
pub fn copy_real_to_complex<T: Float>(input: &[T], output: &mut [Complex<T>]) {
    assert!(input.len() <= output.len());
    input.iter().zip(output.iter_mut()).for_each(|(i, o)| {
        o.re = *i;
        o.im = T::zero();
    });
    output[input.len()..]
        .iter_mut()
        .for_each(|o| *o = Complex::zero())
}

/// Copy the real part of `input` into `output`. `output` may be shorter than `input`.
pub fn copy_complex_to_real<T: Float>(input: &[Complex<T>], output: &mut [T]) {
    input
        .iter()
        .map(|c| c.re)
        .zip(output.iter_mut())
        .for_each(|(i, o)| *o = i);
    if output.len() > input.len() {
        output[input.len()..]
            .iter_mut()
            .for_each(|o| *o = T::zero());
    }
}

/// Computes |x|^2 for each complex value x in `arr`. This function
/// modifies `arr` in place and leaves the complex component zero.
pub fn modulus_squared<T: Float>(arr: &mut [Complex<T>]) {
    for s in arr {
        s.re = s.re * s.re + s.im * s.im;
        s.im = T::zero();
    }
}

/// Compute the sum of the square of each element of `arr`.
pub fn square_sum<T: Float>(arr: &[T]) -> T {
    arr.iter().map(|&s| s * s).sum::<T>()
}

/// Root mean square of `arr`, computed in `f64`. Empty input has zero energy.
pub fn rms<T: Float>(arr: &[T]) -> f64 {
    if arr.is_empty() {
        return 0.0;
    }
    (square_sum(arr).into_f64() / arr.len() as f64).sqrt()
}

/// Mean of `x^2` over `arr`; the signal power used for SNR computations.
pub fn mean_power(arr: &[f64]) -> f64 {
    if arr.is_empty() {
        return 0.0;
    }
    arr.iter().map(|s| s * s).sum::<f64>() / arr.len() as f64
}

/// A pool of real/complex buffer objects. Buffers are dynamically created as needed
/// and reused if previously `Drop`ed. Buffers are never freed. Instead buffers are kept
/// in reserve and reused when a new buffer is requested, so a detector called at audio
/// rate stops allocating once its first frame has been processed.
///
/// ```rust
/// use vocal_pitch::utils::buffer::BufferPool;
///
/// let buffers = BufferPool::new(3);
/// let mut buf1 = buffers.get_real_buffer();
/// buf1[0] = 5.5;
/// {
///     let mut buf2 = buffers.get_real_buffer();
///     buf2[1] = 6.6;
/// }
/// drop(buf1);
///
/// let buf1 = &buffers.get_real_buffer();
/// let buf2 = &buffers.get_real_buffer();
/// // Buffers are distributed in LIFO order, so compare them "backwards".
/// assert_eq!(&buf2[..], &[0.0, 6.6, 0.0]);
/// assert_eq!(&buf1[..], &[5.5, 0., 0.]);
/// ```
pub struct BufferPool<T> {
    real_buffers: Pool<Vec<T>>,
    complex_buffers: Pool<Vec<Complex<T>>>,
    pub buffer_size: usize,
}

impl<T: Float> BufferPool<T> {
    pub fn new(buffer_size: usize) -> Self {
        BufferPool {
            real_buffers: Pool::new(0, || new_real_buffer(buffer_size)),
            complex_buffers: Pool::new(0, || new_complex_buffer(buffer_size)),
            buffer_size,
        }
    }
    /// Get a reference to a buffer that can be used until it is `Drop`ed.
    pub fn get_real_buffer(&self) -> Reusable<'_, Vec<T>> {
        self.real_buffers.pull(|| new_real_buffer(self.buffer_size))
    }
    /// Get a reference to a buffer that can be used until it is `Drop`ed.
    pub fn get_complex_buffer(&self) -> Reusable<'_, Vec<Complex<T>>> {
        self.complex_buffers
            .pull(|| new_complex_buffer(self.buffer_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_are_reused() {
        let buffers = BufferPool::new(3);
        let mut buf1 = buffers.get_real_buffer();
        buf1[0] = 5.5;
        {
            let mut buf2 = buffers.get_real_buffer();
            buf2[1] = 6.6;
        }
        {
            // Same storage as `buf2`.
            let mut buf3 = buffers.get_real_buffer();
            buf3[2] = 7.7;
        }
        drop(buf1);

        let buf1 = &buffers.get_real_buffer();
        let buf2 = &buffers.get_real_buffer();
        assert_eq!(&buf2[..], &[0.0, 6.6, 7.7]);
        assert_eq!(&buf1[..], &[5.5, 0., 0.]);
    }

    #[test]
    fn rms_of_constant_and_empty() {
        assert_eq!(rms::<f64>(&[]), 0.0);
        assert!((rms(&[0.5f64, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-12);
        assert!((mean_power(&[1.0, -1.0]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn complex_copies_pad_with_zero() {
        let mut complex = new_complex_buffer::<f64>(4);
        copy_real_to_complex(&[1.0, 2.0], &mut complex);
        assert_eq!(complex[1].re, 2.0);
        assert_eq!(complex[3].re, 0.0);

        let mut real = vec![9.0; 2];
        copy_complex_to_real(&complex, &mut real);
        assert_eq!(real, vec![1.0, 2.0]);
    }
}
