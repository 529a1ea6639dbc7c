use crate::float::Float;

pub enum PeakCorrection {
    Quadratic,
    None,
}

struct Point<T: Float> {
    x: T,
    y: T,
}

/// Yields `(start, stop)` index pairs of every positive lobe: a negative-to-positive
/// zero crossing followed by a positive-to-negative one. A lobe still open at the
/// end of `arr` is not reported.
fn detect_crossings<T: Float>(arr: &[T]) -> impl Iterator<Item = (usize, usize)> + '_ {
    arr.windows(2)
        .enumerate()
        .scan(
            None,
            |positive_zero_cross: &mut Option<usize>, (i, win)| match positive_zero_cross.take() {
                Some(idx) => {
                    if win[1] < T::zero() && win[0] > T::zero() {
                        Some(Some((idx, i + 1)))
                    } else {
                        *positive_zero_cross = Some(idx);
                        Some(None)
                    }
                }
                None => {
                    if win[1] > T::zero() && win[0] <= T::zero() {
                        *positive_zero_cross = Some(i + 1);
                    }
                    Some(None)
                }
            },
        )
        .flatten()
}

/// Highest sample of each positive lobe of `arr`, as `(index, value)`.
pub fn detect_peaks<T: Float>(arr: &[T]) -> impl Iterator<Item = (usize, T)> + '_ {
    detect_crossings(arr).map(move |(start, stop)| {
        let mut peak_idx = start;
        let mut peak_val = -T::infinity();
        for (i, &value) in arr.iter().enumerate().take(stop).skip(start) {
            if value > peak_val {
                peak_val = value;
                peak_idx = i;
            }
        }
        (peak_idx, peak_val)
    })
}

/// First peak strictly above `threshold`.
pub fn choose_peak<I: Iterator<Item = (usize, T)>, T: Float>(
    mut peaks: I,
    threshold: T,
) -> Option<(usize, T)> {
    peaks.find(|p| p.1 > threshold)
}

/// The McLeod "key maximum": the first peak whose height reaches `cutoff` times the
/// highest peak. Picking the first strong peak rather than the highest one is what keeps
/// the estimator from locking onto a multiple of the period.
pub fn choose_key_maximum<I: Iterator<Item = (usize, T)>, T: Float>(
    peaks: I,
    cutoff: T,
) -> Option<(usize, T)> {
    let peaks: Vec<(usize, T)> = peaks.collect();
    let highest = peaks
        .iter()
        .map(|p| p.1)
        .fold(-T::infinity(), |acc, v| if v > acc { v } else { acc });
    if highest <= T::zero() {
        return None;
    }
    let threshold = cutoff * highest;
    peaks.into_iter().find(|p| p.1 >= threshold)
}

pub fn correct_peak<T: Float>(peak: (usize, T), data: &[T], correction: PeakCorrection) -> (T, T) {
    let idx = peak.0;
    match correction {
        PeakCorrection::Quadratic if idx > 0 && idx + 1 < data.len() => {
            let point = quadratic_interpolation(
                Point {
                    x: T::from_usize(idx - 1).unwrap_or_else(T::zero),
                    y: data[idx - 1],
                },
                Point {
                    x: T::from_usize(idx).unwrap_or_else(T::zero),
                    y: data[idx],
                },
                Point {
                    x: T::from_usize(idx + 1).unwrap_or_else(T::zero),
                    y: data[idx + 1],
                },
            );
            (point.x, point.y)
        }
        _ => (T::from_usize(idx).unwrap_or_else(T::zero), peak.1),
    }
}

fn quadratic_interpolation<T: Float>(
    left: Point<T>,
    center: Point<T>,
    right: Point<T>,
) -> Point<T> {
    let denominator = T::from_f64_lossy(2.0) * center.y - left.y - right.y;
    if denominator == T::zero() {
        return center;
    }
    let shift = T::from_f64_lossy(0.5) * (right.y - left.y) / denominator;
    let x = center.x + shift;
    let y = center.y + T::from_f64_lossy(0.25) * (right.y - left.y) * shift;
    Point { x, y }
}
