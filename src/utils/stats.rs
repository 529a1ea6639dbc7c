//! Small statistics over `f64` slices. Every function is total: empty input gives `None`.

/// `1200 * log2(detected / expected)`, or `f64::INFINITY` when either frequency is not
/// strictly positive.
pub fn cents_between(detected: f64, expected: f64) -> f64 {
    if detected <= 0.0 || expected <= 0.0 || !detected.is_finite() || !expected.is_finite() {
        return f64::INFINITY;
    }
    1200.0 * (detected / expected).log2()
}

pub fn semitones_between(detected: f64, expected: f64) -> f64 {
    cents_between(detected, expected) / 100.0
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Middle value; the average of the two central values for even lengths.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// `numerator / denominator`, or `None` when there is nothing to divide by.
pub fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cents_of_an_octave() {
        assert!((cents_between(880.0, 440.0) - 1200.0).abs() < 1e-9);
        assert!((cents_between(220.0, 440.0) + 1200.0).abs() < 1e-9);
        assert_eq!(cents_between(440.0, 440.0), 0.0);
    }

    #[test]
    fn cents_undefined_for_non_positive() {
        assert_eq!(cents_between(0.0, 440.0), f64::INFINITY);
        assert_eq!(cents_between(440.0, -1.0), f64::INFINITY);
    }

    #[test]
    fn median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn spread() {
        assert_eq!(std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), Some(2.0));
        assert_eq!(min_max(&[3.0, -1.0, 8.0]), Some((-1.0, 8.0)));
        assert_eq!(ratio(1, 0), None);
        assert_eq!(ratio(1, 4), Some(0.25));
    }
}
