//! Framing a buffer for frame-by-frame detection, with each frame's expected pitch
//! looked up in the ground truth.

use crate::signal::GroundTruthPoint;

/// A frame is unvoiced unless a ground-truth point lies within this many seconds of its centre.
pub const MAX_ALIGNMENT_DISTANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramedSample<'a> {
    pub frame: &'a [f64],
    /// Time of the frame centre, in seconds.
    pub time: f64,
    pub expected_frequency: Option<f64>,
}

/// A finite, restartable view of `buffer` cut into overlapping frames. Nothing is copied:
/// frames borrow from the buffer and `iter()` can be called any number of times.
#[derive(Debug, Clone, Copy)]
pub struct FrameSequence<'a> {
    buffer: &'a [f64],
    ground_truth: &'a [GroundTruthPoint],
    frame_size: usize,
    hop_size: usize,
    sample_rate: usize,
}

pub fn generate_frames<'a>(
    buffer: &'a [f64],
    ground_truth: &'a [GroundTruthPoint],
    frame_size: usize,
    hop_size: usize,
    sample_rate: usize,
) -> FrameSequence<'a> {
    FrameSequence {
        buffer,
        ground_truth,
        frame_size,
        hop_size: hop_size.max(1),
        sample_rate,
    }
}

impl<'a> FrameSequence<'a> {
    /// Number of whole frames; a trailing partial frame is dropped.
    pub fn len(&self) -> usize {
        if self.frame_size == 0 || self.buffer.len() < self.frame_size {
            0
        } else {
            (self.buffer.len() - self.frame_size) / self.hop_size + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn frame_time(&self, index: usize) -> f64 {
        (index * self.hop_size) as f64 / self.sample_rate as f64
            + self.frame_size as f64 / (2.0 * self.sample_rate as f64)
    }

    pub fn get(&self, index: usize) -> Option<FramedSample<'a>> {
        if index >= self.len() {
            return None;
        }
        let start = index * self.hop_size;
        let time = self.frame_time(index);
        Some(FramedSample {
            frame: &self.buffer[start..start + self.frame_size],
            time,
            expected_frequency: nearest_frequency(self.ground_truth, time),
        })
    }

    pub fn iter(&self) -> Frames<'a> {
        Frames {
            sequence: *self,
            next: 0,
        }
    }
}

impl<'a> IntoIterator for &FrameSequence<'a> {
    type Item = FramedSample<'a>;
    type IntoIter = Frames<'a>;

    fn into_iter(self) -> Frames<'a> {
        self.iter()
    }
}

#[derive(Debug, Clone)]
pub struct Frames<'a> {
    sequence: FrameSequence<'a>,
    next: usize,
}

impl<'a> Iterator for Frames<'a> {
    type Item = FramedSample<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let sample = self.sequence.get(self.next)?;
        self.next += 1;
        Some(sample)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.sequence.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl<'a> ExactSizeIterator for Frames<'a> {}

/// Frequency of the ground-truth point nearest to `time`, if one lies within
/// [MAX_ALIGNMENT_DISTANCE]. `ground_truth` must be sorted by time.
pub fn nearest_frequency(ground_truth: &[GroundTruthPoint], time: f64) -> Option<f64> {
    let after = ground_truth.partition_point(|p| p.time < time);
    let candidates = [after.checked_sub(1), Some(after)];
    candidates
        .iter()
        .flatten()
        .filter_map(|&i| ground_truth.get(i))
        .map(|p| ((p.time - time).abs(), p.frequency))
        .filter(|&(distance, _)| distance <= MAX_ALIGNMENT_DISTANCE)
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, frequency)| frequency)
}
