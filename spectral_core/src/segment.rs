//! Fixed-length segmentation of a mono waveform.
//!
//! Segments are addressed by index: segment `i` is a pure function of the
//! buffer and `i`, so any subset can be pulled in any order, from any thread.

use std::borrow::Cow;

use crate::config::PartialSegmentPolicy;
use crate::error::{CodecError, Result};

/// Index-addressable view of the segments of one buffer.
#[derive(Debug, Clone, Copy)]
pub struct Segments<'a> {
    samples: &'a [f32],
    segment_size: usize,
    policy: PartialSegmentPolicy,
}

/// Split `samples` into `segment_size` windows, dropping a trailing partial window.
pub fn segment(samples: &[f32], segment_size: usize) -> Result<Segments<'_>> {
    segment_with_policy(samples, segment_size, PartialSegmentPolicy::Drop)
}

pub fn segment_with_policy(
    samples: &[f32],
    segment_size: usize,
    policy: PartialSegmentPolicy,
) -> Result<Segments<'_>> {
    if segment_size == 0 {
        return Err(CodecError::SegmentSize);
    }
    Ok(Segments {
        samples,
        segment_size,
        policy,
    })
}

impl<'a> Segments<'a> {
    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    /// Number of segments this buffer yields under the configured policy.
    pub fn len(&self) -> usize {
        let full = self.samples.len() / self.segment_size;
        let remainder = self.samples.len() % self.segment_size;
        match self.policy {
            PartialSegmentPolicy::Drop => full,
            PartialSegmentPolicy::ZeroPad => full + usize::from(remainder > 0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Segment at `index`, always exactly `segment_size` samples long.
    ///
    /// Full windows borrow from the source buffer; only a zero-padded tail
    /// allocates.
    pub fn get(&self, index: usize) -> Option<Cow<'a, [f32]>> {
        if index >= self.len() {
            return None;
        }
        let samples: &'a [f32] = self.samples;
        let start = index * self.segment_size;
        let end = start + self.segment_size;
        if end <= samples.len() {
            return Some(Cow::Borrowed(&samples[start..end]));
        }
        let mut padded = vec![0.0f32; self.segment_size];
        let tail = &samples[start..];
        padded[..tail.len()].copy_from_slice(tail);
        Some(Cow::Owned(padded))
    }

    pub fn iter(&self) -> SegmentIter<'a> {
        SegmentIter {
            segments: *self,
            next: 0,
        }
    }
}

impl<'a> IntoIterator for Segments<'a> {
    type Item = Cow<'a, [f32]>;
    type IntoIter = SegmentIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy iterator over [`Segments`]; each item is derived from its index alone.
#[derive(Debug, Clone)]
pub struct SegmentIter<'a> {
    segments: Segments<'a>,
    next: usize,
}

impl<'a> Iterator for SegmentIter<'a> {
    type Item = Cow<'a, [f32]>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.segments.get(self.next)?;
        self.next += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.segments.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SegmentIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| i as f32).collect()
    }

    #[test]
    fn test_segment_count_is_floor() {
        for (len, size) in [(0, 4), (3, 4), (4, 4), (9, 4), (16, 4), (1000, 64)] {
            let samples = ramp(len);
            let segments = segment(&samples, size).unwrap();
            assert_eq!(segments.len(), len / size, "len={len} size={size}");
            assert_eq!(segments.iter().count(), len / size);
        }
    }

    #[test]
    fn test_segments_are_exact_and_ordered() {
        let samples = ramp(10);
        let segments: Vec<_> = segment(&samples, 3).unwrap().into_iter().collect();
        assert_eq!(segments.len(), 3);
        assert_eq!(&*segments[0], &[0.0, 1.0, 2.0]);
        assert_eq!(&*segments[1], &[3.0, 4.0, 5.0]);
        assert_eq!(&*segments[2], &[6.0, 7.0, 8.0]);
        assert!(segments.iter().all(|s| matches!(s, Cow::Borrowed(_))));
    }

    #[test]
    fn test_short_audio_yields_nothing() {
        let samples = ramp(5);
        let segments = segment(&samples, 8).unwrap();
        assert!(segments.is_empty());
        assert!(segments.get(0).is_none());
    }

    #[test]
    fn test_zero_segment_size_is_error() {
        assert!(matches!(segment(&[0.0; 4], 0), Err(CodecError::SegmentSize)));
    }

    #[test]
    fn test_zero_pad_policy_keeps_tail() {
        let samples = ramp(10);
        let segments = segment_with_policy(&samples, 4, PartialSegmentPolicy::ZeroPad).unwrap();
        assert_eq!(segments.len(), 3);
        let last = segments.get(2).unwrap();
        assert_eq!(&*last, &[8.0, 9.0, 0.0, 0.0]);

        let exact = ramp(8);
        let segments = segment_with_policy(&exact, 4, PartialSegmentPolicy::ZeroPad).unwrap();
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn test_random_access_matches_iteration() {
        let samples = ramp(64);
        let segments = segment(&samples, 16).unwrap();
        let iterated: Vec<_> = segments.iter().collect();
        for index in (0..segments.len()).rev() {
            assert_eq!(segments.get(index).unwrap(), iterated[index]);
        }
        assert_eq!(segments.iter().len(), 4);
    }
}
