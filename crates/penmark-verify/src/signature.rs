//! Captured signatures split into alternating pen-down / pen-up segments.

use std::borrow::Cow;

use penmark_dtw::TimeSeries;
use serde::{Deserialize, Serialize};

use crate::error::VerifyError;

/// One uninterrupted pen-down or pen-up stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    series: TimeSeries,
    pen_down: bool,
}

impl Segment {
    /// Tag a series with its pen state.
    #[must_use]
    pub fn new(series: TimeSeries, pen_down: bool) -> Self {
        Self { series, pen_down }
    }

    /// The stroke's points.
    #[must_use]
    pub fn series(&self) -> &TimeSeries {
        &self.series
    }

    /// True if the pen was touching the surface.
    #[must_use]
    pub fn is_pen_down(&self) -> bool {
        self.pen_down
    }

    /// Number of points in the stroke.
    #[must_use]
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Always false for segments inside a [`Signature`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// An immutable captured signature.
///
/// Segments are non-empty, share one point dimension, and strictly alternate
/// pen state. The whole series is the concatenation of all segment points in
/// capture order. Resampling never touches a `Signature`; it happens on a
/// [`WorkingSignature`] obtained from [`Signature::working`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    segments: Vec<Segment>,
    whole: TimeSeries,
}

impl Signature {
    /// Build a signature from its segments.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`VerifyError::EmptySignature`] | `segments` is empty |
    /// | [`VerifyError::EmptySegment`] | A segment has no points |
    /// | [`VerifyError::SegmentDimensionMismatch`] | Segments disagree on dimension |
    /// | [`VerifyError::NonAlternatingPenState`] | Two neighbours share a pen state |
    pub fn new(segments: Vec<Segment>) -> Result<Self, VerifyError> {
        let dim = segments
            .first()
            .ok_or(VerifyError::EmptySignature)?
            .series
            .dim();

        for (index, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                return Err(VerifyError::EmptySegment { index });
            }
            if segment.series.dim() != dim {
                return Err(VerifyError::SegmentDimensionMismatch {
                    index,
                    expected: dim,
                    got: segment.series.dim(),
                });
            }
        }
        if let Some(index) = segments
            .windows(2)
            .position(|pair| pair[0].pen_down == pair[1].pen_down)
        {
            return Err(VerifyError::NonAlternatingPenState { index });
        }

        let whole = TimeSeries::concat(dim, segments.iter().map(|s| &s.series))?;
        Ok(Self { segments, whole })
    }

    /// Split a captured stream into segments wherever the pen state changes.
    ///
    /// `pen_down[i]` is the pen state of point `i`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`VerifyError::PenStateCountMismatch`] | `pen_down.len() != points.len()` |
    /// | [`VerifyError::EmptySignature`] | `points` is empty |
    pub fn from_stream(points: &TimeSeries, pen_down: &[bool]) -> Result<Self, VerifyError> {
        if pen_down.len() != points.len() {
            return Err(VerifyError::PenStateCountMismatch {
                expected: points.len(),
                got: pen_down.len(),
            });
        }

        let dim = points.dim();
        let mut segments = Vec::new();
        let mut start = 0;
        for i in 1..=points.len() {
            if i == points.len() || pen_down[i] != pen_down[start] {
                let values = points.values()[start * dim..i * dim].to_vec();
                segments.push(Segment::new(TimeSeries::new(dim, values)?, pen_down[start]));
                start = i;
            }
        }
        Self::new(segments)
    }

    /// Number of coordinates per point.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.whole.dim()
    }

    /// Number of segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// All segments in capture order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segment `index`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::SegmentOutOfRange`] if `index` is past the last segment.
    pub fn segment(&self, index: usize) -> Result<&Segment, VerifyError> {
        self.segments
            .get(index)
            .ok_or(VerifyError::SegmentOutOfRange {
                index,
                count: self.segments.len(),
            })
    }

    /// Pen state of segment `index`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::SegmentOutOfRange`] if `index` is past the last segment.
    pub fn is_pen_down(&self, index: usize) -> Result<bool, VerifyError> {
        self.segment(index).map(Segment::is_pen_down)
    }

    /// Number of points in segment `index`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::SegmentOutOfRange`] if `index` is past the last segment.
    pub fn segment_time(&self, index: usize) -> Result<usize, VerifyError> {
        self.segment(index).map(Segment::len)
    }

    /// The concatenation of every segment.
    #[must_use]
    pub fn whole(&self) -> &TimeSeries {
        &self.whole
    }

    /// Points captured with the pen down.
    #[must_use]
    pub fn pen_down_time(&self) -> usize {
        self.segments.iter().filter(|s| s.pen_down).map(Segment::len).sum()
    }

    /// Points captured with the pen up.
    #[must_use]
    pub fn pen_up_time(&self) -> usize {
        self.segments.iter().filter(|s| !s.pen_down).map(Segment::len).sum()
    }

    /// Every captured point.
    #[must_use]
    pub fn total_time(&self) -> usize {
        self.whole.len()
    }

    /// A fresh working view with no resampling applied.
    #[must_use]
    pub fn working(&self) -> WorkingSignature<'_> {
        WorkingSignature {
            source: self,
            segments: self.segments.iter().map(|s| Cow::Borrowed(&s.series)).collect(),
            whole: Cow::Borrowed(&self.whole),
        }
    }
}

/// A per-comparison view of a [`Signature`] whose segments and whole series
/// may be resampled.
///
/// Untouched parts borrow from the source; resampled parts are new series
/// derived from the source, so resampling twice never compounds.
#[derive(Debug, Clone)]
pub struct WorkingSignature<'a> {
    source: &'a Signature,
    segments: Vec<Cow<'a, TimeSeries>>,
    whole: Cow<'a, TimeSeries>,
}

impl<'a> WorkingSignature<'a> {
    /// The immutable signature this view was taken from.
    #[must_use]
    pub fn source(&self) -> &'a Signature {
        self.source
    }

    /// Number of segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Current (possibly resampled) series of segment `index`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::SegmentOutOfRange`] if `index` is past the last segment.
    pub fn segment(&self, index: usize) -> Result<&TimeSeries, VerifyError> {
        self.segments
            .get(index)
            .map(|s| s.as_ref())
            .ok_or(VerifyError::SegmentOutOfRange {
                index,
                count: self.segments.len(),
            })
    }

    /// Current (possibly resampled) whole series.
    #[must_use]
    pub fn whole(&self) -> &TimeSeries {
        &self.whole
    }

    /// Replace segment `index` with the original segment resampled to `new_len`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`VerifyError::SegmentOutOfRange`] | `index` is past the last segment |
    /// | [`VerifyError::Dtw`] | `new_len` is zero |
    pub fn resample_segment(&mut self, index: usize, new_len: usize) -> Result<(), VerifyError> {
        let original = self.source.segment(index)?.series();
        self.segments[index] = if original.len() == new_len {
            Cow::Borrowed(original)
        } else {
            Cow::Owned(original.resample(new_len)?)
        };
        Ok(())
    }

    /// Replace the whole series with the original resampled to `new_len`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Dtw`] if `new_len` is zero.
    pub fn resample_whole(&mut self, new_len: usize) -> Result<(), VerifyError> {
        let original = &self.source.whole;
        self.whole = if original.len() == new_len {
            Cow::Borrowed(original)
        } else {
            Cow::Owned(original.resample(new_len)?)
        };
        Ok(())
    }

    /// Current length of segment `index`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::SegmentOutOfRange`] if `index` is past the last segment.
    pub fn segment_time(&self, index: usize) -> Result<usize, VerifyError> {
        self.segment(index).map(TimeSeries::len)
    }

    /// Sum of the current segment lengths.
    #[must_use]
    pub fn total_time(&self) -> usize {
        self.segments.iter().map(|s| s.len()).sum()
    }

    /// Drop every resampling and return to the source's series.
    pub fn reset(&mut self) {
        for (slot, segment) in self.segments.iter_mut().zip(&self.source.segments) {
            *slot = Cow::Borrowed(&segment.series);
        }
        self.whole = Cow::Borrowed(&self.source.whole);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(values: &[f64], pen_down: bool) -> Segment {
        Segment::new(TimeSeries::from_scalars(values.to_vec()).unwrap(), pen_down)
    }

    fn sample() -> Signature {
        Signature::new(vec![
            seg(&[0.0, 1.0, 2.0], true),
            seg(&[5.0, 5.0], false),
            seg(&[3.0, 4.0, 5.0, 6.0], true),
        ])
        .unwrap()
    }

    #[test]
    fn whole_concatenates_segments() {
        let s = sample();
        assert_eq!(s.whole().values(), &[0.0, 1.0, 2.0, 5.0, 5.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(s.segment_count(), 3);
    }

    #[test]
    fn times_are_derived() {
        let s = sample();
        assert_eq!(s.pen_down_time(), 7);
        assert_eq!(s.pen_up_time(), 2);
        assert_eq!(s.total_time(), 9);
        assert_eq!(s.segment_time(1).unwrap(), 2);
    }

    #[test]
    fn rejects_non_alternating() {
        let result = Signature::new(vec![seg(&[1.0], true), seg(&[2.0], true)]);
        assert!(matches!(result, Err(VerifyError::NonAlternatingPenState { index: 0 })));
    }

    #[test]
    fn rejects_empty_signature() {
        assert!(matches!(Signature::new(vec![]), Err(VerifyError::EmptySignature)));
    }

    #[test]
    fn rejects_empty_segment() {
        let empty = Segment::new(TimeSeries::empty(1).unwrap(), false);
        let result = Signature::new(vec![seg(&[1.0], true), empty]);
        assert!(matches!(result, Err(VerifyError::EmptySegment { index: 1 })));
    }

    #[test]
    fn rejects_mixed_dimensions() {
        let wide = Segment::new(TimeSeries::new(2, vec![1.0, 2.0]).unwrap(), false);
        let result = Signature::new(vec![seg(&[1.0], true), wide]);
        assert!(matches!(
            result,
            Err(VerifyError::SegmentDimensionMismatch { index: 1, expected: 1, got: 2 })
        ));
    }

    #[test]
    fn segment_out_of_range_is_typed() {
        let s = sample();
        assert!(matches!(
            s.segment(3),
            Err(VerifyError::SegmentOutOfRange { index: 3, count: 3 })
        ));
    }

    #[test]
    fn from_stream_splits_on_pen_change() {
        let points = TimeSeries::from_scalars(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let pen = [false, true, true, false, false, true];
        let s = Signature::from_stream(&points, &pen).unwrap();
        assert_eq!(s.segment_count(), 4);
        assert!(!s.is_pen_down(0).unwrap());
        assert_eq!(s.segment(1).unwrap().series().values(), &[2.0, 3.0]);
        assert_eq!(s.segment_time(2).unwrap(), 2);
        assert_eq!(s.whole(), &points);
    }

    #[test]
    fn from_stream_checks_pen_count() {
        let points = TimeSeries::from_scalars(vec![1.0, 2.0]).unwrap();
        let result = Signature::from_stream(&points, &[true]);
        assert!(matches!(
            result,
            Err(VerifyError::PenStateCountMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn working_resample_leaves_original_untouched() {
        let s = sample();
        let mut view = s.working();
        view.resample_segment(0, 5).unwrap();
        view.resample_whole(4).unwrap();
        assert_eq!(view.segment(0).unwrap().len(), 5);
        assert_eq!(view.whole().len(), 4);
        assert_eq!(view.total_time(), 11);
        assert_eq!(s.segment(0).unwrap().len(), 3);
        assert_eq!(s.whole().len(), 9);
    }

    #[test]
    fn resampling_twice_does_not_compound() {
        let s = sample();
        let mut view = s.working();
        view.resample_segment(2, 2).unwrap();
        view.resample_segment(2, 4).unwrap();
        assert_eq!(view.segment(2).unwrap(), s.segment(2).unwrap().series());
    }

    #[test]
    fn reset_restores_source() {
        let s = sample();
        let mut view = s.working();
        view.resample_segment(1, 7).unwrap();
        view.resample_whole(3).unwrap();
        view.reset();
        assert_eq!(view.segment(1).unwrap(), s.segment(1).unwrap().series());
        assert_eq!(view.whole(), s.whole());
    }

    #[test]
    fn zero_length_resample_fails() {
        let s = sample();
        let mut view = s.working();
        assert!(matches!(view.resample_segment(0, 0), Err(VerifyError::Dtw(_))));
    }
}
