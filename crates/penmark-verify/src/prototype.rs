//! Incremental prototype synthesis from same-signer enrollment signatures.
//!
//! A prototype is a list of tracks. [`BySegment`] keeps one track per
//! segment and only fuses pen-down tracks; [`WholeSeries`] keeps a single
//! track over the concatenated series. Both share one implementation of the
//! running-average update, point consistency, and confidence weights.

use std::fmt::Debug;
use std::marker::PhantomData;

use penmark_dtw::{Alignment, Dtw, DtwDistance, DtwError, TimeSeries, WarpingPath};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::config::DEFAULT_STEEPNESS;
use crate::error::VerifyError;
use crate::signature::{Segment, Signature, WorkingSignature};

/// How a signature's points are split into prototype tracks.
pub trait Grouping: Debug + Clone + Copy + Default + PartialEq + Send + Sync + 'static {
    /// Name used in log fields.
    const NAME: &'static str;

    /// Number of tracks `signature` contributes.
    fn track_count(signature: &Signature) -> usize;

    /// Whether track `index` of `signature` counts as writing.
    fn is_pen_down(signature: &Signature, index: usize) -> bool;

    /// Current series of track `index` in `view`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::SegmentOutOfRange`] if `index` is not a track.
    fn track<'v>(
        view: &'v WorkingSignature<'_>,
        index: usize,
    ) -> Result<&'v TimeSeries, VerifyError>;

    /// Resample track `index` of `view` to `len` points.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::SegmentOutOfRange`] if `index` is not a track, or
    /// [`VerifyError::Dtw`] if `len` is zero.
    fn resample_track(
        view: &mut WorkingSignature<'_>,
        index: usize,
        len: usize,
    ) -> Result<(), VerifyError>;
}

/// One track per segment; pen-up tracks are carried but never fused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BySegment;

impl Grouping for BySegment {
    const NAME: &'static str = "stroke";

    fn track_count(signature: &Signature) -> usize {
        signature.segment_count()
    }

    fn is_pen_down(signature: &Signature, index: usize) -> bool {
        signature
            .segments()
            .get(index)
            .is_some_and(Segment::is_pen_down)
    }

    fn track<'v>(
        view: &'v WorkingSignature<'_>,
        index: usize,
    ) -> Result<&'v TimeSeries, VerifyError> {
        view.segment(index)
    }

    fn resample_track(
        view: &mut WorkingSignature<'_>,
        index: usize,
        len: usize,
    ) -> Result<(), VerifyError> {
        view.resample_segment(index, len)
    }
}

/// A single track over the whole concatenated series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WholeSeries;

impl WholeSeries {
    fn check(index: usize) -> Result<(), VerifyError> {
        if index == 0 {
            Ok(())
        } else {
            Err(VerifyError::SegmentOutOfRange { index, count: 1 })
        }
    }
}

impl Grouping for WholeSeries {
    const NAME: &'static str = "global";

    fn track_count(_signature: &Signature) -> usize {
        1
    }

    fn is_pen_down(_signature: &Signature, index: usize) -> bool {
        index == 0
    }

    fn track<'v>(
        view: &'v WorkingSignature<'_>,
        index: usize,
    ) -> Result<&'v TimeSeries, VerifyError> {
        Self::check(index)?;
        Ok(view.whole())
    }

    fn resample_track(
        view: &mut WorkingSignature<'_>,
        index: usize,
        len: usize,
    ) -> Result<(), VerifyError> {
        Self::check(index)?;
        view.resample_whole(len)
    }
}

/// Per-stroke-count prototype.
pub type StrokePrototype = Prototype<BySegment>;

/// Whole-series fallback prototype.
pub type GlobalPrototype = Prototype<WholeSeries>;

/// One fused (or carried) sequence of prototype points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    values: TimeSeries,
    pen_down: bool,
    fused: bool,
    multiplicity: Vec<usize>,
    consistency: Vec<f64>,
    weights: Vec<f64>,
}

impl Track {
    fn seed(values: TimeSeries, pen_down: bool, fused: bool) -> Self {
        let len = values.len();
        Self {
            values,
            pen_down,
            fused,
            multiplicity: vec![1; len],
            consistency: vec![0.0; len],
            weights: vec![1.0; len],
        }
    }

    /// Running-average point values.
    #[must_use]
    pub fn values(&self) -> &TimeSeries {
        &self.values
    }

    /// Pen state of the signature that seeded this track.
    #[must_use]
    pub fn is_pen_down(&self) -> bool {
        self.pen_down
    }

    /// Whether later signatures were folded into this track.
    #[must_use]
    pub fn is_fused(&self) -> bool {
        self.fused
    }

    /// Raw points folded into each prototype point, `r` in the literature.
    #[must_use]
    pub fn multiplicity(&self) -> &[usize] {
        &self.multiplicity
    }

    /// Mean local cost between each point and the points aligned to it.
    #[must_use]
    pub fn consistency(&self) -> &[f64] {
        &self.consistency
    }

    /// Confidence weight of each point.
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false for tracks of a finalized prototype.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn fuse(&mut self, aligned: &TimeSeries, path: &WarpingPath) {
        for j in 0..self.values.len() {
            let matches = path.matches_for(j);
            if matches.is_empty() {
                continue;
            }
            let r = self.multiplicity[j] as f64;
            let total = r + matches.len() as f64;
            for (d, value) in self.values.point_mut(j).iter_mut().enumerate() {
                let sum: f64 = matches.iter().map(|step| aligned.point(step.b)[d]).sum();
                *value = (*value * r + sum) / total;
            }
            self.multiplicity[j] += matches.len();
        }
    }

    fn max_deviation(&self) -> f64 {
        (1..self.len())
            .filter(|&j| self.multiplicity[j] > 1)
            .map(|j| (self.consistency[j] - self.consistency[j - 1]).abs())
            .fold(0.0, f64::max)
    }
}

/// Confidence weight of a point whose consistency differs from its
/// predecessor's by `delta`, given the largest such difference `max_dev`.
///
/// A descending sigmoid of `delta / max_dev` centred on one half: small
/// changes score near 1, the largest change near 0. A zero `max_dev` gives 1.
#[must_use]
pub fn confidence_weight(delta: f64, max_dev: f64, steepness: f64) -> f64 {
    if max_dev == 0.0 {
        return 1.0;
    }
    let x = (delta / max_dev * 2.0 - 1.0) * 5.0 * steepness;
    1.0 / (1.0 + x.exp())
}

/// A finalized prototype. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Prototype<G: Grouping> {
    tracks: Vec<Track>,
    signatures: usize,
    #[serde(skip)]
    grouping: PhantomData<G>,
}

impl<G: Grouping> Prototype<G> {
    /// All tracks in order.
    #[must_use]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Number of tracks.
    #[must_use]
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Track `index`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::SegmentOutOfRange`] if `index` is past the last track.
    pub fn track(&self, index: usize) -> Result<&Track, VerifyError> {
        self.tracks.get(index).ok_or(VerifyError::SegmentOutOfRange {
            index,
            count: self.tracks.len(),
        })
    }

    /// Points across every track.
    #[must_use]
    pub fn total_time(&self) -> usize {
        self.tracks.iter().map(Track::len).sum()
    }

    /// Number of signatures folded into this prototype.
    #[must_use]
    pub fn signature_count(&self) -> usize {
        self.signatures
    }

    /// Weighted distance from this prototype to `probe`.
    ///
    /// Every pen-down track of the probe is resampled to the prototype track's
    /// length and aligned with the prototype's confidence weights. Each track
    /// distance is scaled by `1 + |probe time - prototype time| / prototype time`,
    /// where probe time is measured before resampling, and the results summed.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`VerifyError::TrackCountMismatch`] | The probe splits into a different number of tracks |
    /// | [`VerifyError::Dtw`] | The probe's dimension does not match the aligner |
    pub fn distance_from(
        &self,
        probe: &Signature,
        dtw: &Dtw,
        alignment: Alignment,
    ) -> Result<f64, VerifyError> {
        let count = G::track_count(probe);
        if count != self.tracks.len() {
            return Err(VerifyError::TrackCountMismatch {
                expected: self.tracks.len(),
                got: count,
            });
        }

        let own = self.total_time() as f64;
        let penalty = 1.0 + (probe.total_time() as f64 - own).abs() / own;

        let mut view = probe.working();
        let mut distance = DtwDistance::ZERO;
        for (i, track) in self.tracks.iter().enumerate() {
            if !G::is_pen_down(probe, i) {
                continue;
            }
            G::resample_track(&mut view, i, track.len())?;
            let d = alignment.distance(
                dtw,
                track.values.as_view(),
                G::track(&view, i)?.as_view(),
                Some(&track.weights),
            )?;
            distance = distance + d.scaled(penalty);
        }
        Ok(distance.value())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    Building,
    Consistent,
    Weighted,
}

#[derive(Debug, Clone)]
struct Aligned {
    series: TimeSeries,
    path: WarpingPath,
}

/// Grows a [`Prototype`] one signature at a time.
///
/// The first signature seeds the prototype (after optional anchoring to
/// fixed track lengths). Every later signature is resampled to the current
/// track lengths, aligned, and folded into the running averages. Consistency
/// must be calculated before weights; [`finalize`][Self::finalize] does both
/// if the caller has not.
#[derive(Debug, Clone)]
pub struct PrototypeBuilder<G: Grouping> {
    dtw: Dtw,
    alignment: Alignment,
    steepness: f64,
    anchor_lengths: Option<Vec<usize>>,
    tracks: Vec<Track>,
    history: Vec<Vec<Option<Aligned>>>,
    signatures: usize,
    stage: Stage,
    grouping: PhantomData<G>,
}

impl<G: Grouping> PrototypeBuilder<G> {
    /// Start an empty prototype aligned with `dtw` in `alignment` mode.
    #[must_use]
    pub fn new(dtw: Dtw, alignment: Alignment) -> Self {
        Self {
            dtw,
            alignment,
            steepness: DEFAULT_STEEPNESS,
            anchor_lengths: None,
            tracks: Vec::new(),
            history: Vec::new(),
            signatures: 0,
            stage: Stage::Building,
            grouping: PhantomData,
        }
    }

    /// Set the confidence sigmoid steepness.
    #[must_use]
    pub fn with_steepness(mut self, steepness: f64) -> Self {
        self.steepness = steepness;
        self
    }

    /// Resample the first signature's tracks to these lengths before seeding.
    #[must_use]
    pub fn with_anchor_lengths(mut self, lengths: Vec<usize>) -> Self {
        self.anchor_lengths = Some(lengths);
        self
    }

    /// Number of signatures added so far.
    #[must_use]
    pub fn signature_count(&self) -> usize {
        self.signatures
    }

    /// Current tracks, including in-progress values.
    #[must_use]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Fold `signature` into the prototype.
    ///
    /// Invalidates previously calculated consistency and weights.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`VerifyError::AnchorCountMismatch`] | Anchor lengths do not cover every track of the first signature |
    /// | [`VerifyError::TrackCountMismatch`] | `signature` has a different track count than the prototype |
    /// | [`VerifyError::Dtw`] | Dimension mismatch or a zero anchor length |
    #[instrument(skip_all, fields(grouping = G::NAME, added = self.signatures))]
    pub fn add_signature(&mut self, signature: &Signature) -> Result<(), VerifyError> {
        if signature.dim() != self.dtw.weights().dim() {
            return Err(DtwError::WeightCountMismatch {
                expected: signature.dim(),
                got: self.dtw.weights().dim(),
            }
            .into());
        }

        if self.signatures == 0 {
            self.seed(signature)?;
        } else {
            self.fold(signature)?;
        }
        self.signatures += 1;
        self.stage = Stage::Building;
        Ok(())
    }

    fn seed(&mut self, signature: &Signature) -> Result<(), VerifyError> {
        let count = G::track_count(signature);
        let mut view = signature.working();
        if let Some(anchors) = &self.anchor_lengths {
            if anchors.len() != count {
                return Err(VerifyError::AnchorCountMismatch {
                    expected: count,
                    got: anchors.len(),
                });
            }
            for (i, &len) in anchors.iter().enumerate() {
                G::resample_track(&mut view, i, len)?;
            }
        }

        self.tracks = (0..count)
            .map(|i| {
                let pen_down = G::is_pen_down(signature, i);
                let values = G::track(&view, i)?.clone();
                Ok(Track::seed(values, pen_down, pen_down))
            })
            .collect::<Result<_, VerifyError>>()?;
        debug!(
            tracks = count,
            total_time = self.tracks.iter().map(Track::len).sum::<usize>(),
            "seeded prototype"
        );
        Ok(())
    }

    fn fold(&mut self, signature: &Signature) -> Result<(), VerifyError> {
        let count = G::track_count(signature);
        if count != self.tracks.len() {
            return Err(VerifyError::TrackCountMismatch {
                expected: self.tracks.len(),
                got: count,
            });
        }

        let mut view = signature.working();
        let mut aligned = Vec::with_capacity(count);
        for (i, track) in self.tracks.iter_mut().enumerate() {
            if !track.fused {
                aligned.push(None);
                continue;
            }
            G::resample_track(&mut view, i, track.len())?;
            let series = G::track(&view, i)?.clone();
            let (_, path) =
                self.alignment
                    .path(&self.dtw, track.values.as_view(), series.as_view(), None)?;
            track.fuse(&series, &path);
            aligned.push(Some(Aligned { series, path }));
        }
        self.history.push(aligned);
        Ok(())
    }

    /// Compute each point's mean local cost to the points aligned to it.
    ///
    /// Points that never received an aligned point score 0.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::EmptyPrototype`] if no signature was added.
    pub fn calculate_point_consistency(&mut self) -> Result<(), VerifyError> {
        if self.signatures == 0 {
            return Err(VerifyError::EmptyPrototype);
        }
        let weights = self.dtw.weights().as_slice();
        let cost = self.dtw.cost();

        for (i, track) in self.tracks.iter_mut().enumerate() {
            if !track.fused {
                continue;
            }
            let consistency = (0..track.len())
                .map(|j| {
                    let point = track.values.point(j);
                    let (sum, count) = self
                        .history
                        .iter()
                        .filter_map(|signature| signature[i].as_ref())
                        .flat_map(|a| a.path.matches_for(j).iter().map(move |s| a.series.point(s.b)))
                        .fold((0.0, 0usize), |(sum, count), other| {
                            (sum + cost.eval(weights, point, other), count + 1)
                        });
                    if count == 0 { 0.0 } else { sum / count as f64 }
                })
                .collect();
            track.consistency = consistency;
        }
        self.stage = Stage::Consistent;
        Ok(())
    }

    /// Derive confidence weights from consistency, one maximum deviation per track.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::ConsistencyNotCalculated`] if consistency is
    /// stale or missing.
    pub fn calculate_point_weights(&mut self) -> Result<(), VerifyError> {
        if self.stage < Stage::Consistent {
            return Err(VerifyError::ConsistencyNotCalculated);
        }
        for track in self.tracks.iter_mut().filter(|t| t.fused) {
            let max_dev = track.max_deviation();
            let mut weights = Vec::with_capacity(track.len());
            for j in 0..track.len() {
                weights.push(if j == 0 {
                    1.0
                } else {
                    let delta = (track.consistency[j] - track.consistency[j - 1]).abs();
                    confidence_weight(delta, max_dev, self.steepness)
                });
            }
            track.weights = weights;
        }
        self.stage = Stage::Weighted;
        Ok(())
    }

    /// Finish the prototype, computing consistency and weights if still pending.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::EmptyPrototype`] if no signature was added.
    #[instrument(skip_all, fields(grouping = G::NAME, signatures = self.signatures))]
    pub fn finalize(mut self) -> Result<Prototype<G>, VerifyError> {
        if self.signatures == 0 {
            return Err(VerifyError::EmptyPrototype);
        }
        if self.stage < Stage::Consistent {
            self.calculate_point_consistency()?;
        }
        if self.stage < Stage::Weighted {
            self.calculate_point_weights()?;
        }

        let prototype = Prototype {
            tracks: self.tracks,
            signatures: self.signatures,
            grouping: PhantomData,
        };
        info!(
            tracks = prototype.track_count(),
            total_time = prototype.total_time(),
            "prototype finalized"
        );
        Ok(prototype)
    }
}
