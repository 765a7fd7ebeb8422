//! Per-signer enrollment: template building and baseline statistics.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::config::{BaselineMode, FallbackPolicy, VerifierConfig};
use crate::error::VerifyError;
use crate::prototype::{
    BySegment, GlobalPrototype, Grouping, PrototypeBuilder, StrokePrototype, WholeSeries,
};
use crate::signature::Signature;

/// Mean and population standard deviation of the enrollment self-distances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    average: f64,
    deviation: f64,
    distances: Vec<f64>,
}

impl Baseline {
    fn from_distances(distances: Vec<f64>) -> Self {
        let n = distances.len() as f64;
        let average = distances.iter().sum::<f64>() / n;
        let variance = distances
            .iter()
            .map(|d| (d - average).powi(2))
            .sum::<f64>()
            / n;
        Self {
            average,
            deviation: variance.sqrt(),
            distances,
        }
    }

    /// Mean enrollment distance.
    #[must_use]
    pub fn average(&self) -> f64 {
        self.average
    }

    /// Population standard deviation of the enrollment distances.
    #[must_use]
    pub fn deviation(&self) -> f64 {
        self.deviation
    }

    /// Per-sample distances in enrollment order.
    #[must_use]
    pub fn distances(&self) -> &[f64] {
        &self.distances
    }
}

/// Everything needed to score probes for one signer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignerModel {
    config: VerifierConfig,
    strokes: BTreeMap<usize, StrokePrototype>,
    global: GlobalPrototype,
    baseline: Baseline,
}

impl SignerModel {
    /// Build prototypes and baseline statistics from enrollment signatures.
    ///
    /// Signatures are grouped by segment count. Each group's first signature
    /// is anchored to the group's rounded mean segment lengths before seeding
    /// its stroke prototype. The global prototype is anchored to the rounded
    /// mean whole-series length of every signature.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`VerifyError::EmptyEnrollment`] | `signatures` is empty |
    /// | [`VerifyError::InvalidSteepness`] | The config's steepness is invalid |
    /// | [`VerifyError::Dtw`] | A signature's dimension does not match the weights |
    #[instrument(skip_all, fields(signatures = signatures.len(), baseline = ?config.baseline))]
    pub fn build(config: VerifierConfig, signatures: &[Signature]) -> Result<Self, VerifyError> {
        if signatures.is_empty() {
            return Err(VerifyError::EmptyEnrollment);
        }
        config.validate()?;

        let all: Vec<&Signature> = signatures.iter().collect();
        let strokes = group_by_stroke_count(&all)
            .into_iter()
            .map(|(count, group)| Ok((count, build_stroke(&config, &group)?)))
            .collect::<Result<BTreeMap<_, _>, VerifyError>>()?;
        let global = build_global(&config, &all)?;

        let mut model = Self {
            config,
            strokes,
            global,
            baseline: Baseline::from_distances(Vec::new()),
        };

        let distances = match model.config.baseline {
            BaselineMode::Resubstitution => signatures
                .iter()
                .map(|s| model.own_distance(s))
                .collect::<Result<Vec<_>, _>>()?,
            BaselineMode::LeaveOneOut => (0..signatures.len())
                .into_par_iter()
                .map(|i| model.held_out_distance(signatures, i))
                .collect::<Result<Vec<_>, _>>()?,
        };
        model.baseline = Baseline::from_distances(distances);

        info!(
            stroke_templates = model.strokes.len(),
            average = model.baseline.average,
            deviation = model.baseline.deviation,
            "templates built"
        );
        Ok(model)
    }

    /// Distance from `probe` to its matching prototype.
    ///
    /// Uses the stroke prototype with the probe's segment count. Otherwise
    /// the fallback policy decides: the global prototype, or `None` for an
    /// indeterminate probe.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Dtw`] if the probe's dimension does not match.
    pub fn calc_distance_from(&self, probe: &Signature) -> Result<Option<f64>, VerifyError> {
        let dtw = self.config.dtw();
        let alignment = self.config.scoring_alignment;
        if let Some(prototype) = self.strokes.get(&probe.segment_count()) {
            return prototype.distance_from(probe, &dtw, alignment).map(Some);
        }
        match self.config.fallback {
            FallbackPolicy::GlobalPrototype => {
                debug!(segments = probe.segment_count(), "falling back to global prototype");
                self.global.distance_from(probe, &dtw, alignment).map(Some)
            }
            FallbackPolicy::Indeterminate => Ok(None),
        }
    }

    /// `average + k * deviation`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::InvalidTolerance`] if `k` is NaN or infinite.
    pub fn threshold(&self, k: f64) -> Result<f64, VerifyError> {
        if !k.is_finite() {
            return Err(VerifyError::InvalidTolerance { k });
        }
        Ok(self.baseline.average + k * self.baseline.deviation)
    }

    /// The configuration the model was built with.
    #[must_use]
    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Stroke prototype for `segment_count`, if one was built.
    #[must_use]
    pub fn stroke_prototype(&self, segment_count: usize) -> Option<&StrokePrototype> {
        self.strokes.get(&segment_count)
    }

    /// Segment counts that have a stroke prototype, ascending.
    pub fn stroke_counts(&self) -> impl Iterator<Item = usize> + '_ {
        self.strokes.keys().copied()
    }

    /// The whole-series prototype.
    #[must_use]
    pub fn global(&self) -> &GlobalPrototype {
        &self.global
    }

    /// Baseline distance statistics.
    #[must_use]
    pub fn baseline(&self) -> &Baseline {
        &self.baseline
    }

    /// Mean enrollment distance.
    #[must_use]
    pub fn average_distance(&self) -> f64 {
        self.baseline.average
    }

    /// Standard deviation of the enrollment distances.
    #[must_use]
    pub fn distance_deviation(&self) -> f64 {
        self.baseline.deviation
    }

    fn own_distance(&self, signature: &Signature) -> Result<f64, VerifyError> {
        let dtw = self.config.dtw();
        let alignment = self.config.scoring_alignment;
        match self.strokes.get(&signature.segment_count()) {
            Some(prototype) => prototype.distance_from(signature, &dtw, alignment),
            None => self.global.distance_from(signature, &dtw, alignment),
        }
    }

    fn held_out_distance(&self, signatures: &[Signature], held: usize) -> Result<f64, VerifyError> {
        let signature = &signatures[held];
        let others: Vec<&Signature> = signatures
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != held)
            .map(|(_, s)| s)
            .collect();
        let dtw = self.config.dtw();
        let alignment = self.config.scoring_alignment;

        let peers: Vec<&Signature> = others
            .iter()
            .copied()
            .filter(|s| s.segment_count() == signature.segment_count())
            .collect();
        if !peers.is_empty() {
            return build_stroke(&self.config, &peers)?.distance_from(signature, &dtw, alignment);
        }
        if !others.is_empty() {
            return build_global(&self.config, &others)?.distance_from(signature, &dtw, alignment);
        }
        debug!(held, "no other enrollment sample, scoring by resubstitution");
        self.own_distance(signature)
    }
}

fn group_by_stroke_count<'a>(signatures: &[&'a Signature]) -> BTreeMap<usize, Vec<&'a Signature>> {
    let mut groups: BTreeMap<usize, Vec<&Signature>> = BTreeMap::new();
    for &signature in signatures {
        groups
            .entry(signature.segment_count())
            .or_default()
            .push(signature);
    }
    groups
}

fn rounded_mean(total: usize, count: usize) -> usize {
    (total as f64 / count as f64).round() as usize
}

fn builder<G: Grouping>(config: &VerifierConfig) -> PrototypeBuilder<G> {
    PrototypeBuilder::new(config.dtw(), config.template_alignment).with_steepness(config.steepness)
}

fn build_stroke(
    config: &VerifierConfig,
    group: &[&Signature],
) -> Result<StrokePrototype, VerifyError> {
    let first = group.first().ok_or(VerifyError::EmptyEnrollment)?;
    let anchors = (0..first.segment_count())
        .map(|i| {
            let total = group
                .iter()
                .map(|s| s.segment_time(i))
                .sum::<Result<usize, _>>()?;
            Ok(rounded_mean(total, group.len()))
        })
        .collect::<Result<Vec<_>, VerifyError>>()?;

    let mut builder = builder::<BySegment>(config).with_anchor_lengths(anchors);
    for signature in group {
        builder.add_signature(signature)?;
    }
    builder.finalize()
}

fn build_global(
    config: &VerifierConfig,
    signatures: &[&Signature],
) -> Result<GlobalPrototype, VerifyError> {
    if signatures.is_empty() {
        return Err(VerifyError::EmptyEnrollment);
    }
    let total: usize = signatures.iter().map(|s| s.total_time()).sum();
    let anchor = rounded_mean(total, signatures.len());

    let mut builder = builder::<WholeSeries>(config).with_anchor_lengths(vec![anchor]);
    for signature in signatures {
        builder.add_signature(signature)?;
    }
    builder.finalize()
}

/// One signer's enrollment signatures and, once built, their model.
///
/// Adding a signature discards any previously built model.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    config: VerifierConfig,
    signatures: Vec<Signature>,
    model: Option<SignerModel>,
}

impl TrainingSet {
    /// An empty training set.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::InvalidSteepness`] if the config's steepness is invalid.
    pub fn new(config: VerifierConfig) -> Result<Self, VerifyError> {
        config.validate()?;
        Ok(Self {
            config,
            signatures: Vec::new(),
            model: None,
        })
    }

    /// Add an enrollment signature.
    pub fn add_signature(&mut self, signature: Signature) {
        self.signatures.push(signature);
        self.model = None;
    }

    /// Enrollment signatures in insertion order.
    #[must_use]
    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// The configuration templates will be built with.
    #[must_use]
    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Enrollment signatures grouped by segment count.
    #[must_use]
    pub fn by_stroke_count(&self) -> BTreeMap<usize, Vec<&Signature>> {
        let all: Vec<&Signature> = self.signatures.iter().collect();
        group_by_stroke_count(&all)
    }

    /// Build every prototype and the baseline statistics.
    ///
    /// # Errors
    ///
    /// See [`SignerModel::build`].
    pub fn make_templates(&mut self) -> Result<&SignerModel, VerifyError> {
        let model = SignerModel::build(self.config.clone(), &self.signatures)?;
        Ok(self.model.insert(model))
    }

    /// The model from the last [`make_templates`][Self::make_templates].
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::NotTrained`] if no current model exists.
    pub fn model(&self) -> Result<&SignerModel, VerifyError> {
        self.model.as_ref().ok_or(VerifyError::NotTrained)
    }

    /// Take the built model.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::NotTrained`] if no current model exists.
    pub fn into_model(self) -> Result<SignerModel, VerifyError> {
        self.model.ok_or(VerifyError::NotTrained)
    }

    /// See [`SignerModel::calc_distance_from`].
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::NotTrained`] before templates are built.
    pub fn calc_distance_from(&self, probe: &Signature) -> Result<Option<f64>, VerifyError> {
        self.model()?.calc_distance_from(probe)
    }

    /// Mean enrollment distance.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::NotTrained`] before templates are built.
    pub fn average_distance(&self) -> Result<f64, VerifyError> {
        Ok(self.model()?.average_distance())
    }

    /// Standard deviation of the enrollment distances.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::NotTrained`] before templates are built.
    pub fn distance_deviation(&self) -> Result<f64, VerifyError> {
        Ok(self.model()?.distance_deviation())
    }
}
