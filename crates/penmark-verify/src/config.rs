//! Configuration builder for signer enrollment and scoring.

use penmark_dtw::{Alignment, CoordWeights, CostFunction, DEFAULT_RADIUS, Dtw};
use serde::{Deserialize, Serialize};

use crate::error::VerifyError;

/// Default steepness of the descending confidence sigmoid.
pub const DEFAULT_STEEPNESS: f64 = 1.2;

/// What to do with a probe whose stroke count matches no stroke prototype.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FallbackPolicy {
    /// Score against the whole-series global prototype.
    #[default]
    GlobalPrototype,
    /// Report no distance, which classifies as indeterminate.
    Indeterminate,
}

/// How the baseline distance statistics are gathered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaselineMode {
    /// Score every enrollment sample against the prototype it helped build.
    #[default]
    Resubstitution,
    /// Score every enrollment sample against a prototype rebuilt without it.
    LeaveOneOut,
}

/// Configuration for building and scoring one signer's templates.
///
/// Construct via [`VerifierConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter            | Default                 |
/// |----------------------|-------------------------|
/// | `cost`               | `SquaredDifference`     |
/// | `template_alignment` | `Fast { radius: 1 }`    |
/// | `scoring_alignment`  | `Full`                  |
/// | `fallback`           | `GlobalPrototype`       |
/// | `steepness`          | 1.2                     |
/// | `baseline`           | `Resubstitution`        |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifierConfig {
    pub(crate) weights: CoordWeights,
    pub(crate) cost: CostFunction,
    pub(crate) template_alignment: Alignment,
    pub(crate) scoring_alignment: Alignment,
    pub(crate) fallback: FallbackPolicy,
    pub(crate) steepness: f64,
    pub(crate) baseline: BaselineMode,
}

impl VerifierConfig {
    /// Create a config for signatures whose points carry one coordinate per weight.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Dtw`] if `weights` is empty or holds a negative
    /// or non-finite value.
    pub fn new(weights: Vec<f64>) -> Result<Self, VerifyError> {
        Ok(Self {
            weights: CoordWeights::new(weights)?,
            cost: CostFunction::SquaredDifference,
            template_alignment: Alignment::Fast {
                radius: DEFAULT_RADIUS,
            },
            scoring_alignment: Alignment::Full,
            fallback: FallbackPolicy::GlobalPrototype,
            steepness: DEFAULT_STEEPNESS,
            baseline: BaselineMode::Resubstitution,
        })
    }

    /// Uniform weights over `dim` coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Dtw`] if `dim` is zero.
    pub fn uniform(dim: usize) -> Result<Self, VerifyError> {
        Self::new(vec![1.0; dim])
    }

    // --- Setters ---

    /// Set the local cost function.
    #[must_use]
    pub fn with_cost(mut self, cost: CostFunction) -> Self {
        self.cost = cost;
        self
    }

    /// Set the alignment used while fusing enrollment signatures.
    #[must_use]
    pub fn with_template_alignment(mut self, alignment: Alignment) -> Self {
        self.template_alignment = alignment;
        self
    }

    /// Set the alignment used when scoring probes.
    #[must_use]
    pub fn with_scoring_alignment(mut self, alignment: Alignment) -> Self {
        self.scoring_alignment = alignment;
        self
    }

    /// Set the policy for probes with an unseen stroke count.
    #[must_use]
    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    /// Set the confidence sigmoid steepness.
    #[must_use]
    pub fn with_steepness(mut self, steepness: f64) -> Self {
        self.steepness = steepness;
        self
    }

    /// Set how baseline statistics are gathered.
    #[must_use]
    pub fn with_baseline(mut self, baseline: BaselineMode) -> Self {
        self.baseline = baseline;
        self
    }

    // --- Getters ---

    /// Return the coordinate weights.
    #[must_use]
    pub fn weights(&self) -> &CoordWeights {
        &self.weights
    }

    /// Return the local cost function.
    #[must_use]
    pub fn cost(&self) -> CostFunction {
        self.cost
    }

    /// Return the template-building alignment.
    #[must_use]
    pub fn template_alignment(&self) -> Alignment {
        self.template_alignment
    }

    /// Return the scoring alignment.
    #[must_use]
    pub fn scoring_alignment(&self) -> Alignment {
        self.scoring_alignment
    }

    /// Return the fallback policy.
    #[must_use]
    pub fn fallback(&self) -> FallbackPolicy {
        self.fallback
    }

    /// Return the sigmoid steepness.
    #[must_use]
    pub fn steepness(&self) -> f64 {
        self.steepness
    }

    /// Return the baseline mode.
    #[must_use]
    pub fn baseline(&self) -> BaselineMode {
        self.baseline
    }

    /// An aligner carrying these weights and this cost function.
    #[must_use]
    pub fn dtw(&self) -> Dtw {
        Dtw::new(self.weights.clone()).with_cost(self.cost)
    }

    pub(crate) fn validate(&self) -> Result<(), VerifyError> {
        if !self.steepness.is_finite() || self.steepness <= 0.0 {
            return Err(VerifyError::InvalidSteepness {
                value: self.steepness,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_table() {
        let config = VerifierConfig::new(vec![1.0, 0.5]).unwrap();
        assert_eq!(config.cost(), CostFunction::SquaredDifference);
        assert_eq!(config.template_alignment(), Alignment::Fast { radius: 1 });
        assert_eq!(config.scoring_alignment(), Alignment::Full);
        assert_eq!(config.fallback(), FallbackPolicy::GlobalPrototype);
        assert_eq!(config.baseline(), BaselineMode::Resubstitution);
        assert!((config.steepness() - 1.2).abs() < f64::EPSILON);
        assert_eq!(config.weights().as_slice(), &[1.0, 0.5]);
    }

    #[test]
    fn rejects_bad_weights() {
        assert!(matches!(VerifierConfig::new(vec![]), Err(VerifyError::Dtw(_))));
        assert!(matches!(VerifierConfig::new(vec![-1.0]), Err(VerifyError::Dtw(_))));
    }

    #[test]
    fn validate_rejects_bad_steepness() {
        for value in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let config = VerifierConfig::uniform(1).unwrap().with_steepness(value);
            assert!(matches!(
                config.validate(),
                Err(VerifyError::InvalidSteepness { .. })
            ));
        }
    }

    #[test]
    fn dtw_carries_cost() {
        let config = VerifierConfig::uniform(2)
            .unwrap()
            .with_cost(CostFunction::AbsoluteDifference);
        let dtw = config.dtw();
        assert_eq!(dtw.cost(), CostFunction::AbsoluteDifference);
        assert_eq!(dtw.weights().dim(), 2);
    }
}
