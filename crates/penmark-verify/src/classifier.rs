//! Threshold classification of probe signatures.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::VerifyError;
use crate::signature::Signature;
use crate::training::{SignerModel, TrainingSet};

/// Outcome of classifying one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    /// Distance within the threshold.
    Accept,
    /// Distance above the threshold.
    Reject,
    /// No prototype matched the probe's shape.
    Indeterminate,
}

/// Map a distance to a decision. `None` means no prototype matched.
#[must_use]
pub fn decide(distance: Option<f64>, threshold: f64) -> Decision {
    match distance {
        None => Decision::Indeterminate,
        Some(d) if d > threshold => Decision::Reject,
        Some(_) => Decision::Accept,
    }
}

/// Classifies probes against one signer's model.
#[derive(Debug, Clone, Copy)]
pub struct Classifier<'a> {
    model: &'a SignerModel,
}

impl<'a> Classifier<'a> {
    /// Bind a trained model.
    #[must_use]
    pub fn new(model: &'a SignerModel) -> Self {
        Self { model }
    }

    /// Bind the model of a trained set.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::NotTrained`] if templates have not been built.
    pub fn from_training_set(set: &'a TrainingSet) -> Result<Self, VerifyError> {
        Ok(Self::new(set.model()?))
    }

    /// The bound model.
    #[must_use]
    pub fn model(&self) -> &'a SignerModel {
        self.model
    }

    /// Accept if the probe's distance is at most `average + k * deviation`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`VerifyError::InvalidTolerance`] | `k` is NaN or infinite |
    /// | [`VerifyError::Dtw`] | The probe's dimension does not match the model |
    #[instrument(skip(self, probe), fields(segments = probe.segment_count()))]
    pub fn classify(&self, probe: &Signature, k: f64) -> Result<Decision, VerifyError> {
        let threshold = self.model.threshold(k)?;
        let distance = self.model.calc_distance_from(probe)?;
        let decision = decide(distance, threshold);
        debug!(?distance, threshold, ?decision, "classified probe");
        Ok(decision)
    }
}
