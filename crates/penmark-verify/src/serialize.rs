//! Signer model serialization and deserialization via bincode.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::error::VerifyError;
use crate::training::SignerModel;

/// Current binary format version.
const FORMAT_VERSION: u32 = 1;

/// Versioned envelope for the serialized model.
#[derive(serde::Serialize, serde::Deserialize)]
struct ModelEnvelope {
    /// Format version for compatibility checking.
    format_version: u32,
    /// Number of coordinates per point the model expects.
    dim: usize,
    /// Number of enrollment signatures behind the baseline.
    n_enrolled: usize,
    /// The serialized model.
    model: SignerModel,
}

impl SignerModel {
    /// Save the model to a binary file.
    ///
    /// Uses bincode encoding wrapped in a versioned envelope for
    /// forward-compatibility checking.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`VerifyError::SerializeModel`] | bincode encoding failed |
    /// | [`VerifyError::WriteModel`] | file write failed |
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), VerifyError> {
        let path = path.as_ref();

        let envelope = ModelEnvelope {
            format_version: FORMAT_VERSION,
            dim: self.config().weights().dim(),
            n_enrolled: self.baseline().distances().len(),
            model: self.clone(),
        };

        let bytes = bincode::serialize(&envelope)
            .map_err(|e| VerifyError::SerializeModel { source: e })?;

        std::fs::write(path, &bytes).map_err(|e| VerifyError::WriteModel {
            path: path.to_path_buf(),
            source: e,
        })?;

        info!(size_bytes = bytes.len(), dim = envelope.dim, "model saved");

        Ok(())
    }

    /// Load a model from a binary file.
    ///
    /// Checks the format version and returns an error on mismatch.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`VerifyError::ReadModel`] | file read failed |
    /// | [`VerifyError::DeserializeModel`] | bincode decoding failed |
    /// | [`VerifyError::IncompatibleModelVersion`] | format version mismatch |
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, VerifyError> {
        let path = path.as_ref();

        let bytes = std::fs::read(path).map_err(|e| VerifyError::ReadModel {
            path: path.to_path_buf(),
            source: e,
        })?;

        let envelope: ModelEnvelope =
            bincode::deserialize(&bytes).map_err(|e| VerifyError::DeserializeModel {
                path: path.to_path_buf(),
                source: e,
            })?;

        if envelope.format_version != FORMAT_VERSION {
            return Err(VerifyError::IncompatibleModelVersion {
                expected: FORMAT_VERSION,
                found: envelope.format_version,
                path: path.to_path_buf(),
            });
        }

        debug!(
            dim = envelope.dim,
            n_enrolled = envelope.n_enrolled,
            "model loaded"
        );

        Ok(envelope.model)
    }
}

#[cfg(test)]
mod tests {
    use penmark_dtw::TimeSeries;
    use tempfile::TempDir;

    use super::*;
    use crate::config::{FallbackPolicy, VerifierConfig};
    use crate::signature::{Segment, Signature};

    fn signature(down: &[f64], up: &[f64]) -> Signature {
        Signature::new(vec![
            Segment::new(TimeSeries::from_scalars(down.to_vec()).unwrap(), true),
            Segment::new(TimeSeries::from_scalars(up.to_vec()).unwrap(), false),
        ])
        .unwrap()
    }

    fn train_simple_model() -> SignerModel {
        let config = VerifierConfig::uniform(1)
            .unwrap()
            .with_fallback(FallbackPolicy::Indeterminate);
        SignerModel::build(
            config,
            &[
                signature(&[0.0, 1.0, 2.0, 3.0], &[3.0, 3.0]),
                signature(&[0.0, 1.2, 2.1, 2.9, 3.1], &[3.0]),
                signature(&[0.1, 0.9, 2.0, 3.0], &[2.9, 3.0, 3.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn round_trip_identical_distances() {
        let dir = TempDir::new().unwrap();
        let model_path = dir.path().join("test_model.bin");

        let model = train_simple_model();

        // Save
        model.save(&model_path).unwrap();

        // Load
        let loaded = SignerModel::load(&model_path).unwrap();
        assert_eq!(loaded, model);

        // Verify identical distances
        let probe = signature(&[0.0, 1.5, 2.5, 3.0], &[3.0, 3.0]);
        assert_eq!(
            model.calc_distance_from(&probe).unwrap(),
            loaded.calc_distance_from(&probe).unwrap()
        );
        assert_eq!(loaded.config().fallback(), FallbackPolicy::Indeterminate);
    }

    #[test]
    fn load_nonexistent_file_error() {
        let dir = TempDir::new().unwrap();
        let err = SignerModel::load(dir.path().join("missing.bin")).unwrap_err();
        assert!(matches!(err, VerifyError::ReadModel { .. }));
    }

    #[test]
    fn load_corrupt_file_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.bin");
        std::fs::write(&path, b"not a valid bincode file").unwrap();
        let err = SignerModel::load(&path).unwrap_err();
        assert!(matches!(err, VerifyError::DeserializeModel { .. }));
    }

    #[test]
    fn load_rejects_other_versions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("future.bin");
        let envelope = ModelEnvelope {
            format_version: FORMAT_VERSION + 1,
            dim: 1,
            n_enrolled: 3,
            model: train_simple_model(),
        };
        std::fs::write(&path, bincode::serialize(&envelope).unwrap()).unwrap();
        let err = SignerModel::load(&path).unwrap_err();
        assert!(matches!(
            err,
            VerifyError::IncompatibleModelVersion { expected: 1, found: 2, .. }
        ));
    }
}
