//! JSON result writer for calibration and verification outputs.

use std::fs;
use std::path::{Path, PathBuf};

use penmark_verify::{CalibrationResult, Decision, OperatingPoint};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::{ExperimentName, SignerId};

/// Outcome of scoring one probe file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationEntry {
    /// Probe file name.
    pub file: String,
    /// Distance to the signer model, or `None` when no template applied.
    pub distance: Option<f64>,
    /// The classifier's decision.
    pub decision: Decision,
}

/// Writes calibration and verification results to JSON files.
///
/// Creates the output directory on construction if it does not exist.
/// Output files are named `{experiment}_calibration.json` and
/// `{experiment}_verify.json`.
pub struct ResultWriter {
    output_dir: PathBuf,
    experiment: ExperimentName,
}

impl ResultWriter {
    /// Create a new writer targeting the given directory and experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), experiment = %experiment))]
    pub fn new(output_dir: &Path, experiment: ExperimentName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            experiment,
        })
    }

    /// Write a calibration sweep to `{experiment}_calibration.json`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::Serialize`] | The result cannot be encoded |
    /// | [`IoError::WriteFile`] | The file cannot be written |
    #[instrument(skip_all, fields(signers = signers.len()))]
    pub fn write_calibration(
        &self,
        signers: &[SignerId],
        test_size: usize,
        seed: u64,
        result: &CalibrationResult,
    ) -> Result<PathBuf, IoError> {
        let path = self.artifact_path("calibration");
        let artifact = CalibrationArtifact {
            experiment: self.experiment.as_str(),
            signers: signers.iter().map(SignerId::as_str).collect(),
            test_size,
            seed,
            n_folds: result.n_folds,
            eer: &result.eer,
            points: &result.points,
        };
        write_json(&path, &artifact)?;
        info!(path = %path.display(), k = result.eer.k, "calibration result written");
        Ok(path)
    }

    /// Write per-probe decisions to `{experiment}_verify.json`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::Serialize`] | The result cannot be encoded |
    /// | [`IoError::WriteFile`] | The file cannot be written |
    #[instrument(skip_all, fields(probes = entries.len()))]
    pub fn write_verification(
        &self,
        k: f64,
        threshold: f64,
        entries: &[VerificationEntry],
    ) -> Result<PathBuf, IoError> {
        let path = self.artifact_path("verify");
        let accepted = entries
            .iter()
            .filter(|e| e.decision == Decision::Accept)
            .count();
        let artifact = VerifyArtifact {
            experiment: self.experiment.as_str(),
            k,
            threshold,
            n_probes: entries.len(),
            n_accepted: accepted,
            probes: entries,
        };
        write_json(&path, &artifact)?;
        info!(path = %path.display(), accepted, "verification result written");
        Ok(path)
    }

    /// Return the path where the model binary should be saved.
    ///
    /// Does not write anything. Computes `{output_dir}/{experiment}_model.bin`.
    #[must_use]
    pub fn model_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_model.bin", self.experiment.as_str()))
    }

    fn artifact_path(&self, kind: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{kind}.json", self.experiment.as_str()))
    }
}

fn write_json<T: Serialize>(path: &Path, artifact: &T) -> Result<(), IoError> {
    let json = serde_json::to_string_pretty(artifact).map_err(|e| IoError::Serialize {
        path: path.to_path_buf(),
        source: e,
    })?;
    fs::write(path, json).map_err(|e| IoError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })
}

// --- Shadow structs for JSON serialization ---

#[derive(Serialize)]
struct CalibrationArtifact<'a> {
    experiment: &'a str,
    signers: Vec<&'a str>,
    test_size: usize,
    seed: u64,
    n_folds: usize,
    eer: &'a OperatingPoint,
    points: &'a [OperatingPoint],
}

#[derive(Serialize)]
struct VerifyArtifact<'a> {
    experiment: &'a str,
    k: f64,
    threshold: f64,
    n_probes: usize,
    n_accepted: usize,
    probes: &'a [VerificationEntry],
}
