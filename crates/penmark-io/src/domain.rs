//! Domain types for penmark-io.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::IoError;

/// A signer identifier taken from dataset file names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SignerId(String);

impl SignerId {
    /// Create a new signer ID from a non-empty string.
    pub(crate) fn new(id: String) -> Self {
        debug_assert!(!id.is_empty(), "signer ID must not be empty");
        Self(id)
    }

    /// Return the signer ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SignerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated experiment name for output file naming.
///
/// Must match `[a-zA-Z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentName(String);

impl ExperimentName {
    /// Parse and validate an experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidExperimentName`] if the name is empty or
    /// contains characters outside `[a-zA-Z0-9_-]`.
    pub fn new(name: String) -> Result<Self, IoError> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(IoError::InvalidExperimentName { name });
        }
        Ok(Self(name))
    }

    /// Return the experiment name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a sample was written by its claimed signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SampleKind {
    /// Written by the signer.
    Genuine,
    /// Written by someone imitating the signer.
    Forgery,
}

/// One signature file and what its name says about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleFile {
    path: PathBuf,
    signer: SignerId,
    kind: SampleKind,
}

impl SampleFile {
    pub(crate) fn new(path: PathBuf, signer: SignerId, kind: SampleKind) -> Self {
        Self { path, signer, kind }
    }

    /// Location on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The claimed signer.
    #[must_use]
    pub fn signer(&self) -> &SignerId {
        &self.signer
    }

    /// Genuine or forgery.
    #[must_use]
    pub fn kind(&self) -> SampleKind {
        self.kind
    }

    /// File name for reports; falls back to the full path.
    #[must_use]
    pub fn name(&self) -> String {
        self.path.file_name().map_or_else(
            || self.path.display().to_string(),
            |n| n.to_string_lossy().into_owned(),
        )
    }
}
