//! I/O error types for penmark-io.

use std::path::PathBuf;

use penmark_verify::VerifyError;

/// Errors from signature file parsing, dataset scanning, and result writing.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when the input file does not exist or is unreadable.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a dataset directory cannot be listed.
    #[error("cannot read directory {path}")]
    ReadDir {
        /// Directory that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a row is too short to contain a required column.
    #[error("{path}: line {line} has {got} columns, column {column} is required")]
    MissingColumn {
        /// Path to the signature file.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// Zero-based column index that was required.
        column: usize,
        /// Number of columns on the line.
        got: usize,
    },

    /// Returned when a cell value is NaN, Inf, or otherwise not a finite float.
    #[error("non-finite value in {path}: line {line}, column {column}, raw value \"{raw}\"")]
    NonFiniteValue {
        /// Path to the signature file.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// Zero-based column index.
        column: usize,
        /// The raw string value that failed to parse.
        raw: String,
    },

    /// Returned when a signature file contains no data rows.
    #[error("no samples in {path}")]
    EmptySignature {
        /// Path to the signature file.
        path: PathBuf,
    },

    /// Returned when the parsed rows do not form a valid signature.
    #[error("invalid signature in {path}")]
    InvalidSignature {
        /// Path to the signature file.
        path: PathBuf,
        /// Underlying validation error.
        source: VerifyError,
    },

    /// Returned when a reader is configured with no columns.
    #[error("at least one column must be selected")]
    NoColumns,

    /// Returned when the column and weight lists differ in length.
    #[error("{columns} columns selected but {weights} weights given")]
    ColumnWeightMismatch {
        /// Number of selected columns.
        columns: usize,
        /// Number of weights.
        weights: usize,
    },

    /// Returned when a column weight is negative or non-finite.
    #[error("invalid weight {value} for column {column}")]
    InvalidColumnWeight {
        /// Zero-based column index the weight belongs to.
        column: usize,
        /// The rejected weight.
        value: f64,
    },

    /// Returned when a signer has no genuine samples in the dataset.
    #[error("unknown signer \"{signer}\"")]
    UnknownSigner {
        /// The requested signer.
        signer: String,
    },

    /// Returned when a probe count leaves no room for enrollment.
    #[error("test size {test_size} is invalid for {available} genuine samples")]
    InvalidTestSize {
        /// Requested probes per fold.
        test_size: usize,
        /// Genuine samples available for the signer.
        available: usize,
    },

    /// Returned when the experiment name contains characters outside `[a-zA-Z0-9_-]`.
    #[error("invalid experiment name \"{name}\": must match [a-zA-Z0-9_-]+")]
    InvalidExperimentName {
        /// The invalid name.
        name: String,
    },

    /// Returned when the output directory cannot be created.
    #[error("cannot create output directory {path}")]
    OutputDirCreate {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a result artifact cannot be encoded as JSON.
    #[error("cannot encode {path} as JSON")]
    Serialize {
        /// Path the artifact was destined for.
        path: PathBuf,
        /// Underlying serde_json error.
        source: serde_json::Error,
    },

    /// Returned when a result file cannot be written.
    #[error("cannot write file {path}")]
    WriteFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
