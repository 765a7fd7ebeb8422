use std::path::PathBuf;

use penmark_dtw::DtwError;

/// Errors from signature construction, prototype synthesis, training,
/// classification, calibration, and model persistence.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// Returned when a time series operation or alignment fails.
    #[error(transparent)]
    Dtw(#[from] DtwError),

    /// Returned when a signature is built from zero segments.
    #[error("signature has no segments")]
    EmptySignature,

    /// Returned when a segment contains no points.
    #[error("segment {index} has no points")]
    EmptySegment {
        /// Position of the empty segment.
        index: usize,
    },

    /// Returned when two consecutive segments share the same pen state.
    #[error("segment {index} has the same pen state as the segment after it")]
    NonAlternatingPenState {
        /// Position of the first of the two offending segments.
        index: usize,
    },

    /// Returned when a pen-state stream does not cover every point.
    #[error("expected {expected} pen states, got {got}")]
    PenStateCountMismatch {
        /// Number of points in the series.
        expected: usize,
        /// Number of pen states supplied.
        got: usize,
    },

    /// Returned when a segment differs in point dimension from the first.
    #[error("segment {index} has dimension {got}, expected {expected}")]
    SegmentDimensionMismatch {
        /// Position of the offending segment.
        index: usize,
        /// Dimension of the first segment.
        expected: usize,
        /// Dimension of the offending segment.
        got: usize,
    },

    /// Returned when a segment index is past the last segment.
    #[error("segment {index} out of range for signature with {count} segments")]
    SegmentOutOfRange {
        /// The requested segment index.
        index: usize,
        /// Number of segments in the signature.
        count: usize,
    },

    /// Returned when a signature's track count differs from the prototype being built.
    #[error("signature has {got} tracks, prototype has {expected}")]
    TrackCountMismatch {
        /// Track count of the prototype.
        expected: usize,
        /// Track count of the offending signature.
        got: usize,
    },

    /// Returned when anchor lengths do not cover every track of the first signature.
    #[error("expected {expected} anchor lengths, got {got}")]
    AnchorCountMismatch {
        /// Track count of the first signature.
        expected: usize,
        /// Number of anchor lengths supplied.
        got: usize,
    },

    /// Returned when a prototype is finalized before any signature was added.
    #[error("prototype has no contributing signatures")]
    EmptyPrototype,

    /// Returned when point weights are requested before point consistency.
    #[error("point consistency must be calculated before point weights")]
    ConsistencyNotCalculated,

    /// Returned when templates are built from zero enrollment signatures.
    #[error("cannot build templates from an empty enrollment set")]
    EmptyEnrollment,

    /// Returned when a signer model is needed but templates have not been built.
    #[error("training set has not been trained; call make_templates first")]
    NotTrained,

    /// Returned when the sigmoid steepness is not a positive finite number.
    #[error("sigmoid steepness must be positive and finite, got {value}")]
    InvalidSteepness {
        /// The rejected steepness.
        value: f64,
    },

    /// Returned when a tolerance `k` is NaN or infinite.
    #[error("tolerance must be finite, got {k}")]
    InvalidTolerance {
        /// The rejected tolerance.
        k: f64,
    },

    /// Returned when a k sweep has a non-positive step or a non-finite bound.
    #[error("invalid k sweep: start {start}, end {end}, step {step}")]
    InvalidSweep {
        /// First k of the sweep.
        start: f64,
        /// Last k of the sweep.
        end: f64,
        /// Distance between consecutive k values.
        step: f64,
    },

    /// Returned when calibration is run without any folds.
    #[error("calibration needs at least one fold")]
    NoCalibrationFolds,

    /// Returned when model serialization fails.
    #[error("failed to serialize signer model")]
    SerializeModel {
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when model deserialization fails.
    #[error("failed to deserialize signer model from {path}")]
    DeserializeModel {
        /// Path to the model file that could not be deserialized.
        path: PathBuf,
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when writing the model file fails.
    #[error("failed to write signer model to {path}")]
    WriteModel {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when reading the model file fails.
    #[error("failed to read signer model from {path}")]
    ReadModel {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when loading a model with an incompatible format version.
    #[error("incompatible model version in {path}: expected {expected}, found {found}")]
    IncompatibleModelVersion {
        /// The model format version this build expects.
        expected: u32,
        /// The model format version found in the file.
        found: u32,
        /// Path to the model file with the incompatible version.
        path: PathBuf,
    },
}
