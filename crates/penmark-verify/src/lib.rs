//! Online signature verification: prototypes, thresholds, calibration.
//!
//! Enrollment signatures are fused into one prototype per stroke count plus
//! a whole-series global prototype, each point carrying a confidence weight
//! derived from how consistently the signer writes it. Probes are scored by
//! weighted DTW against the matching prototype and accepted when the distance
//! stays within `average + k * deviation` of the enrollment baseline. A
//! calibration sweep over `k` finds the equal-error operating point.

mod calibrate;
mod classifier;
mod config;
mod error;
mod prototype;
mod serialize;
mod signature;
mod training;

pub use calibrate::{
    CalibrationConfig, CalibrationFold, CalibrationResult, ErrorCounts, OperatingPoint,
};
pub use classifier::{Classifier, Decision, decide};
pub use config::{BaselineMode, DEFAULT_STEEPNESS, FallbackPolicy, VerifierConfig};
pub use error::VerifyError;
pub use prototype::{
    BySegment, GlobalPrototype, Grouping, Prototype, PrototypeBuilder, StrokePrototype, Track,
    WholeSeries, confidence_weight,
};
pub use signature::{Segment, Signature, WorkingSignature};
pub use training::{Baseline, SignerModel, TrainingSet};
