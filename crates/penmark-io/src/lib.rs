//! Signature file loading, dataset partitioning, and result writing.

mod domain;
mod error;
mod partition;
mod reader;
mod writer;

pub use domain::{ExperimentName, SampleFile, SampleKind, SignerId};
pub use error::IoError;
pub use partition::{DatasetIndex, FORGERY_DIR, Fold, GENUINE_DIR};
pub use reader::{DEFAULT_COLUMNS, DEFAULT_PEN_COLUMN, SignatureReader};
pub use writer::{ResultWriter, VerificationEntry};
