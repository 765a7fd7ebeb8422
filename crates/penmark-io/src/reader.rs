//! HWR signature reader with full input validation.

use std::path::Path;

use penmark_dtw::TimeSeries;
use penmark_verify::{Signature, VerifyError};
use tracing::{debug, instrument};

use crate::IoError;

/// Column holding the pen channel in HWR captures.
pub const DEFAULT_PEN_COLUMN: usize = 2;

/// Measurement columns read by default.
pub const DEFAULT_COLUMNS: [usize; 3] = [3, 4, 5];

/// Reads online signature captures in HWR format.
///
/// Expected format:
/// - One sample per line, whitespace-separated numeric columns
/// - The pen column is zero while the pen is lifted
/// - Blank lines are ignored
///
/// Each selected column becomes one point coordinate, multiplied by its
/// weight at ingestion. Consecutive rows with the same pen state form one
/// segment.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::MissingColumn`] | A row is too short for a selected or pen column |
/// | [`IoError::NonFiniteValue`] | Cell is NaN, Inf, or unparseable float |
/// | [`IoError::EmptySignature`] | No data rows |
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureReader {
    columns: Vec<usize>,
    weights: Vec<f64>,
    pen_column: usize,
}

impl Default for SignatureReader {
    fn default() -> Self {
        Self {
            columns: DEFAULT_COLUMNS.to_vec(),
            weights: vec![1.0; DEFAULT_COLUMNS.len()],
            pen_column: DEFAULT_PEN_COLUMN,
        }
    }
}

impl SignatureReader {
    /// Read `columns`, scaling each by the matching entry of `weights`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::NoColumns`] | `columns` is empty |
    /// | [`IoError::ColumnWeightMismatch`] | Lengths differ |
    /// | [`IoError::InvalidColumnWeight`] | A weight is negative or non-finite |
    pub fn new(columns: Vec<usize>, weights: Vec<f64>) -> Result<Self, IoError> {
        if columns.is_empty() {
            return Err(IoError::NoColumns);
        }
        if columns.len() != weights.len() {
            return Err(IoError::ColumnWeightMismatch {
                columns: columns.len(),
                weights: weights.len(),
            });
        }
        if let Some(i) = weights.iter().position(|w| !w.is_finite() || *w < 0.0) {
            return Err(IoError::InvalidColumnWeight {
                column: columns[i],
                value: weights[i],
            });
        }
        Ok(Self {
            columns,
            weights,
            pen_column: DEFAULT_PEN_COLUMN,
        })
    }

    /// Set the column whose zero value marks the pen as lifted.
    #[must_use]
    pub fn with_pen_column(mut self, pen_column: usize) -> Self {
        self.pen_column = pen_column;
        self
    }

    /// Number of coordinates per point.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.columns.len()
    }

    /// Selected columns in coordinate order.
    #[must_use]
    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    /// Ingestion weights in coordinate order.
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Read and validate one signature file.
    ///
    /// # Errors
    ///
    /// See the table on [`SignatureReader`].
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn read(&self, path: &Path) -> Result<Signature, IoError> {
        let text = std::fs::read_to_string(path).map_err(|e| IoError::FileNotFound {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.parse(&text, path)
    }

    /// Read several files in order.
    ///
    /// # Errors
    ///
    /// Fails on the first file that cannot be read.
    pub fn read_all<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<Signature>, IoError> {
        paths.iter().map(|p| self.read(p.as_ref())).collect()
    }

    /// Parse HWR text. `path` is only used in errors.
    ///
    /// # Errors
    ///
    /// Same as [`read`][Self::read], minus [`IoError::FileNotFound`].
    pub fn parse(&self, text: &str, path: &Path) -> Result<Signature, IoError> {
        let mut values = Vec::new();
        let mut pen_down = Vec::new();

        for (index, raw_line) in text.lines().enumerate() {
            let line = index + 1;
            let cells: Vec<&str> = raw_line.split_whitespace().collect();
            if cells.is_empty() {
                continue;
            }

            let cell = |column: usize| -> Result<f64, IoError> {
                let raw = cells.get(column).ok_or_else(|| IoError::MissingColumn {
                    path: path.to_path_buf(),
                    line,
                    column,
                    got: cells.len(),
                })?;
                raw.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| IoError::NonFiniteValue {
                        path: path.to_path_buf(),
                        line,
                        column,
                        raw: (*raw).to_string(),
                    })
            };

            pen_down.push(cell(self.pen_column)? != 0.0);
            for (&column, &weight) in self.columns.iter().zip(&self.weights) {
                values.push(cell(column)? * weight);
            }
        }

        if pen_down.is_empty() {
            return Err(IoError::EmptySignature {
                path: path.to_path_buf(),
            });
        }

        let invalid = |source: VerifyError| IoError::InvalidSignature {
            path: path.to_path_buf(),
            source,
        };
        let points = TimeSeries::new(self.dim(), values).map_err(|e| invalid(e.into()))?;
        let signature = Signature::from_stream(&points, &pen_down).map_err(invalid)?;

        debug!(
            points = signature.total_time(),
            segments = signature.segment_count(),
            "signature loaded"
        );
        Ok(signature)
    }
}
