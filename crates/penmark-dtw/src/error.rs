//! Error types for time series construction, resampling, and alignment.

/// Errors from time series validation, resampling, and DTW alignment.
#[derive(Debug, thiserror::Error)]
pub enum DtwError {
    /// Returned when a series or weight vector is declared with zero coordinates per point.
    #[error("points must have at least one coordinate")]
    ZeroDimension,

    /// Returned when a point list is empty and its dimension cannot be inferred.
    #[error("cannot infer dimension from an empty point list")]
    EmptyPointList,

    /// Returned when a flat value buffer is not a whole number of points.
    #[error("{len} values cannot be split into points of dimension {dim}")]
    ValueCountMismatch {
        /// Length of the flat value buffer.
        len: usize,
        /// Declared point dimension.
        dim: usize,
    },

    /// Returned when one point in a point list has a different dimension than the first.
    #[error("point {index} has {got} coordinates, expected {expected}")]
    RaggedPoint {
        /// Position of the offending point.
        index: usize,
        /// Dimension of the first point.
        expected: usize,
        /// Dimension of the offending point.
        got: usize,
    },

    /// Returned when a time series contains NaN, infinity, or negative infinity.
    #[error("time series contains non-finite value at flat index {index}")]
    NonFiniteValue {
        /// Position of the first non-finite value in the flat buffer.
        index: usize,
    },

    /// Returned when two series (or a series and a template) disagree on point dimension.
    #[error("dimension mismatch: {left} vs {right}")]
    DimensionMismatch {
        /// Dimension of the first operand.
        left: usize,
        /// Dimension of the second operand.
        right: usize,
    },

    /// Returned when the coordinate weight vector does not match the point dimension.
    #[error("expected {expected} coordinate weights, got {got}")]
    WeightCountMismatch {
        /// Point dimension of the series being aligned.
        expected: usize,
        /// Number of coordinate weights supplied.
        got: usize,
    },

    /// Returned when per-point weights do not cover every point of the first series.
    #[error("expected {expected} point weights, got {got}")]
    PointWeightCountMismatch {
        /// Length of the first series.
        expected: usize,
        /// Number of point weights supplied.
        got: usize,
    },

    /// Returned when a weight is negative, NaN, or infinite.
    #[error("weight {index} is invalid: {value}")]
    InvalidWeight {
        /// Position of the offending weight.
        index: usize,
        /// The rejected value.
        value: f64,
    },

    /// Returned when a resample target length of zero is requested.
    #[error("resample target length must be at least 1")]
    InvalidResampleLength,

    /// Returned when a search window was built for a different pair of lengths.
    #[error("search window covers {rows}x{cols} cells but series are {n}x{m}")]
    WindowShapeMismatch {
        /// Rows covered by the window.
        rows: usize,
        /// Columns covered by the window.
        cols: usize,
        /// Length of the first series.
        n: usize,
        /// Length of the second series.
        m: usize,
    },

    /// Returned when a PAA target length is zero or exceeds the series length.
    #[error("cannot reduce {len} points to {target} PAA blocks")]
    InvalidPaaLength {
        /// Length of the series being coarsened.
        len: usize,
        /// Requested number of blocks.
        target: usize,
    },
}
